//! 宿主执行能力接口
//!
//! 引擎消费的外部协作者边界：执行一个时间片、结算检查点、上报资源。
//! 所有方法必须在有界时间内返回，永不无限阻塞。

use cg_core::Result;

/// 不透明宿主执行上下文
///
/// 实现方负责内部状态；引擎只通过此接口驱动。
pub trait HostContext: Send {
    /// 执行至多 `max_units` 个排队工作单元
    fn run_slice(&mut self, max_units: u32) -> Result<()>;

    /// 强制完成上一时间片产生的延迟续延
    ///
    /// 每个时间片至多调用一次，且严格在对应 `run_slice` 之后。
    fn checkpoint(&mut self) -> Result<()>;

    /// 当前内存占用 (字节)，尽力而为
    fn memory_usage(&self) -> u64;

    /// 累计 CPU 时间 (秒)，尽力而为
    fn cpu_time(&self) -> f64;
}

/// 宿主上下文分配器
///
/// 分配是显式有界操作；释放由持有者在注销调度之后丢弃 Box 完成。
pub trait HostFactory: Send {
    /// 为指定 id 分配一个新的宿主上下文
    fn allocate(&self, id: &str) -> Result<Box<dyn HostContext>>;
}
