//! 任务队列宿主
//!
//! 内置的宿主实现：FIFO 工作队列 + 延迟续延队列。
//! 后台生产者通过 flume 通道投递工作，控制环线程在时间片内消费，
//! 续延留到检查点统一结算。

use std::collections::VecDeque;
use std::time::Instant;

use cg_core::{CogLoomError, Result};

use crate::host::{HostContext, HostFactory};

/// 检查点单次结算的续延链上限
const MAX_CHECKPOINT_CHAIN: usize = 4096;

/// 每个排队任务的近似内存开销 (字节)
const TASK_COST_BYTES: u64 = 4096;

/// 一个宿主工作单元，可在完成时产生续延
pub struct HostTask(Box<dyn FnOnce() -> Option<HostTask> + Send>);

impl HostTask {
    /// 创建可产生续延的任务
    pub fn new(f: impl FnOnce() -> Option<HostTask> + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    /// 创建无续延的叶子任务
    pub fn leaf(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(move || {
            f();
            None
        }))
    }

    fn run(self) -> Option<HostTask> {
        (self.0)()
    }
}

/// 任务队列宿主
pub struct TaskQueueHost {
    /// 后台生产者投递口
    intake: Option<flume::Receiver<HostTask>>,
    /// 待执行队列
    pending: VecDeque<HostTask>,
    /// 延迟到检查点的续延
    deferred: VecDeque<HostTask>,
    /// 已执行任务数
    executed: u64,
    /// 累计执行耗时 (秒)
    cpu_time: f64,
    /// 基础内存占用 (字节)
    base_memory: u64,
}

impl TaskQueueHost {
    /// 创建空宿主
    pub fn new() -> Self {
        Self {
            intake: None,
            pending: VecDeque::new(),
            deferred: VecDeque::new(),
            executed: 0,
            cpu_time: 0.0,
            base_memory: 0,
        }
    }

    /// 创建带后台投递口的宿主
    pub fn with_intake(intake: flume::Receiver<HostTask>) -> Self {
        let mut host = Self::new();
        host.intake = Some(intake);
        host
    }

    /// 直接排队一个任务 (控制环线程内使用)
    pub fn push_task(&mut self, task: HostTask) {
        self.pending.push_back(task);
    }

    /// 设置基础内存占用 (模拟内存密集宿主)
    pub fn set_base_memory(&mut self, bytes: u64) {
        self.base_memory = bytes;
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn executed_count(&self) -> u64 {
        self.executed
    }

    /// 把后台投递的工作搬进待执行队列
    fn drain_intake(&mut self) {
        if let Some(intake) = &self.intake {
            for task in intake.try_iter() {
                self.pending.push_back(task);
            }
        }
    }
}

impl Default for TaskQueueHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostContext for TaskQueueHost {
    fn run_slice(&mut self, max_units: u32) -> Result<()> {
        self.drain_intake();

        for _ in 0..max_units {
            let Some(task) = self.pending.pop_front() else {
                break;
            };
            let started = Instant::now();
            if let Some(continuation) = task.run() {
                self.deferred.push_back(continuation);
            }
            self.cpu_time += started.elapsed().as_secs_f64();
            self.executed += 1;
        }
        Ok(())
    }

    fn checkpoint(&mut self) -> Result<()> {
        let mut settled = 0usize;
        while let Some(task) = self.deferred.pop_front() {
            if settled >= MAX_CHECKPOINT_CHAIN {
                return Err(CogLoomError::Host(format!(
                    "checkpoint continuation chain exceeded {} entries",
                    MAX_CHECKPOINT_CHAIN
                )));
            }
            let started = Instant::now();
            if let Some(continuation) = task.run() {
                self.deferred.push_back(continuation);
            }
            self.cpu_time += started.elapsed().as_secs_f64();
            self.executed += 1;
            settled += 1;
        }
        Ok(())
    }

    fn memory_usage(&self) -> u64 {
        let queued = (self.pending.len() + self.deferred.len()) as u64;
        self.base_memory + queued * TASK_COST_BYTES
    }

    fn cpu_time(&self) -> f64 {
        self.cpu_time
    }
}

/// 任务队列宿主分配器
#[derive(Debug, Default)]
pub struct TaskQueueFactory;

impl HostFactory for TaskQueueFactory {
    fn allocate(&self, _id: &str) -> Result<Box<dyn HostContext>> {
        Ok(Box::new(TaskQueueHost::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_slice_respects_budget() {
        let mut host = TaskQueueHost::new();
        for _ in 0..10 {
            host.push_task(HostTask::leaf(|| {}));
        }

        host.run_slice(3).expect("slice should run");
        assert_eq!(host.executed_count(), 3);
        assert_eq!(host.pending_count(), 7);
    }

    #[test]
    fn test_checkpoint_settles_continuations() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut host = TaskQueueHost::new();

        let c1 = counter.clone();
        let c2 = counter.clone();
        // 任务 -> 续延 -> 二级续延，检查点应全部结算
        host.push_task(HostTask::new(move || {
            Some(HostTask::new(move || {
                c1.fetch_add(1, Ordering::SeqCst);
                Some(HostTask::leaf(move || {
                    c2.fetch_add(1, Ordering::SeqCst);
                }))
            }))
        }));

        host.run_slice(10).expect("slice should run");
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        host.checkpoint().expect("checkpoint should settle");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_intake_is_drained_on_slice() {
        let (tx, rx) = flume::unbounded();
        let mut host = TaskQueueHost::with_intake(rx);

        tx.send(HostTask::leaf(|| {})).expect("send should work");
        tx.send(HostTask::leaf(|| {})).expect("send should work");

        host.run_slice(10).expect("slice should run");
        assert_eq!(host.executed_count(), 2);
    }

    #[test]
    fn test_memory_model_tracks_queue_depth() {
        let mut host = TaskQueueHost::new();
        host.set_base_memory(1024);
        let empty = host.memory_usage();

        host.push_task(HostTask::leaf(|| {}));
        assert!(host.memory_usage() > empty);

        host.run_slice(1).expect("slice should run");
        assert_eq!(host.memory_usage(), empty);
    }
}
