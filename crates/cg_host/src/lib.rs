//! # cg_host - CogLoom Host Contract
//!
//! 宿主契约层：隔离区包装 (IsolateContext)、不透明执行能力接口、
//! 以及内置的任务队列宿主 (演示与测试用)。
//! 调度器永不解释宿主内部语义，只通过能力接口调用。

pub mod context;
pub mod host;
pub mod task_host;

pub use context::{IsolateContext, IsolateSnapshot};
pub use host::{HostContext, HostFactory};
pub use task_host::{HostTask, TaskQueueFactory, TaskQueueHost};
