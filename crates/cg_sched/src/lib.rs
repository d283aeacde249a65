//! # cg_sched - CogLoom Cognitive Scheduler
//!
//! 认知调度器：持有候选集，按注意力 (STI) 或轮转策略选出下一个
//! 执行的隔离区，并承担衰减与内存压力再加权两条独立反馈通路。

pub mod scheduler;

pub use scheduler::CognitiveScheduler;
