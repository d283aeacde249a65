//! # cg_engine - CogLoom Synergy Engine
//!
//! 协同引擎：四相控制环 (prepare → check → tick → idle)、隔离区
//! 注册表生命周期、跨线程指令封送。单线程协作式调度，任一时刻
//! 只有一个隔离区的时间片在执行。

pub mod command;
pub mod engine;
pub mod metrics;

pub use command::{EngineCommand, EngineHandle};
pub use engine::{CognitiveSynergyEngine, EngineState};
pub use metrics::MetricsSnapshot;
