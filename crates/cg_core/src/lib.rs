//! # cg_core - CogLoom Core Primitives
//!
//! 核心原语层，定义注意力算术、全局错误处理机制、引擎配置。
//! 此 crate 是整个项目的基础依赖，不依赖其他业务 crate。

pub mod attention;
pub mod config;
pub mod error;

pub use attention::{AttentionValue, DECAY_RATE, MEMORY_REFERENCE_BYTES, STI_FLOOR};
pub use config::CogLoomConfig;
pub use error::{CogLoomError, Result};
