//! 全局错误处理机制

use thiserror::Error;

/// CogLoom 统一错误类型
#[derive(Error, Debug)]
pub enum CogLoomError {
    #[error("Duplicate isolate id: {0}")]
    DuplicateId(String),

    #[error("Unknown isolate id: {0}")]
    UnknownId(String),

    #[error("Host allocation failed: {0}")]
    HostAllocation(String),

    #[error("Host execution error: {0}")]
    Host(String),

    #[error("Engine not initialized")]
    NotInitialized,

    #[error("Command channel error: {0}")]
    Channel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// 统一 Result 类型别名
pub type Result<T> = std::result::Result<T, CogLoomError>;
