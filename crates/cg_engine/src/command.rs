//! 跨线程指令封送
//!
//! 注册表与候选集只由控制环线程修改。外部线程通过 EngineHandle
//! 把请求封送到环上，在下一个 prepare 相被统一执行，查询经
//! oneshot 通道应答。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, Notify};

use cg_core::{CogLoomError, Result};
use cg_host::IsolateSnapshot;

use crate::metrics::MetricsSnapshot;

/// 封送到控制环线程的指令
pub enum EngineCommand {
    CreateIsolate {
        id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    DestroyIsolate {
        id: String,
        reply: oneshot::Sender<()>,
    },
    SetSti {
        id: String,
        value: f64,
        reply: oneshot::Sender<Result<()>>,
    },
    SetLti {
        id: String,
        value: f64,
        reply: oneshot::Sender<Result<()>>,
    },
    GetSti {
        id: String,
        reply: oneshot::Sender<f64>,
    },
    GetLti {
        id: String,
        reply: oneshot::Sender<f64>,
    },
    GetMemoryUsage {
        id: String,
        reply: oneshot::Sender<u64>,
    },
    IsolateCount {
        reply: oneshot::Sender<usize>,
    },
    Snapshots {
        reply: oneshot::Sender<Vec<IsolateSnapshot>>,
    },
    Metrics {
        reply: oneshot::Sender<MetricsSnapshot>,
    },
}

/// 引擎与句柄共享的控制信号
pub(crate) struct EngineSignals {
    /// 停止请求标志，控制环在迭代边界检查
    pub(crate) stop: AtomicBool,
    /// 控制环是否正在运行
    pub(crate) running: AtomicBool,
    /// 唤醒阻塞等待中的控制环
    pub(crate) wake: Notify,
}

impl EngineSignals {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            stop: AtomicBool::new(false),
            running: AtomicBool::new(false),
            wake: Notify::new(),
        })
    }
}

/// 可克隆的引擎句柄
///
/// 不持有任何隔离区状态；stop 只置标志并唤醒控制环，可从任意
/// 线程调用。
#[derive(Clone)]
pub struct EngineHandle {
    commands: flume::Sender<EngineCommand>,
    signals: Arc<EngineSignals>,
}

impl EngineHandle {
    pub(crate) fn new(commands: flume::Sender<EngineCommand>, signals: Arc<EngineSignals>) -> Self {
        Self { commands, signals }
    }

    fn send(&self, command: EngineCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| CogLoomError::Channel("engine command queue closed".to_string()))?;
        self.signals.wake.notify_one();
        Ok(())
    }

    fn recv<T>(&self, reply: oneshot::Receiver<T>) -> Result<T> {
        reply
            .blocking_recv()
            .map_err(|_| CogLoomError::Channel("engine dropped command reply".to_string()))
    }

    /// 请求创建隔离区并等待结果
    pub fn create_isolate(&self, id: impl Into<String>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::CreateIsolate {
            id: id.into(),
            reply: tx,
        })?;
        self.recv(rx)?
    }

    /// 请求销毁隔离区并等待完成；未知 id 静默成功
    pub fn destroy_isolate(&self, id: impl Into<String>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::DestroyIsolate {
            id: id.into(),
            reply: tx,
        })?;
        self.recv(rx)
    }

    pub fn set_sti(&self, id: impl Into<String>, value: f64) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::SetSti {
            id: id.into(),
            value,
            reply: tx,
        })?;
        self.recv(rx)?
    }

    pub fn set_lti(&self, id: impl Into<String>, value: f64) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::SetLti {
            id: id.into(),
            value,
            reply: tx,
        })?;
        self.recv(rx)?
    }

    /// 未知 id 返回 0.0
    pub fn get_sti(&self, id: impl Into<String>) -> Result<f64> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::GetSti {
            id: id.into(),
            reply: tx,
        })?;
        self.recv(rx)
    }

    /// 未知 id 返回 0.0
    pub fn get_lti(&self, id: impl Into<String>) -> Result<f64> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::GetLti {
            id: id.into(),
            reply: tx,
        })?;
        self.recv(rx)
    }

    /// 未知 id 返回 0
    pub fn memory_usage(&self, id: impl Into<String>) -> Result<u64> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::GetMemoryUsage {
            id: id.into(),
            reply: tx,
        })?;
        self.recv(rx)
    }

    pub fn isolate_count(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::IsolateCount { reply: tx })?;
        self.recv(rx)
    }

    pub fn snapshots(&self) -> Result<Vec<IsolateSnapshot>> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::Snapshots { reply: tx })?;
        self.recv(rx)
    }

    pub fn metrics(&self) -> Result<MetricsSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::Metrics { reply: tx })?;
        self.recv(rx)
    }

    /// 请求控制环在下一个安全点退出
    pub fn stop(&self) {
        self.signals.stop.store(true, Ordering::SeqCst);
        self.signals.wake.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.signals.running.load(Ordering::SeqCst)
    }
}
