//! 隔离区上下文
//!
//! 一个可独立调度的执行单元：不可变 id + 注意力值 + 不透明宿主句柄。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cg_core::{AttentionValue, Result};

use crate::host::HostContext;

/// 隔离区上下文
pub struct IsolateContext {
    /// 调用方提供的唯一 id，生命周期内不可变
    id: String,
    /// 本次注册的实例标记 (同名 id 销毁重建后可区分)
    instance: Uuid,
    /// 注册时间
    registered_at: DateTime<Utc>,
    /// 注意力值
    attention: AttentionValue,
    /// 不透明宿主执行状态
    host: Option<Box<dyn HostContext>>,
    /// 最近一次资源采样 (宿主缺席时的回退值)
    last_memory: u64,
    last_cpu: f64,
    /// 已执行时间片数
    slices_run: u64,
    /// 时间片失败数
    slice_failures: u64,
}

/// 隔离区快照 (自省用)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolateSnapshot {
    pub id: String,
    pub instance: Uuid,
    pub registered_at: DateTime<Utc>,
    pub sti: f64,
    pub lti: f64,
    pub memory_bytes: u64,
    pub cpu_time_secs: f64,
    pub slices_run: u64,
    pub slice_failures: u64,
}

impl IsolateContext {
    /// 包装一个宿主上下文
    pub fn new(id: impl Into<String>, host: Box<dyn HostContext>) -> Self {
        Self::build(id.into(), Some(host))
    }

    /// 创建无宿主的空壳上下文
    ///
    /// 空壳上下文的 run_slice/checkpoint 是无操作，不会使控制环失败。
    pub fn detached(id: impl Into<String>) -> Self {
        Self::build(id.into(), None)
    }

    fn build(id: String, host: Option<Box<dyn HostContext>>) -> Self {
        Self {
            id,
            instance: Uuid::new_v4(),
            registered_at: Utc::now(),
            attention: AttentionValue::default(),
            host,
            last_memory: 0,
            last_cpu: 0.0,
            slices_run: 0,
            slice_failures: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn attention(&self) -> &AttentionValue {
        &self.attention
    }

    pub fn attention_mut(&mut self) -> &mut AttentionValue {
        &mut self.attention
    }

    pub fn set_attention(&mut self, attention: AttentionValue) {
        self.attention = attention;
    }

    pub fn has_host(&self) -> bool {
        self.host.is_some()
    }

    /// 执行一个时间片
    pub fn run_slice(&mut self, max_units: u32) -> Result<()> {
        let Some(host) = self.host.as_mut() else {
            return Ok(());
        };
        match host.run_slice(max_units) {
            Ok(()) => {
                self.slices_run += 1;
                Ok(())
            }
            Err(e) => {
                self.slice_failures += 1;
                Err(e)
            }
        }
    }

    /// 结算检查点
    pub fn checkpoint(&mut self) -> Result<()> {
        let Some(host) = self.host.as_mut() else {
            return Ok(());
        };
        match host.checkpoint() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.slice_failures += 1;
                Err(e)
            }
        }
    }

    /// 当前内存占用，宿主缺席时返回最近采样
    pub fn memory_usage(&self) -> u64 {
        match &self.host {
            Some(host) => host.memory_usage(),
            None => self.last_memory,
        }
    }

    /// 累计 CPU 时间，宿主缺席时返回最近采样
    pub fn cpu_time(&self) -> f64 {
        match &self.host {
            Some(host) => host.cpu_time(),
            None => self.last_cpu,
        }
    }

    /// 刷新资源采样缓存
    pub fn sample_resources(&mut self) {
        if let Some(host) = &self.host {
            self.last_memory = host.memory_usage();
            self.last_cpu = host.cpu_time();
        }
    }

    pub fn slices_run(&self) -> u64 {
        self.slices_run
    }

    pub fn slice_failures(&self) -> u64 {
        self.slice_failures
    }

    /// 生成自省快照
    pub fn snapshot(&self) -> IsolateSnapshot {
        IsolateSnapshot {
            id: self.id.clone(),
            instance: self.instance,
            registered_at: self.registered_at,
            sti: self.attention.sti(),
            lti: self.attention.lti(),
            memory_bytes: self.memory_usage(),
            cpu_time_secs: self.cpu_time(),
            slices_run: self.slices_run,
            slice_failures: self.slice_failures,
        }
    }
}
