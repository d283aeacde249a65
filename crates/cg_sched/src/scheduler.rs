//! 认知调度器
//!
//! 候选集按注册顺序保存，轮转模式依赖此顺序；注意力模式选取
//! STI 严格最大者，并以先注册者胜出打破平局，保证选择可复现。

use cg_core::{CogLoomConfig, CogLoomError, Result, DECAY_RATE, MEMORY_REFERENCE_BYTES};
use cg_host::{IsolateContext, IsolateSnapshot};

/// 认知调度器
pub struct CognitiveScheduler {
    /// 候选集，注册顺序即轮转顺序
    isolates: Vec<IsolateContext>,
    /// 轮转游标，仅轮转模式下有意义
    current_index: usize,
    /// 注意力调度开关
    attention_based: bool,
}

impl CognitiveScheduler {
    /// 按引擎配置创建调度器
    pub fn new(config: &CogLoomConfig) -> Self {
        Self {
            isolates: Vec::new(),
            current_index: 0,
            attention_based: config.attention_based_scheduling,
        }
    }

    /// 注册一个隔离区，id 重复时报错
    pub fn register(&mut self, context: IsolateContext) -> Result<()> {
        if self.contains(context.id()) {
            return Err(CogLoomError::DuplicateId(context.id().to_string()));
        }
        tracing::debug!(id = context.id(), instance = %context.instance(), "isolate registered");
        self.isolates.push(context);
        Ok(())
    }

    /// 按 id 注销并取回隔离区；不存在时静默返回 None
    pub fn unregister(&mut self, id: &str) -> Option<IsolateContext> {
        let pos = self.isolates.iter().position(|c| c.id() == id)?;
        let context = self.isolates.remove(pos);
        tracing::debug!(id, "isolate unregistered");
        Some(context)
    }

    /// 选出下一个执行的隔离区 id，候选集为空时返回 None
    pub fn select_next(&mut self) -> Option<String> {
        if self.isolates.is_empty() {
            return None;
        }

        if !self.attention_based {
            // 轮转：集合收缩后游标按当前大小取模钳制
            self.current_index %= self.isolates.len();
            let id = self.isolates[self.current_index].id().to_string();
            self.current_index = (self.current_index + 1) % self.isolates.len();
            return Some(id);
        }

        // 注意力模式：STI 严格最大者，平局先注册者胜出
        let mut selected: Option<&IsolateContext> = None;
        let mut max_sti = f64::NEG_INFINITY;
        for context in &self.isolates {
            let sti = context.attention().sti();
            if sti > max_sti {
                max_sti = sti;
                selected = Some(context);
            }
        }
        selected.map(|c| c.id().to_string())
    }

    /// 按当前内存压力对所有候选做一次再加权
    pub fn update_attention(&mut self) {
        for context in &mut self.isolates {
            context.sample_resources();
            let memory = context.memory_usage();
            context
                .attention_mut()
                .adjust_for_memory_pressure(memory, MEMORY_REFERENCE_BYTES);
        }
    }

    /// 对所有候选统一施加一次衰减
    pub fn decay_attention(&mut self) {
        for context in &mut self.isolates {
            context.attention_mut().decay(DECAY_RATE);
        }
    }

    pub fn isolate_count(&self) -> usize {
        self.isolates.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.isolates.iter().any(|c| c.id() == id)
    }

    pub fn get(&self, id: &str) -> Option<&IsolateContext> {
        self.isolates.iter().find(|c| c.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut IsolateContext> {
        self.isolates.iter_mut().find(|c| c.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IsolateContext> {
        self.isolates.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut IsolateContext> {
        self.isolates.iter_mut()
    }

    /// 所有候选的自省快照
    pub fn snapshots(&self) -> Vec<IsolateSnapshot> {
        self.isolates.iter().map(|c| c.snapshot()).collect()
    }

    pub fn attention_based(&self) -> bool {
        self.attention_based
    }
}
