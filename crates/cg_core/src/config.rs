//! 引擎配置

/// CogLoom 引擎配置
#[derive(Debug, Clone)]
pub struct CogLoomConfig {
    /// 认知 tick 间隔 (毫秒)，驱动衰减与压力再加权
    pub cognitive_tick_ms: u64,
    /// 后台 I/O 工作线程数，不参与调度逻辑
    pub worker_threads: usize,
    /// 每个隔离区单次时间片的最大微任务数
    pub max_microtasks_per_slice: u32,
    /// 是否启用注意力调度 (false 则退化为轮转)
    pub attention_based_scheduling: bool,
    /// 是否启用性能监控
    pub enable_monitoring: bool,
}

impl Default for CogLoomConfig {
    fn default() -> Self {
        Self {
            cognitive_tick_ms: 5,
            worker_threads: 4,
            max_microtasks_per_slice: 100,
            attention_based_scheduling: true,
            enable_monitoring: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CogLoomConfig::default();
        assert_eq!(config.cognitive_tick_ms, 5);
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.max_microtasks_per_slice, 100);
        assert!(config.attention_based_scheduling);
        assert!(config.enable_monitoring);
    }
}
