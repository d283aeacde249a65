//! 注意力经济算术
//!
//! 每个隔离区持有一对 (STI, LTI) 注意力值。STI 驱动即时调度优先级，
//! LTI 记录长期重要性但不直接参与基础选择算法。

use serde::{Deserialize, Serialize};

/// STI 下限，衰减/调整后永不低于此值
pub const STI_FLOOR: f64 = 1.0;

/// 每个认知 tick 的默认衰减率 (1% 损耗)
pub const DECAY_RATE: f64 = 0.99;

/// 内存压力归一化基准 (100 MiB)
pub const MEMORY_REFERENCE_BYTES: u64 = 100 * 1024 * 1024;

/// 注意力值对
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttentionValue {
    /// 短期重要性
    sti: f64,
    /// 长期重要性
    lti: f64,
}

impl Default for AttentionValue {
    fn default() -> Self {
        Self {
            sti: 50.0,
            lti: 50.0,
        }
    }
}

impl AttentionValue {
    /// 创建指定初值的注意力值
    pub fn new(sti: f64, lti: f64) -> Self {
        Self { sti, lti }
    }

    pub fn sti(&self) -> f64 {
        self.sti
    }

    pub fn lti(&self) -> f64 {
        self.lti
    }

    /// 直接设置 STI (绑定层接口，不做下限钳制)
    pub fn set_sti(&mut self, sti: f64) {
        self.sti = sti;
    }

    /// 直接设置 LTI
    pub fn set_lti(&mut self, lti: f64) {
        self.lti = lti;
    }

    /// 按衰减率缩减 STI，随后钳到下限
    pub fn decay(&mut self, rate: f64) {
        self.sti = (self.sti * rate).max(STI_FLOOR);
    }

    /// 按内存压力缩减 STI
    ///
    /// factor = clamp(1 - memory/reference, 0.5, 1.0)，单步最多减半。
    pub fn adjust_for_memory_pressure(&mut self, memory_bytes: u64, reference_bytes: u64) {
        let factor = (1.0 - memory_bytes as f64 / reference_bytes as f64).clamp(0.5, 1.0);
        self.sti = (self.sti * factor).max(STI_FLOOR);
    }
}
