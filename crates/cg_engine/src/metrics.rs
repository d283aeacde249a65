//! 引擎性能监控
//!
//! enable_monitoring 关闭时所有记录调用都是无操作。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 控制环运行指标
#[derive(Debug)]
pub(crate) struct EngineMetrics {
    enabled: bool,
    started_at: Option<DateTime<Utc>>,
    iterations: u64,
    slices: u64,
    slice_failures: u64,
    ticks: u64,
    maintenance_runs: u64,
}

/// 指标快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub enabled: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub iterations: u64,
    pub slices: u64,
    pub slice_failures: u64,
    pub ticks: u64,
    pub maintenance_runs: u64,
}

impl EngineMetrics {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            started_at: None,
            iterations: 0,
            slices: 0,
            slice_failures: 0,
            ticks: 0,
            maintenance_runs: 0,
        }
    }

    pub(crate) fn mark_started(&mut self) {
        if self.enabled && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    pub(crate) fn record_iteration(&mut self) {
        if self.enabled {
            self.iterations += 1;
        }
    }

    pub(crate) fn record_slice(&mut self) {
        if self.enabled {
            self.slices += 1;
        }
    }

    pub(crate) fn record_slice_failure(&mut self) {
        if self.enabled {
            self.slice_failures += 1;
        }
    }

    pub(crate) fn record_tick(&mut self) {
        if self.enabled {
            self.ticks += 1;
        }
    }

    pub(crate) fn record_maintenance(&mut self) {
        if self.enabled {
            self.maintenance_runs += 1;
        }
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enabled: self.enabled,
            started_at: self.started_at,
            iterations: self.iterations,
            slices: self.slices,
            slice_failures: self.slice_failures,
            ticks: self.ticks,
            maintenance_runs: self.maintenance_runs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_metrics_stay_zero() {
        let mut metrics = EngineMetrics::new(false);
        metrics.mark_started();
        metrics.record_iteration();
        metrics.record_slice();
        metrics.record_tick();

        let snap = metrics.snapshot();
        assert!(!snap.enabled);
        assert!(snap.started_at.is_none());
        assert_eq!(snap.iterations, 0);
        assert_eq!(snap.slices, 0);
    }

    #[test]
    fn test_enabled_metrics_accumulate() {
        let mut metrics = EngineMetrics::new(true);
        metrics.mark_started();
        metrics.record_iteration();
        metrics.record_iteration();
        metrics.record_slice_failure();

        let snap = metrics.snapshot();
        assert!(snap.started_at.is_some());
        assert_eq!(snap.iterations, 2);
        assert_eq!(snap.slice_failures, 1);
    }
}
