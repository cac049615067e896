use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// 流水线核心指标
///
/// 全部是 Relaxed 原子计数，只用于观测，不参与任何决策。
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    // --- 瞬时状态 (Gauges) ---
    /// 正在查询中的任务数 (已派发、尚未写回)
    pub in_flight: AtomicUsize,

    // --- 累积计数 (Counters) ---
    /// 新建任务数
    pub enqueued: AtomicU64,
    /// failed 任务被重新激活的次数 (包括巡检重新派发)
    pub retried: AtomicU64,
    pub ready: AtomicU64,
    pub failed: AtomicU64,
    pub imported: AtomicU64,
    /// 重试耗尽后被放弃的写回
    pub dropped_writebacks: AtomicU64,
}

/// 某一时刻的指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub in_flight: usize,
    pub enqueued: u64,
    pub retried: u64,
    pub ready: u64,
    pub failed: u64,
    pub imported: u64,
    pub dropped_writebacks: u64,
}

impl PipelineMetrics {
    pub fn inc_in_flight(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_in_flight(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn inc_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ready(&self) {
        self.ready.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_imported(&self) {
        self.imported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dropped(&self) {
        self.dropped_writebacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            in_flight: self.in_flight.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            ready: self.ready.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            imported: self.imported.load(Ordering::Relaxed),
            dropped_writebacks: self.dropped_writebacks.load(Ordering::Relaxed),
        }
    }
}
