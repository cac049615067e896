use rand::Rng;
use std::time::Duration;

use crate::policy::{WaitContext, WaitDecision, WaitStrategy};

/// 指数退避策略
///
/// 巡检连续空转时拉长间隔，找到滞留任务后回到最小间隔。
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min: Duration,
    max: Duration,
    factor: f64,
    jitter: bool,
}

impl ExponentialBackoff {
    /// - `min_ms`: 忙时间隔
    /// - `max_ms`: 封顶间隔
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min: Duration::from_millis(min_ms),
            max: Duration::from_millis(max_ms.max(min_ms)),
            factor: 2.0,
            jitter: false,
        }
    }

    /// 开启 ±20% 随机抖动，避免多个进程同时巡检
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    fn calculate_duration(&self, idle_count: u32) -> Duration {
        if idle_count == 0 {
            return self.min;
        }

        // min * factor^(idle_count - 1)，指数封顶 30 防止溢出
        let exponent = (idle_count - 1).min(30) as i32;
        let mut secs = self.min.as_secs_f64() * self.factor.powi(exponent);

        if self.jitter {
            secs *= rand::rng().random_range(0.8..1.2);
        }

        Duration::from_secs_f64(secs).min(self.max)
    }
}

impl WaitStrategy for ExponentialBackoff {
    fn make_decision(&self, ctx: &WaitContext) -> WaitDecision {
        let duration = self.calculate_duration(ctx.idle_count);
        WaitDecision::WaitForNotification(ctx.now_instant + duration)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(30_000, 300_000)
    }
}
