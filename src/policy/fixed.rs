use std::time::Duration;

use crate::policy::{WaitContext, WaitDecision, WaitStrategy};

/// 固定间隔策略
///
/// 不论巡检结果如何都保持同一节奏。
#[derive(Debug, Clone)]
pub struct FixedWait {
    interval: Duration,
    listen: bool,
}

impl FixedWait {
    /// 固定间隔，`kick` 可以提前唤醒
    pub fn new(millis: u64) -> Self {
        Self {
            interval: Duration::from_millis(millis),
            listen: true,
        }
    }

    /// 纯定时，忽略 `kick`
    pub fn new_pure_polling(millis: u64) -> Self {
        Self {
            interval: Duration::from_millis(millis),
            listen: false,
        }
    }
}

impl WaitStrategy for FixedWait {
    fn make_decision(&self, ctx: &WaitContext) -> WaitDecision {
        let deadline = ctx.now_instant + self.interval;
        if self.listen {
            WaitDecision::WaitForNotification(deadline)
        } else {
            WaitDecision::WaitUntil(deadline)
        }
    }
}
