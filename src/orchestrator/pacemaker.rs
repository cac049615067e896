use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{sync::Notify, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::policy::{WaitContext, WaitDecision, WaitStrategy};

/// 暂停状态下检查恢复的间隔
const PAUSE_POLL: Duration = Duration::from_millis(100);

/// 巡检起搏器
///
/// 负责驱动巡检循环的节奏：根据 WaitStrategy 的决策，
/// 决定是立刻巡检、等 `kick` 还是强制休眠。
pub struct SweepPacemaker<'a> {
    paused: &'a AtomicBool,
    notify: &'a Notify,
    shutdown: &'a CancellationToken,
    wait_strategy: Arc<dyn WaitStrategy>,

    /// 连续空转计数器
    idle_count: u32,
}

impl<'a> SweepPacemaker<'a> {
    pub fn new(
        paused: &'a AtomicBool,
        notify: &'a Notify,
        shutdown: &'a CancellationToken,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Self {
        Self {
            paused,
            notify,
            shutdown,
            wait_strategy,
            idle_count: 0,
        }
    }

    /// 本轮恢复了滞留任务
    pub fn mark_busy(&mut self) {
        self.idle_count = 0;
    }

    /// 本轮什么也没找到 (或者出错)
    pub fn mark_idle(&mut self) {
        self.idle_count = self.idle_count.saturating_add(1);
    }

    pub fn idle_count(&self) -> u32 {
        self.idle_count
    }

    /// 等待下一次巡检
    pub async fn wait_next(&mut self) -> PacemakerEvent {
        loop {
            if self.shutdown.is_cancelled() {
                return PacemakerEvent::Shutdown;
            }

            if self.paused.load(Ordering::Relaxed) {
                tokio::select! {
                    _ = self.shutdown.cancelled() => return PacemakerEvent::Shutdown,
                    _ = tokio::time::sleep(PAUSE_POLL) => continue,
                }
            }

            let ctx = WaitContext::new(self.idle_count, Instant::now());
            let decision = self.wait_strategy.make_decision(&ctx);

            let event = match decision {
                WaitDecision::Immediate => PacemakerEvent::Trigger,
                WaitDecision::Yield => {
                    tokio::task::yield_now().await;
                    PacemakerEvent::Trigger
                }
                // 硬等待：kick 不能提前唤醒
                WaitDecision::WaitUntil(deadline) => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => PacemakerEvent::Shutdown,
                        _ = tokio::time::sleep_until(deadline) => PacemakerEvent::Trigger,
                    }
                }
                WaitDecision::WaitForNotification(deadline) => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => PacemakerEvent::Shutdown,
                        _ = self.notify.notified() => PacemakerEvent::Trigger,
                        _ = tokio::time::sleep_until(deadline) => PacemakerEvent::Trigger,
                    }
                }
                WaitDecision::WaitIndefinitely => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => PacemakerEvent::Shutdown,
                        _ = self.notify.notified() => PacemakerEvent::Trigger,
                    }
                }
            };

            // 睡眠期间被暂停的话，醒来后回到暂停分支
            if event == PacemakerEvent::Trigger && self.paused.load(Ordering::Relaxed) {
                continue;
            }
            return event;
        }
    }
}

/// 起搏器产生的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacemakerEvent {
    /// 该巡检了
    Trigger,
    /// 系统停机
    Shutdown,
}
