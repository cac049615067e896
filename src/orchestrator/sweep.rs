use std::sync::atomic::Ordering;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::common::model::TaskStatus;
use crate::common::{Result, TimeUtils};
use crate::orchestrator::{PacemakerEvent, SweepPacemaker, TaskOrchestrator};

// ==========================================
// 滞留任务巡检 (Stale Sweep)
// ==========================================
//
// 写回彻底失败、或者进程在查询途中退出，都会让任务停在 querying。
// 巡检定期找出长时间没有动静、且本进程没有在查的 querying 任务，重新派发查询。

impl TaskOrchestrator {
    /// 启动后台巡检循环
    ///
    /// `sweep.enabled = false` 时返回 None。循环在 `shutdown` 后退出。
    pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        if !self.inner.ctx.config.sweep.enabled {
            debug!("[Sweep] Disabled by config");
            return None;
        }
        let this = self.clone();
        Some(tokio::spawn(async move {
            this.sweep_loop().await;
        }))
    }

    async fn sweep_loop(&self) {
        let mut pacemaker = SweepPacemaker::new(
            &self.inner.paused,
            &self.inner.notify,
            &self.inner.ctx.shutdown,
            self.inner.wait_strategy.clone(),
        );
        trace!("[Sweep] Started");

        loop {
            match pacemaker.wait_next().await {
                PacemakerEvent::Trigger => {}
                PacemakerEvent::Shutdown => break,
            }

            match self.sweep_once().await {
                Ok(0) => pacemaker.mark_idle(),
                Ok(n) => {
                    debug!("[Sweep] Re-dispatched {} stale task(s)", n);
                    pacemaker.mark_busy();
                }
                Err(e) => {
                    error!("[Sweep] Sweep failed: {}", e);
                    pacemaker.mark_idle();
                }
            }
        }
        trace!("[Sweep] Stopped");
    }

    /// 执行一轮巡检，返回重新派发的任务数
    ///
    /// 可以直接调用，不受暂停开关影响。
    pub async fn sweep_once(&self) -> Result<usize> {
        let cfg = &self.inner.ctx.config.sweep;
        let store = &self.inner.ctx.tasks;
        let now = TimeUtils::now_f64();

        let querying = store.list(Some(TaskStatus::Querying), usize::MAX).await?;

        // list 是新的在前，反过来让等得最久的先恢复
        let stale: Vec<_> = querying
            .into_iter()
            .rev()
            .filter(|t| TimeUtils::is_older_than(t.updated_at, cfg.stale_after_ms, now))
            .filter(|t| !self.inner.in_flight.contains_key(&t.id))
            .take(cfg.batch_size)
            .collect();

        let mut recovered = 0;
        for candidate in stale {
            // 快照可能已过期：任务被删掉或已写回时跳过，不能再 save 回去
            let mut task = match store.load(&candidate.id).await {
                Ok(Some(task)) if task.status == TaskStatus::Querying => task,
                Ok(_) => continue,
                Err(e) => {
                    warn!("[Sweep] Reload task {} failed: {}", candidate.id, e);
                    continue;
                }
            };
            task.touch();
            if let Err(e) = store.save(&task).await {
                warn!("[Sweep] Touch task {} failed: {}", task.id, e);
                continue;
            }
            for p in self.inner.plugins.iter() {
                p.on_retry(&task).await;
            }
            self.dispatch(&task);
            recovered += 1;
        }
        Ok(recovered)
    }

    /// 暂停巡检 (已派发的查询不受影响)
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::Relaxed);
        debug!("[Sweep] Paused");
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::Relaxed);
        self.inner.notify.notify_one();
        debug!("[Sweep] Resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::Relaxed)
    }

    /// 立刻唤醒巡检 (只对可被通知的等待生效)
    pub fn kick(&self) {
        self.inner.notify.notify_one();
    }
}
