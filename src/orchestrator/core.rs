use dashmap::DashMap;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::{Mutex as AsyncMutex, Notify, Semaphore};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, trace, warn};

use crate::common::model::{
    BatchCreated, BatchExisting, BatchFailed, BatchReport, CreatedTask, ImportTask,
    StoredWordData, TaskStats, TaskStatus, WordData, WordRecord,
};
use crate::common::{PipelineConfig, PipelineError, Result, calculate_backoff};
use crate::orchestrator::context::OrchestratorContext;
use crate::orchestrator::plugin::OrchestratorPlugin;
use crate::orchestrator::{MetricsSnapshot, PipelineMetrics};
use crate::persistence::{TaskStore, WordStore};
use crate::policy::WaitStrategy;

/// 写回重试的退避参数 (秒)
const WRITEBACK_BASE_DELAY: f64 = 0.2;
const WRITEBACK_MAX_DELAY: f64 = 5.0;

/// 一次查询的结果 (成功的载荷，或者写进 error_message 的原因)
type LookupOutcome = std::result::Result<WordData, String>;

/// 写回的结果
enum WriteBack {
    /// 已写入，附带写入后的任务
    Written(ImportTask),
    /// 任务已被删除，或者已不在 querying (被别的写者推进了)
    Skipped,
}

pub(super) struct OrchestratorInner {
    pub(super) ctx: OrchestratorContext,
    /// 查询并发上限
    semaphore: Arc<Semaphore>,
    /// 已派发、尚未写回的查询
    tracker: TaskTracker,
    /// wait_idle 的 close/wait/reopen 必须串行
    idle_gate: AsyncMutex<()>,
    /// 本进程内正在查询的任务 (ID -> 派发次数)
    pub(super) in_flight: DashMap<String, u32>,
    pub(super) plugins: Vec<Box<dyn OrchestratorPlugin>>,
    pub(super) wait_strategy: Arc<dyn WaitStrategy>,
    /// 巡检暂停开关
    pub(super) paused: AtomicBool,
    /// 巡检唤醒 (kick / resume)
    pub(super) notify: Notify,
}

/// 导入任务编排器
///
/// 持有导入任务状态机：决定何时调用 Enricher、如何解释结果、如何提交进词典。
/// 自身不持有任何持久状态，每个决策都重新读取 TaskStore，可以随时重启。
#[derive(Clone)]
pub struct TaskOrchestrator {
    pub(super) inner: Arc<OrchestratorInner>,
}

impl TaskOrchestrator {
    pub fn builder() -> crate::orchestrator::OrchestratorBuilder {
        crate::orchestrator::OrchestratorBuilder::new()
    }

    pub fn new_with_components(
        ctx: OrchestratorContext,
        plugins: Vec<Box<dyn OrchestratorPlugin>>,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Self {
        let concurrency = ctx.config.orchestrator.max_concurrency;
        let inner = OrchestratorInner {
            ctx,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            tracker: TaskTracker::new(),
            idle_gate: AsyncMutex::new(()),
            in_flight: DashMap::new(),
            plugins,
            wait_strategy,
            paused: AtomicBool::new(false),
            notify: Notify::new(),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.ctx.config
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.inner.ctx.metrics.clone()
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.inner.ctx.metrics.snapshot()
    }

    /// 暴露内部任务存储
    pub fn task_store(&self) -> Arc<dyn TaskStore> {
        self.inner.ctx.tasks.clone()
    }

    /// 暴露内部词库存储
    pub fn word_store(&self) -> Arc<dyn WordStore> {
        self.inner.ctx.words.clone()
    }

    // ==========================================
    // 1. 创建 (Create)
    // ==========================================

    /// 为单词创建导入任务，并在后台发起查询
    ///
    /// - 已有 failed 任务: 原地重置为 querying 并重新查询，返回原 ID
    /// - 已有 querying / ready / imported 任务: `DuplicateTask`
    /// - 否则新建任务
    ///
    /// 查询在后台进行，本方法不等待结果。
    pub async fn create(&self, word: &str) -> Result<CreatedTask> {
        let word = word.trim();
        if word.is_empty() {
            return Err(PipelineError::EmptyWord);
        }
        let store = &self.inner.ctx.tasks;

        if let Some(mut existing) = store.find_by_word(word).await? {
            if existing.status.blocks_new_task() {
                return Err(PipelineError::DuplicateTask {
                    task_id: existing.id,
                    status: existing.status,
                });
            }

            existing.rearm()?;
            store.save(&existing).await?;
            debug!(
                "[Orchestrator] Re-armed failed task {} ('{}')",
                existing.id, word
            );
            for p in self.inner.plugins.iter() {
                p.on_retry(&existing).await;
            }
            self.dispatch(&existing);

            return Ok(CreatedTask {
                task_id: existing.id,
                status: TaskStatus::Querying,
                retried: true,
            });
        }

        let task = store.create(word).await?;
        trace!("[Orchestrator] Created task {} ('{}')", task.id, word);
        for p in self.inner.plugins.iter() {
            p.on_enqueued(&task).await;
        }
        self.dispatch(&task);

        Ok(CreatedTask {
            task_id: task.id,
            status: TaskStatus::Querying,
            retried: false,
        })
    }

    /// 批量创建
    ///
    /// 逐个调用 `create`，结果分三类汇报；单个失败不会中断后面的单词。
    pub async fn batch_create<I, S>(&self, words: I) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = BatchReport::default();

        for word in words {
            let word = word.as_ref();
            match self.create(word).await {
                Ok(created) => report.created.push(BatchCreated {
                    word: word.to_string(),
                    task_id: created.task_id,
                }),
                Err(PipelineError::DuplicateTask { task_id, status }) => {
                    report.existing.push(BatchExisting {
                        word: word.to_string(),
                        task_id,
                        status,
                    })
                }
                Err(e) => {
                    warn!("[Orchestrator] Batch create '{}' failed: {}", word, e);
                    report.failed.push(BatchFailed {
                        word: word.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }

    // ==========================================
    // 2. 查询派发 (Dispatch)
    // ==========================================

    /// 后台派发一次查询
    ///
    /// 调用方不等待；查询结果唯一的出口是任务记录本身。
    /// 并发许可在后台任务内部获取，调用方永远不会因为并发上限而阻塞。
    pub(super) fn dispatch(&self, task: &ImportTask) {
        let this = self.clone();
        let task_id = task.id.clone();
        let word = task.word.clone();

        *self.inner.in_flight.entry(task_id.clone()).or_insert(0) += 1;
        self.inner.ctx.metrics.inc_in_flight();

        self.inner.tracker.spawn(async move {
            this.run_lookup(&task_id, &word).await;
            this.release_in_flight(&task_id);
        });
    }

    fn release_in_flight(&self, task_id: &str) {
        self.inner
            .in_flight
            .remove_if_mut(task_id, |_, count| {
                *count = count.saturating_sub(1);
                *count == 0
            });
        self.inner.ctx.metrics.dec_in_flight();
    }

    async fn run_lookup(&self, task_id: &str, word: &str) {
        let outcome = {
            let _permit = match self.inner.semaphore.acquire().await {
                Ok(p) => p,
                Err(_) => {
                    error!("[Orchestrator] Semaphore closed, task {} not looked up", task_id);
                    return;
                }
            };
            self.lookup(task_id, word).await
        };

        self.write_back(task_id, outcome).await;
    }

    /// 调用 Enricher 并校验结果
    async fn lookup(&self, task_id: &str, word: &str) -> LookupOutcome {
        let result = AssertUnwindSafe(self.inner.ctx.enricher.lookup(word))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(mut data)) => match data.validate() {
                Ok(()) => {
                    data.stamp_created_at();
                    Ok(data)
                }
                Err(e) => Err(e.to_string()),
            },
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(panic_err) => {
                let msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    format!("Panic: {}", s)
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    format!("Panic: {}", s)
                } else {
                    "Panic: Unknown error".to_string()
                };
                error!("[Orchestrator] Enricher panicked on task {}: {}", task_id, msg);
                Err(msg)
            }
        }
    }

    /// 把查询结果写回任务 (尽力而为)
    ///
    /// 失败会按退避重试 `writeback_retries` 次，仍然失败就记日志后放弃，
    /// 任务停留在 querying，等待巡检恢复。
    async fn write_back(&self, task_id: &str, outcome: LookupOutcome) {
        let retries = self.inner.ctx.config.orchestrator.writeback_retries;

        for attempt in 0..=retries {
            match self.try_write_back(task_id, &outcome).await {
                Ok(WriteBack::Written(task)) => {
                    for p in self.inner.plugins.iter() {
                        match task.status {
                            TaskStatus::Ready => p.on_ready(&task).await,
                            _ => p.on_failed(&task).await,
                        }
                    }
                    trace!("[Orchestrator] Task {} settled as {}", task_id, task.status);
                    return;
                }
                Ok(WriteBack::Skipped) => {
                    debug!(
                        "[Orchestrator] Task {} vanished or moved on, result discarded",
                        task_id
                    );
                    return;
                }
                Err(e) => {
                    warn!(
                        "[Orchestrator] Write-back for task {} failed (attempt {}): {}",
                        task_id,
                        attempt + 1,
                        e
                    );
                    if attempt < retries {
                        let delay =
                            calculate_backoff(attempt + 1, WRITEBACK_BASE_DELAY, WRITEBACK_MAX_DELAY);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        error!(
            "[Orchestrator] Write-back for task {} dropped after {} attempts",
            task_id,
            retries + 1
        );
        self.inner.ctx.metrics.inc_dropped();
    }

    async fn try_write_back(&self, task_id: &str, outcome: &LookupOutcome) -> Result<WriteBack> {
        let store = &self.inner.ctx.tasks;

        let Some(mut task) = store.load(task_id).await? else {
            return Ok(WriteBack::Skipped);
        };
        if task.status != TaskStatus::Querying {
            return Ok(WriteBack::Skipped);
        }

        match outcome {
            Ok(data) => task.mark_ready(data.clone())?,
            Err(reason) => task.mark_failed(reason.as_str())?,
        }
        store.save(&task).await?;
        Ok(WriteBack::Written(task))
    }

    // ==========================================
    // 3. 读取 (Read)
    // ==========================================

    /// 任务详情，word_data 解码为结构化形式
    pub async fn get_detail(&self, task_id: &str) -> Result<ImportTask> {
        let mut task = self.load_existing(task_id).await?;
        if let Some(data) = task.decoded_word_data()? {
            task.word_data = Some(StoredWordData::Structured(data));
        }
        Ok(task)
    }

    /// 列出任务 (新的在前，不带 word_data)
    pub async fn list(&self, status: Option<TaskStatus>) -> Result<Vec<ImportTask>> {
        let limit = self.inner.ctx.config.orchestrator.list_limit;
        let tasks = self.inner.ctx.tasks.list(status, limit).await?;
        Ok(tasks.into_iter().map(ImportTask::without_payload).collect())
    }

    /// 按状态统计 (扫描全部任务)
    pub async fn stats(&self) -> Result<TaskStats> {
        let tasks = self.inner.ctx.tasks.list(None, usize::MAX).await?;

        let mut stats = TaskStats::default();
        for task in &tasks {
            stats.record(task.status);
        }
        Ok(stats)
    }

    async fn load_existing(&self, task_id: &str) -> Result<ImportTask> {
        self.inner
            .ctx
            .tasks
            .load(task_id)
            .await?
            .ok_or_else(|| PipelineError::TaskNotFound(task_id.to_string()))
    }

    // ==========================================
    // 4. 导入 (Import)
    // ==========================================

    /// 把 ready 任务的载荷提交进词典
    ///
    /// 先 upsert 单词，再写任务状态：中途失败时任务仍是 ready，可以整体重来。
    pub async fn import(&self, task_id: &str, dictionary_id: &str) -> Result<ImportTask> {
        let mut task = self.load_existing(task_id).await?;
        if task.status != TaskStatus::Ready {
            return Err(PipelineError::InvalidState {
                task_id: task.id,
                status: task.status,
            });
        }

        let data = task
            .decoded_word_data()?
            .ok_or_else(|| PipelineError::IncompletePayload("missing word_data".into()))?;
        data.validate()?;

        let cfg = &self.inner.ctx.config.orchestrator;
        let brief = data.brief(cfg.brief_definitions, &cfg.brief_separator);
        let record = WordRecord::new(dictionary_id, data, brief);
        self.inner.ctx.words.upsert_word(record).await?;

        task.mark_imported(dictionary_id)?;
        self.inner.ctx.tasks.save(&task).await?;
        debug!(
            "[Orchestrator] Task {} ('{}') imported into {}",
            task.id, task.word, dictionary_id
        );

        for p in self.inner.plugins.iter() {
            p.on_imported(&task).await;
        }
        Ok(task)
    }

    /// 删除任务 (不级联删除已导入的单词)
    pub async fn delete(&self, task_id: &str) -> Result<()> {
        self.inner.ctx.tasks.remove(task_id).await?;
        trace!("[Orchestrator] Task {} deleted", task_id);
        Ok(())
    }

    // ==========================================
    // 5. 生命周期 (Lifecycle)
    // ==========================================

    /// 当前在本进程内查询中的任务数
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// 等待所有已派发的查询写回完毕
    ///
    /// 多个调用方并发等待时排队执行，避免一方 reopen 后另一方永远等不到。
    pub async fn wait_idle(&self) {
        let _gate = self.inner.idle_gate.lock().await;
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.tracker.reopen();
    }

    /// 触发停机
    ///
    /// 只停止巡检；已派发的查询会继续跑完，需要的话配合 `wait_idle`。
    pub fn shutdown(&self) {
        trace!("[Orchestrator] Shutdown triggered.");
        self.inner.ctx.shutdown.cancel();
    }
}
