use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    common::{PipelineConfig, PipelineError, Result},
    enricher::Enricher,
    orchestrator::{
        OrchestratorContext, OrchestratorPlugin, PipelineMetrics, TaskOrchestrator,
        plugins::MetricsPlugin,
    },
    persistence::{TaskStore, WordStore, memory::MemoryPersistence},
    policy::{ExponentialBackoff, WaitStrategy},
};

/// 编排器构造器 (Builder Pattern)
///
/// **默认行为**:
/// - Config: `PipelineConfig::default()`
/// - Persistence: 未设置的存储统一落到同一个 `MemoryPersistence`
/// - WaitStrategy: 指数退避 (sweep.interval_ms ~ sweep.max_interval_ms，带抖动)
/// - Enricher: 必填，缺失时 `build` 返回 Config 错误
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: Option<PipelineConfig>,
    tasks: Option<Arc<dyn TaskStore>>,
    words: Option<Arc<dyn WordStore>>,
    enricher: Option<Arc<dyn Enricher>>,
    wait_strategy: Option<Arc<dyn WaitStrategy>>,
    plugins: Vec<Box<dyn OrchestratorPlugin>>,
    shutdown: Option<CancellationToken>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 设置持久化层
    ///
    /// 同一个实例同时充当任务存储和词库存储。
    pub fn with_persistence<P>(mut self, persistence: P) -> Self
    where
        P: TaskStore + WordStore,
    {
        let arc = Arc::new(persistence);
        self.tasks = Some(arc.clone());
        self.words = Some(arc);
        self
    }

    /// 设置共享的持久化层 (调用方还要把同一个实例交给采样器、词典目录)
    pub fn with_shared_persistence<P>(mut self, persistence: Arc<P>) -> Self
    where
        P: TaskStore + WordStore,
    {
        self.tasks = Some(persistence.clone());
        self.words = Some(persistence);
        self
    }

    pub fn with_store<S>(mut self, store: S) -> Self
    where
        S: TaskStore,
    {
        self.tasks = Some(Arc::new(store));
        self
    }

    pub fn with_word_store<W>(mut self, words: W) -> Self
    where
        W: WordStore,
    {
        self.words = Some(Arc::new(words));
        self
    }

    pub fn with_enricher<E>(mut self, enricher: E) -> Self
    where
        E: Enricher,
    {
        self.enricher = Some(Arc::new(enricher));
        self
    }

    pub fn with_shared_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// 设置巡检的等待策略
    pub fn with_wait_strategy<S>(mut self, strategy: S) -> Self
    where
        S: WaitStrategy,
    {
        self.wait_strategy = Some(Arc::new(strategy));
        self
    }

    /// 添加插件
    ///
    /// **注意**: 插件的执行顺序与添加顺序一致 (FIFO)，MetricsPlugin 永远在最前。
    pub fn with_plugin<PL>(mut self, plugin: PL) -> Self
    where
        PL: OrchestratorPlugin,
    {
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn build(mut self) -> Result<TaskOrchestrator> {
        let enricher = self
            .enricher
            .ok_or_else(|| PipelineError::Config("an Enricher is required".into()))?;
        let config = self.config.unwrap_or_default();
        if config.orchestrator.max_concurrency == 0 {
            return Err(PipelineError::Config(
                "orchestrator.max_concurrency must be at least 1".into(),
            ));
        }

        // 没有显式设置的存储共用同一个内存实例
        let memory = Arc::new(MemoryPersistence::new());
        let tasks: Arc<dyn TaskStore> = match self.tasks {
            Some(tasks) => tasks,
            None => {
                debug!("[Orchestrator] Using default MemoryPersistence for tasks");
                memory.clone()
            }
        };
        let words: Arc<dyn WordStore> = match self.words {
            Some(words) => words,
            None => {
                debug!("[Orchestrator] Using default MemoryPersistence for words");
                memory
            }
        };

        let wait_strategy = self.wait_strategy.unwrap_or_else(|| {
            Arc::new(
                ExponentialBackoff::new(config.sweep.interval_ms, config.sweep.max_interval_ms)
                    .with_jitter(),
            )
        });

        // 自动注入 MetricsPlugin
        let metrics = Arc::new(PipelineMetrics::default());
        self.plugins
            .insert(0, Box::new(MetricsPlugin::new(metrics.clone())));

        let shutdown = self.shutdown.unwrap_or_default();
        let ctx = OrchestratorContext::new(tasks, words, enricher, config, metrics, shutdown);

        Ok(TaskOrchestrator::new_with_components(
            ctx,
            self.plugins,
            wait_strategy,
        ))
    }
}
