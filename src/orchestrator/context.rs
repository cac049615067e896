use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{
    common::config::PipelineConfig,
    enricher::Enricher,
    orchestrator::PipelineMetrics,
    persistence::{TaskStore, WordStore},
};

/// 编排器上下文
///
/// 打包编排器运行所需的全部共享资源，避免在函数调用时传递一长串参数。
/// 所有字段都是 Arc，克隆很便宜。
#[derive(Clone)]
pub struct OrchestratorContext {
    /// 任务存储 (唯一的持久状态来源)
    pub tasks: Arc<dyn TaskStore>,

    /// 词库存储 (import 写入目标)
    pub words: Arc<dyn WordStore>,

    /// 释义查询服务
    pub enricher: Arc<dyn Enricher>,

    pub config: Arc<PipelineConfig>,

    pub metrics: Arc<PipelineMetrics>,

    /// 关机信号 (只停巡检，不取消已派发的查询)
    pub shutdown: CancellationToken,
}

impl OrchestratorContext {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        words: Arc<dyn WordStore>,
        enricher: Arc<dyn Enricher>,
        config: PipelineConfig,
        metrics: Arc<PipelineMetrics>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            tasks,
            words,
            enricher,
            config: Arc::new(config),
            metrics,
            shutdown,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
