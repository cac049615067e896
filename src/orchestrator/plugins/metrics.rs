use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    common::model::ImportTask,
    orchestrator::{OrchestratorPlugin, PipelineMetrics},
};

/// 指标插件 (构建时自动注入在第一位)
pub struct MetricsPlugin {
    metrics: Arc<PipelineMetrics>,
}

impl MetricsPlugin {
    pub fn new(metrics: Arc<PipelineMetrics>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl OrchestratorPlugin for MetricsPlugin {
    async fn on_enqueued(&self, _task: &ImportTask) {
        self.metrics.inc_enqueued();
    }

    async fn on_retry(&self, _task: &ImportTask) {
        self.metrics.inc_retried();
    }

    async fn on_ready(&self, _task: &ImportTask) {
        self.metrics.inc_ready();
    }

    async fn on_failed(&self, _task: &ImportTask) {
        self.metrics.inc_failed();
    }

    async fn on_imported(&self, _task: &ImportTask) {
        self.metrics.inc_imported();
    }
}
