use async_trait::async_trait;

use crate::common::model::ImportTask;

/// 编排器插件/钩子接口
///
/// 每个钩子都在对应的状态已经写进存储之后调用，拿到的是写入后的任务快照。
/// 常见用途：指标、审计日志、通知前端刷新。
///
/// 钩子按注册顺序 (FIFO) 依次执行，不能改变编排结果。
#[async_trait]
pub trait OrchestratorPlugin: Send + Sync + 'static {
    /// 新任务已创建 (querying)
    async fn on_enqueued(&self, _task: &ImportTask) {}

    /// 已有任务被重新派发 (failed -> querying，或巡检恢复滞留任务)
    async fn on_retry(&self, _task: &ImportTask) {}

    /// 查询成功，已写回 ready
    async fn on_ready(&self, _task: &ImportTask) {}

    /// 查询失败，已写回 failed
    async fn on_failed(&self, _task: &ImportTask) {}

    /// 已导入词典
    async fn on_imported(&self, _task: &ImportTask) {}
}
