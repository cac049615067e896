pub mod bailian;

use async_trait::async_trait;

use crate::common::model::WordData;

pub use bailian::{BaiLianEnricher, EnrichError};

/// 释义查询服务接口 (Enricher)
///
/// 给定一个单词，返回结构化的释义载荷，或者失败。
/// 这是一个尽力而为的外部依赖：网络错误、超时、非 2xx、格式不对都只是一次普通的失败，
/// 错误链 (`{:#}`) 会原样写进任务的 `error_message`。
///
/// 编排器会在调用后再做一次必填字段校验，实现方不需要重复校验。
#[async_trait]
pub trait Enricher: Send + Sync + 'static {
    async fn lookup(&self, word: &str) -> anyhow::Result<WordData>;
}
