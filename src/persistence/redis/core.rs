use deadpool_redis::{Config, Pool, Runtime};
use serde::de::DeserializeOwned;

use crate::common::config::PipelineConfig;
use crate::common::error::{PipelineError, Result};
use crate::persistence::StoreCode;

/// 每个词典保留的历史条数
pub(super) const HISTORY_LIMIT: isize = 200;

/// Redis 持久化实现
///
/// 多个进程共享同一个命名空间即可共享任务表和词库。
/// Key 布局 (以 namespace = "dictking" 为例):
/// - `dictking:task:seq`           STRING  任务 ID 自增序列
/// - `dictking:task:{id}`          STRING  ImportTask JSON
/// - `dictking:tasks`              ZSET    任务 ID, score = created_at
/// - `dictking:task:by_word`       HASH    word -> 最早创建的任务 ID
/// - `dictking:words:{dict}`       HASH    word -> WordRecord JSON
/// - `dictking:weights:{dict}`     HASH    word -> 权重
/// - `dictking:history:{dict}`     LIST    HistoryEntry JSON (新的在前)
/// - `dictking:dictionaries`       HASH    id -> Dictionary JSON
#[derive(Clone)]
pub struct RedisPersistence {
    pub(super) pool: Pool,

    /// Key 前缀 (命名空间)
    pub(super) namespace: String,
}

impl std::fmt::Debug for RedisPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPersistence")
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl RedisPersistence {
    /// 创建新实例
    pub fn new(config: &PipelineConfig, url: &str) -> Result<Self> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| PipelineError::Config(format!("redis pool: {e}")))?;

        Ok(Self {
            pool,
            namespace: config.namespace.clone(),
        })
    }

    // ==========================================
    // Key 生成辅助函数
    // ==========================================

    pub(super) fn key_task_seq(&self) -> String {
        format!("{}:task:seq", self.namespace)
    }

    pub(super) fn key_task(&self, id: &str) -> String {
        format!("{}:task:{}", self.namespace, id)
    }

    pub(super) fn key_tasks(&self) -> String {
        format!("{}:tasks", self.namespace)
    }

    pub(super) fn key_task_by_word(&self) -> String {
        format!("{}:task:by_word", self.namespace)
    }

    pub(super) fn key_words(&self, dictionary_id: &str) -> String {
        format!("{}:words:{}", self.namespace, dictionary_id)
    }

    pub(super) fn key_weights(&self, dictionary_id: &str) -> String {
        format!("{}:weights:{}", self.namespace, dictionary_id)
    }

    pub(super) fn key_history(&self, dictionary_id: &str) -> String {
        format!("{}:history:{}", self.namespace, dictionary_id)
    }

    pub(super) fn key_dictionaries(&self) -> String {
        format!("{}:dictionaries", self.namespace)
    }
}

/// 解析存储中的 JSON，失败视为数据损坏
pub(super) fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        PipelineError::store(StoreCode::Corrupted, format!("{key}: {e}"))
    })
}
