use dashmap::DashMap;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use crate::common::model::{Dictionary, HistoryEntry, ImportTask, WeightRecord, WordRecord};

/// 每个词典保留的历史条数
const DEFAULT_HISTORY_LIMIT: usize = 200;

/// 单词/权重的复合键 (dictionary_id, word)
pub(super) type WordKey = (String, String);

/// 内存持久化实现 (In-Memory Persistence)
///
/// 同时实现了 TaskStore、WordStore、HistoryRecorder 和 DictionaryStore。
/// 适合单机部署和测试；所有字段都是 Arc，Clone 后共享同一份数据。
#[derive(Debug, Clone)]
pub struct MemoryPersistence {
    /// 【任务表】ID -> ImportTask
    /// - DashMap: 分片锁，高并发读写不排队
    pub(super) tasks: Arc<DashMap<String, ImportTask>>,

    /// 【单词表】(dictionary_id, word) -> WordRecord
    pub(super) words: Arc<DashMap<WordKey, WordRecord>>,

    /// 【权重表】(dictionary_id, word) -> WeightRecord
    pub(super) weights: Arc<DashMap<WordKey, WeightRecord>>,

    /// 【词典表】ID -> Dictionary
    pub(super) dictionaries: Arc<DashMap<String, Dictionary>>,

    /// 【历史】dictionary_id -> 最近抽到的单词 (新的在前)
    pub(super) history: Arc<Mutex<HashMap<String, VecDeque<HistoryEntry>>>>,

    pub(super) history_limit: usize,
}

impl Default for MemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPersistence {
    /// 创建一个新的内存持久化实例
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            words: Arc::new(DashMap::new()),
            weights: Arc::new(DashMap::new()),
            dictionaries: Arc::new(DashMap::new()),
            history: Arc::new(Mutex::new(HashMap::new())),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// 设置每个词典保留的历史条数
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    /// 最近抽到的单词 (新的在前)
    ///
    /// 调用方可以拿它作为下一次抽词的 `exclude_words`。
    pub fn recent_words(&self, dictionary_id: &str, limit: usize) -> Vec<String> {
        let history = self.history.lock();
        history
            .get(dictionary_id)
            .map(|entries| entries.iter().take(limit).map(|e| e.word.clone()).collect())
            .unwrap_or_default()
    }

    pub(super) fn key(dictionary_id: &str, word: &str) -> WordKey {
        (dictionary_id.to_string(), word.to_string())
    }
}
