use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{trace, warn};

use super::selection::{candidate_set, pick_weighted};
use crate::common::config::SamplerConfig;
use crate::common::error::{PipelineError, Result};
use crate::common::model::{HistoryEntry, WeightRecord, WordData};
use crate::persistence::{HistoryRecorder, WordStore};

/// 加权随机抽词器
///
/// 按用户维护的权重抽一个单词，同时尽量避开最近出现过的单词。
/// 抽词本身从不修改单词和权重；历史记录是后台写入，失败只记日志。
pub struct WeightedSampler {
    words: Arc<dyn WordStore>,
    history: Arc<dyn HistoryRecorder>,
    config: SamplerConfig,
    rng: Mutex<StdRng>,
}

impl WeightedSampler {
    pub fn new(
        words: Arc<dyn WordStore>,
        history: Arc<dyn HistoryRecorder>,
        config: SamplerConfig,
    ) -> Self {
        Self {
            words,
            history,
            config,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// 固定随机种子，抽取序列可复现
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// 从词典中抽一个单词
    ///
    /// 1. 并发拉取单词列表和权重表
    /// 2. 计算候选集 (排除词太多时放弃排除)
    /// 3. 按权重抽取，取回完整记录
    /// 4. 后台写历史
    pub async fn get_random(&self, dictionary_id: &str, exclude: &[String]) -> Result<WordData> {
        let page = self.config.page_size;
        let (keys, weights) = tokio::join!(
            self.words.word_keys(dictionary_id, page),
            self.words.weights(dictionary_id, page),
        );

        let keys = keys?;
        if keys.is_empty() {
            return Err(PipelineError::EmptyDictionary(dictionary_id.to_string()));
        }

        // 权重表读不到时按全部默认权重处理，不影响抽词
        let weights: HashMap<String, f64> = match weights {
            Ok(records) => records.into_iter().map(|r| (r.word, r.weight)).collect(),
            Err(e) => {
                warn!(
                    "[Sampler] Loading weights of {} failed, using defaults: {}",
                    dictionary_id, e
                );
                HashMap::new()
            }
        };

        let candidates = candidate_set(
            &keys,
            exclude,
            self.config.min_candidates,
            self.config.min_candidate_ratio,
        );
        let picked = {
            let mut rng = self.rng.lock();
            pick_weighted(&candidates, &weights, self.config.default_weight, &mut *rng)
        }
        .ok_or_else(|| PipelineError::EmptyDictionary(dictionary_id.to_string()))?;
        trace!(
            "[Sampler] Picked '{}' from {} candidate(s) in {}",
            picked,
            candidates.len(),
            dictionary_id
        );

        let record = self
            .words
            .load_word(dictionary_id, picked)
            .await?
            .ok_or_else(|| PipelineError::WordNotFound {
                dictionary_id: dictionary_id.to_string(),
                word: picked.to_string(),
            })?;
        let data = record.data.decode()?;

        self.record_history(HistoryEntry::new(dictionary_id, picked));
        Ok(data)
    }

    fn record_history(&self, entry: HistoryEntry) {
        let history = self.history.clone();
        tokio::spawn(async move {
            if let Err(e) = history.record(entry).await {
                warn!("[Sampler] History write failed: {}", e);
            }
        });
    }

    // ==========================================
    // 权重维护 (Weights)
    // ==========================================

    /// 词典中的显式权重 (word -> weight)
    pub async fn weights(&self, dictionary_id: &str) -> Result<BTreeMap<String, f64>> {
        let records = self
            .words
            .weights(dictionary_id, self.config.page_size)
            .await?;
        Ok(records.into_iter().map(|r| (r.word, r.weight)).collect())
    }

    /// 批量设置权重
    ///
    /// 只接受有限的正数；任意一个不合法则整批拒绝。
    pub async fn update_weights<I, S>(&self, dictionary_id: &str, weights: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut records = Vec::new();
        for (word, weight) in weights {
            let word = word.into();
            if !(weight.is_finite() && weight > 0.0) {
                return Err(PipelineError::InvalidWeight { word, weight });
            }
            records.push(WeightRecord {
                dictionary_id: dictionary_id.to_string(),
                word,
                weight,
            });
        }
        self.words.upsert_weights(records).await
    }
}
