mod common;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use common::{eventually, word_with};
use dictking_core::common::config::SamplerConfig;
use dictking_core::common::model::{HistoryEntry, WeightRecord, WordRecord};
use dictking_core::persistence::{HistoryRecorder, StoreCode, WordStore};
use dictking_core::{MemoryPersistence, PipelineError, Result, WeightedSampler};

async fn seed_words(memory: &MemoryPersistence, dictionary: &str, words: &[&str]) {
    for word in words {
        let data = word_with(word, &["释义"]);
        memory
            .upsert_word(WordRecord::new(dictionary, data, "释义".into()))
            .await
            .unwrap();
    }
}

fn sampler(memory: &MemoryPersistence, seed: u64) -> WeightedSampler {
    let shared = Arc::new(memory.clone());
    WeightedSampler::new(shared.clone(), shared, SamplerConfig::default()).with_seed(seed)
}

fn ten_words() -> Vec<String> {
    (0..10).map(|i| format!("w{i}")).collect()
}

#[tokio::test]
async fn frequency_follows_weights() {
    let memory = MemoryPersistence::new();
    seed_words(&memory, "d", &["a", "b", "c"]).await;
    let sampler = sampler(&memory, 42);
    sampler
        .update_weights("d", [("a", 1.0), ("b", 1.0), ("c", 8.0)])
        .await
        .unwrap();

    let trials = 10_000;
    let mut hits = 0;
    for _ in 0..trials {
        if sampler.get_random("d", &[]).await.unwrap().word == "c" {
            hits += 1;
        }
    }
    let freq = hits as f64 / trials as f64;
    assert!((freq - 0.8).abs() < 0.03, "frequency of c was {freq}");
}

#[tokio::test]
async fn too_many_exclusions_fall_back_to_all_words() {
    let memory = MemoryPersistence::new();
    let words = ten_words();
    let refs: Vec<&str> = words.iter().map(String::as_str).collect();
    seed_words(&memory, "d", &refs).await;
    let sampler = sampler(&memory, 7);

    let exclude: Vec<String> = words[..8].to_vec();
    let mut seen = std::collections::HashSet::new();
    for _ in 0..300 {
        seen.insert(sampler.get_random("d", &exclude).await.unwrap().word);
    }
    assert_eq!(seen.len(), 10);
}

#[tokio::test]
async fn exclusions_apply_when_enough_remain() {
    let memory = MemoryPersistence::new();
    let words = ten_words();
    let refs: Vec<&str> = words.iter().map(String::as_str).collect();
    seed_words(&memory, "d", &refs).await;
    let sampler = sampler(&memory, 7);

    let exclude: Vec<String> = words[..2].to_vec();
    for _ in 0..300 {
        let word = sampler.get_random("d", &exclude).await.unwrap().word;
        assert!(!exclude.contains(&word), "{word} should have been excluded");
    }
}

#[tokio::test]
async fn empty_dictionary_is_an_error() {
    let memory = MemoryPersistence::new();
    let err = sampler(&memory, 1).get_random("d", &[]).await.unwrap_err();
    assert!(matches!(err, PipelineError::EmptyDictionary(ref d) if d == "d"));
}

#[tokio::test]
async fn sampling_records_history_and_never_touches_weights() {
    let memory = MemoryPersistence::new();
    seed_words(&memory, "d", &["quench"]).await;
    let sampler = sampler(&memory, 1);

    let data = sampler.get_random("d", &[]).await.unwrap();
    assert_eq!(data.word, "quench");

    assert!(eventually(|| memory.recent_words("d", 10) == vec!["quench".to_string()]).await);
    assert!(sampler.weights("d").await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_weights_are_rejected() {
    let memory = MemoryPersistence::new();
    let sampler = sampler(&memory, 1);

    for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let err = sampler
            .update_weights("d", [("a", 5.0), ("b", bad)])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidWeight { ref word, .. } if word == "b"));
    }
    // 整批拒绝
    assert!(sampler.weights("d").await.unwrap().is_empty());

    sampler.update_weights("d", [("a", 5.0)]).await.unwrap();
    assert_eq!(sampler.weights("d").await.unwrap().get("a"), Some(&5.0));
}

// ==========================================
// 故障注入
// ==========================================

struct BrokenHistory;

#[async_trait]
impl HistoryRecorder for BrokenHistory {
    async fn record(&self, _entry: HistoryEntry) -> Result<()> {
        Err(PipelineError::store(StoreCode::Unavailable, "history down"))
    }
}

#[tokio::test]
async fn history_failure_is_not_surfaced() {
    let memory = MemoryPersistence::new();
    seed_words(&memory, "d", &["quench"]).await;
    let sampler = WeightedSampler::new(
        Arc::new(memory.clone()),
        Arc::new(BrokenHistory),
        SamplerConfig::default(),
    );

    assert_eq!(sampler.get_random("d", &[]).await.unwrap().word, "quench");
}

/// 单词列表里有、详情却已经消失的存储
struct VanishingWords {
    weights_fail: bool,
}

#[async_trait]
impl WordStore for VanishingWords {
    async fn word_keys(&self, _dictionary_id: &str, _limit: usize) -> Result<Vec<String>> {
        Ok(vec!["ghost".to_string()])
    }

    async fn load_word(&self, _dictionary_id: &str, _word: &str) -> Result<Option<WordRecord>> {
        Ok(None)
    }

    async fn upsert_word(&self, _record: WordRecord) -> Result<()> {
        Ok(())
    }

    async fn count_words(&self, _dictionary_id: &str) -> Result<usize> {
        Ok(1)
    }

    async fn weights(&self, _dictionary_id: &str, _limit: usize) -> Result<Vec<WeightRecord>> {
        if self.weights_fail {
            return Err(PipelineError::store(StoreCode::Unavailable, "weights down"));
        }
        Ok(Vec::new())
    }

    async fn upsert_weights(&self, _records: Vec<WeightRecord>) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn vanished_word_is_retryable_not_found() {
    for weights_fail in [false, true] {
        let sampler = WeightedSampler::new(
            Arc::new(VanishingWords { weights_fail }),
            Arc::new(MemoryPersistence::new()),
            SamplerConfig::default(),
        );
        let err = sampler.get_random("d", &[]).await.unwrap_err();
        assert!(matches!(err, PipelineError::WordNotFound { ref word, .. } if word == "ghost"));
        assert!(err.is_retryable());
    }
}

#[tokio::test]
async fn weights_map_round_trips_through_store() {
    let memory = MemoryPersistence::new();
    let sampler = sampler(&memory, 1);
    let weights = HashMap::from([("quench".to_string(), 3.5), ("dispel".to_string(), 120.0)]);
    sampler.update_weights("d", weights).await.unwrap();

    let stored = sampler.weights("d").await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored["quench"], 3.5);
    assert_eq!(memory.weights("d", 10).await.unwrap()[0].word, "dispel");
}
