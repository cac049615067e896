use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use std::collections::HashMap;

use super::core::{HISTORY_LIMIT, RedisPersistence, decode};
use crate::common::error::{PipelineError, Result};
use crate::common::model::{Dictionary, HistoryEntry, WeightRecord, WordRecord};
use crate::persistence::StoreCode;
use crate::persistence::traits::{DictionaryStore, HistoryRecorder, WordStore};

#[async_trait]
impl WordStore for RedisPersistence {
    async fn word_keys(&self, dictionary_id: &str, limit: usize) -> Result<Vec<String>> {
        let mut conn = self.pool.get().await?;
        let mut words: Vec<String> = conn.hkeys(self.key_words(dictionary_id)).await?;
        words.sort();
        words.truncate(limit);
        Ok(words)
    }

    async fn load_word(&self, dictionary_id: &str, word: &str) -> Result<Option<WordRecord>> {
        let mut conn = self.pool.get().await?;
        let key = self.key_words(dictionary_id);
        let json: Option<String> = conn.hget(&key, word).await?;

        json.map(|s| decode(&key, &s)).transpose()
    }

    async fn upsert_word(&self, mut record: WordRecord) -> Result<()> {
        // 读旧值保留 created_at；两次写之间的竞争只影响 created_at
        if let Some(existing) = self.load_word(&record.dictionary_id, &record.word).await? {
            record.created_at = existing.created_at;
        }

        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(&record)?;
        let _: () = conn
            .hset(self.key_words(&record.dictionary_id), &record.word, json)
            .await?;
        Ok(())
    }

    async fn count_words(&self, dictionary_id: &str) -> Result<usize> {
        let mut conn = self.pool.get().await?;
        let count: usize = conn.hlen(self.key_words(dictionary_id)).await?;
        Ok(count)
    }

    async fn weights(&self, dictionary_id: &str, limit: usize) -> Result<Vec<WeightRecord>> {
        let mut conn = self.pool.get().await?;
        let key = self.key_weights(dictionary_id);
        let raw: HashMap<String, String> = conn.hgetall(&key).await?;

        let mut weights = Vec::with_capacity(raw.len());
        for (word, value) in raw {
            let weight: f64 = value.parse().map_err(|_| {
                PipelineError::store(
                    StoreCode::Corrupted,
                    format!("{key}: weight of '{word}' is '{value}'"),
                )
            })?;
            weights.push(WeightRecord {
                dictionary_id: dictionary_id.to_string(),
                word,
                weight,
            });
        }
        weights.sort_by(|a, b| a.word.cmp(&b.word));
        weights.truncate(limit);
        Ok(weights)
    }

    async fn upsert_weights(&self, records: Vec<WeightRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get().await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for record in &records {
            pipe.hset(
                self.key_weights(&record.dictionary_id),
                &record.word,
                record.weight.to_string(),
            );
        }
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryRecorder for RedisPersistence {
    async fn record(&self, entry: HistoryEntry) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let key = self.key_history(&entry.dictionary_id);
        let json = serde_json::to_string(&entry)?;

        redis::pipe()
            .lpush(&key, json)
            .ltrim(&key, 0, HISTORY_LIMIT - 1)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DictionaryStore for RedisPersistence {
    async fn create_dictionary(&self, dictionary: Dictionary) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(&dictionary)?;
        let inserted: bool = conn
            .hset_nx(self.key_dictionaries(), &dictionary.id, json)
            .await?;

        if !inserted {
            return Err(PipelineError::store(
                StoreCode::Conflict,
                format!("dictionary {} already exists", dictionary.id),
            ));
        }
        Ok(())
    }

    async fn load_dictionary(&self, id: &str) -> Result<Option<Dictionary>> {
        let mut conn = self.pool.get().await?;
        let key = self.key_dictionaries();
        let json: Option<String> = conn.hget(&key, id).await?;

        json.map(|s| decode(&key, &s)).transpose()
    }

    async fn list_dictionaries(&self) -> Result<Vec<Dictionary>> {
        let mut conn = self.pool.get().await?;
        let key = self.key_dictionaries();
        let raw: HashMap<String, String> = conn.hgetall(&key).await?;

        let mut all = raw
            .values()
            .map(|s| decode::<Dictionary>(&key, s))
            .collect::<Result<Vec<_>>>()?;
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn save_dictionary(&self, dictionary: &Dictionary) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(dictionary)?;
        let _: () = conn
            .hset(self.key_dictionaries(), &dictionary.id, json)
            .await?;
        Ok(())
    }

    async fn remove_dictionary(&self, id: &str) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let _: () = conn.hdel(self.key_dictionaries(), id).await?;
        Ok(())
    }
}
