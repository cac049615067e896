use async_trait::async_trait;

use super::MemoryPersistence;
use crate::common::error::{PipelineError, Result};
use crate::common::model::{Dictionary, HistoryEntry, WeightRecord, WordRecord};
use crate::persistence::StoreCode;
use crate::persistence::traits::{DictionaryStore, HistoryRecorder, WordStore};

#[async_trait]
impl WordStore for MemoryPersistence {
    async fn word_keys(&self, dictionary_id: &str, limit: usize) -> Result<Vec<String>> {
        let mut words: Vec<String> = self
            .words
            .iter()
            .filter(|entry| entry.key().0 == dictionary_id)
            .map(|entry| entry.key().1.clone())
            .collect();
        words.sort();
        words.truncate(limit);
        Ok(words)
    }

    async fn load_word(&self, dictionary_id: &str, word: &str) -> Result<Option<WordRecord>> {
        Ok(self
            .words
            .get(&Self::key(dictionary_id, word))
            .map(|v| v.clone()))
    }

    async fn upsert_word(&self, mut record: WordRecord) -> Result<()> {
        let key = Self::key(&record.dictionary_id, &record.word);
        // entry 持有分片锁，读旧值和写新值之间不会被插队
        self.words
            .entry(key)
            .and_modify(|existing| {
                record.created_at = existing.created_at;
                *existing = record.clone();
            })
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn count_words(&self, dictionary_id: &str) -> Result<usize> {
        Ok(self
            .words
            .iter()
            .filter(|entry| entry.key().0 == dictionary_id)
            .count())
    }

    async fn weights(&self, dictionary_id: &str, limit: usize) -> Result<Vec<WeightRecord>> {
        let mut weights: Vec<WeightRecord> = self
            .weights
            .iter()
            .filter(|entry| entry.key().0 == dictionary_id)
            .map(|entry| entry.value().clone())
            .collect();
        weights.sort_by(|a, b| a.word.cmp(&b.word));
        weights.truncate(limit);
        Ok(weights)
    }

    async fn upsert_weights(&self, records: Vec<WeightRecord>) -> Result<()> {
        for record in records {
            self.weights
                .insert(Self::key(&record.dictionary_id, &record.word), record);
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryRecorder for MemoryPersistence {
    async fn record(&self, entry: HistoryEntry) -> Result<()> {
        let mut history = self.history.lock();
        let entries = history.entry(entry.dictionary_id.clone()).or_default();
        entries.push_front(entry);
        entries.truncate(self.history_limit);
        Ok(())
    }
}

#[async_trait]
impl DictionaryStore for MemoryPersistence {
    async fn create_dictionary(&self, dictionary: Dictionary) -> Result<()> {
        match self.dictionaries.entry(dictionary.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(PipelineError::store(
                StoreCode::Conflict,
                format!("dictionary {} already exists", dictionary.id),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(dictionary);
                Ok(())
            }
        }
    }

    async fn load_dictionary(&self, id: &str) -> Result<Option<Dictionary>> {
        Ok(self.dictionaries.get(id).map(|v| v.clone()))
    }

    async fn list_dictionaries(&self) -> Result<Vec<Dictionary>> {
        let mut all: Vec<Dictionary> = self
            .dictionaries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn save_dictionary(&self, dictionary: &Dictionary) -> Result<()> {
        self.dictionaries
            .insert(dictionary.id.clone(), dictionary.clone());
        Ok(())
    }

    async fn remove_dictionary(&self, id: &str) -> Result<()> {
        self.dictionaries.remove(id);
        Ok(())
    }
}
