use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::common::error::{PipelineError, Result};
use crate::common::model::{Dictionary, DictionaryPatch, NewDictionary, Principal, WordData};
use crate::common::time::TimeUtils;
use crate::persistence::{DictionaryStore, WordStore};

/// 词典统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DictionaryStats {
    pub word_count: usize,
}

/// 词典目录
///
/// 所有涉及身份的操作都显式接收 `Principal`；只有所有者能修改或删除词典，
/// 系统词典 (owner 为空) 对所有用户只读。
pub struct DictionaryCatalog {
    dictionaries: Arc<dyn DictionaryStore>,
    words: Arc<dyn WordStore>,
}

impl DictionaryCatalog {
    pub fn new(dictionaries: Arc<dyn DictionaryStore>, words: Arc<dyn WordStore>) -> Self {
        Self {
            dictionaries,
            words,
        }
    }

    /// 新建词典，所有者为调用方
    pub async fn create(&self, principal: &Principal, new: NewDictionary) -> Result<Dictionary> {
        self.insert(Some(principal.user_id), new).await
    }

    /// 新建系统词典 (无所有者)
    pub async fn create_system(&self, new: NewDictionary) -> Result<Dictionary> {
        self.insert(None, new).await
    }

    async fn insert(&self, owner_id: Option<u64>, new: NewDictionary) -> Result<Dictionary> {
        let now = TimeUtils::now_f64();
        let dictionary = Dictionary {
            id: new.id,
            name: new.name,
            description: new.description,
            owner_id,
            is_public: new.is_public,
            created_at: now,
            updated_at: now,
        };
        self.dictionaries
            .create_dictionary(dictionary.clone())
            .await?;
        debug!(
            "[Catalog] Dictionary {} created (owner {:?})",
            dictionary.id, owner_id
        );
        Ok(dictionary)
    }

    /// 调用方可见的词典：系统词典 + 自己的 + 公开的
    pub async fn visible(&self, principal: &Principal) -> Result<Vec<Dictionary>> {
        let all = self.dictionaries.list_dictionaries().await?;
        Ok(all
            .into_iter()
            .filter(|d| d.is_visible_to(principal))
            .collect())
    }

    /// 调用方自己的词典
    pub async fn owned(&self, principal: &Principal) -> Result<Vec<Dictionary>> {
        let all = self.dictionaries.list_dictionaries().await?;
        Ok(all
            .into_iter()
            .filter(|d| d.is_owned_by(principal))
            .collect())
    }

    pub async fn get(&self, id: &str) -> Result<Dictionary> {
        self.dictionaries
            .load_dictionary(id)
            .await?
            .ok_or_else(|| PipelineError::DictionaryNotFound(id.to_string()))
    }

    async fn load_owned(&self, principal: &Principal, id: &str) -> Result<Dictionary> {
        let dictionary = self.get(id).await?;
        if !dictionary.is_owned_by(principal) {
            return Err(PipelineError::PermissionDenied {
                user_id: principal.user_id,
                dictionary_id: id.to_string(),
            });
        }
        Ok(dictionary)
    }

    /// 局部更新 (仅所有者)
    pub async fn update(
        &self,
        principal: &Principal,
        id: &str,
        patch: DictionaryPatch,
    ) -> Result<Dictionary> {
        let mut dictionary = self.load_owned(principal, id).await?;

        if let Some(name) = patch.name {
            dictionary.name = name;
        }
        if let Some(description) = patch.description {
            dictionary.description = Some(description);
        }
        if let Some(is_public) = patch.is_public {
            dictionary.is_public = is_public;
        }
        dictionary.updated_at = TimeUtils::now_f64().max(dictionary.updated_at);

        self.dictionaries.save_dictionary(&dictionary).await?;
        Ok(dictionary)
    }

    /// 删除词典 (仅所有者，不级联删除单词)
    pub async fn delete(&self, principal: &Principal, id: &str) -> Result<()> {
        self.load_owned(principal, id).await?;
        self.dictionaries.remove_dictionary(id).await?;
        debug!("[Catalog] Dictionary {} deleted by {}", id, principal.user_id);
        Ok(())
    }

    pub async fn stats(&self, id: &str) -> Result<DictionaryStats> {
        self.get(id).await?;
        let word_count = self.words.count_words(id).await?;
        Ok(DictionaryStats { word_count })
    }

    /// 单个单词的完整释义
    pub async fn word_detail(&self, dictionary_id: &str, word: &str) -> Result<WordData> {
        let record = self
            .words
            .load_word(dictionary_id, word)
            .await?
            .ok_or_else(|| PipelineError::WordNotFound {
                dictionary_id: dictionary_id.to_string(),
                word: word.to_string(),
            })?;
        record.data.decode()
    }
}
