use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::common::TimeUtils;
use crate::common::error::{PipelineError, Result};

// ==========================================
// 1. 任务状态枚举 (TaskStatus)
// ==========================================

/// 导入任务生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// 查询中
    /// - 任务已创建，后台正在调用 Enricher。
    Querying,

    /// 待录入
    /// - 释义已就绪，等待用户选择词典录入。
    Ready,

    /// 已录入
    /// - 终态，之后不再变更。
    Imported,

    /// 查询失败
    /// - 看起来像终态，但可以被 `create` 原地重试 (重新回到 Querying)。
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Querying,
        TaskStatus::Ready,
        TaskStatus::Imported,
        TaskStatus::Failed,
    ];

    /// 状态流转表
    ///
    /// ```text
    /// querying -> ready | failed
    /// ready    -> imported
    /// failed   -> querying   (重试)
    /// ```
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Querying, Ready) | (Querying, Failed) | (Ready, Imported) | (Failed, Querying)
        )
    }

    /// 是否阻止同一单词创建新任务
    pub fn blocks_new_task(self) -> bool {
        !matches!(self, TaskStatus::Failed)
    }

    /// 状态是否是终态（不可流转）
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Imported)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Querying => "querying",
            TaskStatus::Ready => "ready",
            TaskStatus::Imported => "imported",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 2. 单词释义载荷 (WordData)
// ==========================================

/// 单条释义
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    /// 词性。上游有时给字符串 ("verb")，有时给对象 ({"en_simple": "v."})，原样保留。
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub part_of_speech: Value,

    /// 中文释义
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,

    /// 例句
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Value>,

    /// 其余字段 (音标、搭配等) 透传
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Definition {
    pub fn new(part_of_speech: &str, translation: &str) -> Self {
        Self {
            part_of_speech: Value::String(part_of_speech.to_string()),
            translation: Some(translation.to_string()),
            ..Default::default()
        }
    }
}

/// 结构化的单词释义
///
/// 由 Enricher 产出，录入时整体写入单词记录。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WordData {
    #[serde(default)]
    pub word: String,

    #[serde(default)]
    pub definitions: Vec<Definition>,

    /// RFC3339 时间戳，Enricher 未给出时由流水线补上
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WordData {
    pub fn new(word: &str, definitions: Vec<Definition>) -> Self {
        Self {
            word: word.to_string(),
            definitions,
            ..Default::default()
        }
    }

    /// 校验必填字段：非空的 word + 至少一条释义
    pub fn validate(&self) -> Result<()> {
        if self.word.trim().is_empty() {
            return Err(PipelineError::IncompletePayload("missing word".into()));
        }
        if self.definitions.is_empty() {
            return Err(PipelineError::IncompletePayload(format!(
                "no definitions for '{}'",
                self.word
            )));
        }
        Ok(())
    }

    /// 补上创建时间 (已有则保留)
    pub fn stamp_created_at(&mut self) {
        if self.created_at.as_deref().is_none_or(str::is_empty) {
            self.created_at = Some(TimeUtils::now_rfc3339());
        }
    }

    /// 生成简要释义 (brief)
    ///
    /// 取前 `limit` 条释义的 translation，跳过空值，用 `separator` 连接。
    pub fn brief(&self, limit: usize, separator: &str) -> String {
        self.definitions
            .iter()
            .take(limit)
            .filter_map(|d| d.translation.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

/// 存储层里的释义载荷
///
/// 远端存储可能把 JSON 列原样返回，也可能返回序列化后的文本，两种都要能读。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredWordData {
    Structured(WordData),
    Serialized(String),
}

impl StoredWordData {
    /// 解码为结构化形式
    pub fn decode(&self) -> Result<WordData> {
        match self {
            StoredWordData::Structured(data) => Ok(data.clone()),
            StoredWordData::Serialized(text) => serde_json::from_str(text)
                .map_err(|e| PipelineError::IncompletePayload(format!("unparseable word_data: {e}"))),
        }
    }

    /// 以文本形式保存
    pub fn serialized(data: &WordData) -> Result<Self> {
        Ok(StoredWordData::Serialized(serde_json::to_string(data)?))
    }
}

impl From<WordData> for StoredWordData {
    fn from(data: WordData) -> Self {
        StoredWordData::Structured(data)
    }
}

// ==========================================
// 3. 导入任务 (ImportTask)
// ==========================================

/// 单词导入任务
///
/// 状态字段只能通过 `mark_*` / `rearm` 变更，它们统一走状态流转表，
/// 同时维护 "error_message 仅在 failed 时存在" 之类的字段约束。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportTask {
    /// 存储层分配的任务 ID
    pub id: String,

    /// 查询关键字
    pub word: String,

    pub status: TaskStatus,

    /// 仅 failed 时存在
    #[serde(default)]
    pub error_message: Option<String>,

    /// 仅 imported 时存在
    #[serde(default)]
    pub imported_dict_id: Option<String>,

    /// ready / imported 时存在
    #[serde(default)]
    pub word_data: Option<StoredWordData>,

    /// 创建时间 (Unix Timestamp Secs)
    pub created_at: f64,

    /// 最后更新时间 (Unix Timestamp Secs)
    pub updated_at: f64,

    /// 录入时间
    #[serde(default)]
    pub imported_at: Option<f64>,
}

impl ImportTask {
    /// 创建一个 querying 状态的新任务
    pub fn new(id: String, word: &str) -> Self {
        let now = TimeUtils::now_f64();
        Self {
            id,
            word: word.to_string(),
            status: TaskStatus::Querying,
            error_message: None,
            imported_dict_id: None,
            word_data: None,
            created_at: now,
            updated_at: now,
            imported_at: None,
        }
    }

    /// 更新最后活动时间 (保证单调)
    pub fn touch(&mut self) {
        self.updated_at = TimeUtils::now_f64().max(self.updated_at);
    }

    fn transition(&mut self, next: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(PipelineError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// failed -> querying (重试)
    pub fn rearm(&mut self) -> Result<()> {
        self.transition(TaskStatus::Querying)?;
        self.error_message = None;
        Ok(())
    }

    /// querying -> ready
    pub fn mark_ready(&mut self, data: WordData) -> Result<()> {
        self.transition(TaskStatus::Ready)?;
        self.error_message = None;
        self.word_data = Some(StoredWordData::Structured(data));
        Ok(())
    }

    /// querying -> failed
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition(TaskStatus::Failed)?;
        let reason = reason.into();
        self.error_message = Some(if reason.trim().is_empty() {
            "Unknown error".to_string()
        } else {
            reason
        });
        self.word_data = None;
        Ok(())
    }

    /// ready -> imported
    pub fn mark_imported(&mut self, dictionary_id: &str) -> Result<()> {
        self.transition(TaskStatus::Imported)?;
        self.imported_dict_id = Some(dictionary_id.to_string());
        self.imported_at = Some(self.updated_at);
        Ok(())
    }

    /// 解码后的释义载荷
    pub fn decoded_word_data(&self) -> Result<Option<WordData>> {
        self.word_data.as_ref().map(StoredWordData::decode).transpose()
    }

    /// 去掉大字段 word_data，用于列表展示
    pub fn without_payload(mut self) -> Self {
        self.word_data = None;
        self
    }
}

/// `create` 的返回值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedTask {
    pub task_id: String,
    pub status: TaskStatus,
    /// 是否是对 failed 任务的原地重试
    pub retried: bool,
}

// ==========================================
// 4. 批量创建与统计 (Batch & Stats)
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCreated {
    pub word: String,
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchExisting {
    pub word: String,
    pub task_id: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailed {
    pub word: String,
    pub error: String,
}

/// 批量创建结果，按三种结果分桶
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub created: Vec<BatchCreated>,
    pub existing: Vec<BatchExisting>,
    pub failed: Vec<BatchFailed>,
}

/// 各状态任务数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub querying: usize,
    pub ready: usize,
    pub imported: usize,
    pub failed: usize,
}

impl TaskStats {
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Querying => self.querying += 1,
            TaskStatus::Ready => self.ready += 1,
            TaskStatus::Imported => self.imported += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }

    pub fn get(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Querying => self.querying,
            TaskStatus::Ready => self.ready,
            TaskStatus::Imported => self.imported,
            TaskStatus::Failed => self.failed,
        }
    }

    pub fn total(&self) -> usize {
        self.querying + self.ready + self.imported + self.failed
    }
}

// ==========================================
// 5. 词典、单词、权重、历史 (Dictionary & Words)
// ==========================================

/// 调用方身份
///
/// 由调用方在信任边界完成校验后构造并显式传入，核心代码从不读取全局会话状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: u64,
}

impl Principal {
    pub fn new(user_id: u64) -> Self {
        Self { user_id }
    }
}

/// 词典
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// None = 系统词典
    #[serde(default)]
    pub owner_id: Option<u64>,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: f64,
    pub updated_at: f64,
}

impl Dictionary {
    /// 系统词典 + 自己的 + 公开的
    pub fn is_visible_to(&self, principal: &Principal) -> bool {
        self.owner_id.is_none() || self.owner_id == Some(principal.user_id) || self.is_public
    }

    pub fn is_owned_by(&self, principal: &Principal) -> bool {
        self.owner_id == Some(principal.user_id)
    }
}

/// 新建词典参数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDictionary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
}

/// 词典局部更新，None 表示不改
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

/// 词典中的单词记录，按 (dictionary_id, word) 唯一
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordRecord {
    pub dictionary_id: String,
    pub word: String,
    /// 冗余的简要释义，用于列表
    pub brief: String,
    pub data: StoredWordData,
    pub created_at: f64,
    pub updated_at: f64,
}

impl WordRecord {
    pub fn new(dictionary_id: &str, data: WordData, brief: String) -> Self {
        let now = TimeUtils::now_f64();
        Self {
            dictionary_id: dictionary_id.to_string(),
            word: data.word.clone(),
            brief,
            data: StoredWordData::Structured(data),
            created_at: now,
            updated_at: now,
        }
    }
}

/// 单词权重，缺省视为 default_weight (100)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRecord {
    pub dictionary_id: String,
    pub word: String,
    pub weight: f64,
}

/// 抽词历史
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub dictionary_id: String,
    pub word: String,
    pub recorded_at: f64,
}

impl HistoryEntry {
    pub fn new(dictionary_id: &str, word: &str) -> Self {
        Self {
            dictionary_id: dictionary_id.to_string(),
            word: word.to_string(),
            recorded_at: TimeUtils::now_f64(),
        }
    }
}
