use async_trait::async_trait;

use crate::common::error::Result;
use crate::common::model::{
    Dictionary, HistoryEntry, ImportTask, TaskStatus, WeightRecord, WordRecord,
};

// ==========================================
// 1. 任务存储接口 (TaskStore)
// ==========================================

/// 导入任务存储接口
///
/// **职责**: 导入任务的持久化。编排器自身不持有任何持久状态，
/// 每个决策都重新从这里读取，因此可以随时重启。
/// **特点**:
/// - 按等值条件查询 (word / status)
/// - 创建时由存储层分配 ID
/// - 不提供跨任务锁：同一单词的并发 `create` 可能产生两个任务，这是可接受的竞态
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// 创建任务 (Create)
    ///
    /// 写入一个 querying 状态的新任务，返回带有存储层分配 ID 的完整记录。
    async fn create(&self, word: &str) -> Result<ImportTask>;

    /// 按单词查询 (Find By Word)
    ///
    /// 等价于 `where word = ? limit 1`。存在多条时返回最早创建的一条。
    async fn find_by_word(&self, word: &str) -> Result<Option<ImportTask>>;

    /// 加载任务 (Load)
    async fn load(&self, id: &str) -> Result<Option<ImportTask>>;

    /// 保存任务 (Save)
    ///
    /// 按 ID upsert 完整记录。
    async fn save(&self, task: &ImportTask) -> Result<()>;

    /// 移除任务 (Remove)
    ///
    /// 物理删除，不存在时静默成功。
    async fn remove(&self, id: &str) -> Result<()>;

    /// 列出任务 (List)
    ///
    /// 按创建时间倒序，`status` 为 None 时不过滤。
    async fn list(&self, status: Option<TaskStatus>, limit: usize) -> Result<Vec<ImportTask>>;
}

// ==========================================
// 2. 单词存储接口 (WordStore)
// ==========================================

/// 词典单词与权重存储接口
///
/// 单词按 `(dictionary_id, word)` 唯一；权重同样按 `(dictionary_id, word)` 唯一。
#[async_trait]
pub trait WordStore: Send + Sync + 'static {
    /// 词典中的全部单词 (只取 word 列)
    async fn word_keys(&self, dictionary_id: &str, limit: usize) -> Result<Vec<String>>;

    /// 加载单个单词的完整记录
    async fn load_word(&self, dictionary_id: &str, word: &str) -> Result<Option<WordRecord>>;

    /// Upsert 单词
    ///
    /// 自然键 `(dictionary_id, word)` 已存在时覆盖 brief 和 data，保留原创建时间。
    async fn upsert_word(&self, record: WordRecord) -> Result<()>;

    /// 词典单词数
    async fn count_words(&self, dictionary_id: &str) -> Result<usize>;

    /// 词典中的全部显式权重
    async fn weights(&self, dictionary_id: &str, limit: usize) -> Result<Vec<WeightRecord>>;

    /// 批量 Upsert 权重
    async fn upsert_weights(&self, records: Vec<WeightRecord>) -> Result<()>;
}

// ==========================================
// 3. 抽词历史 (HistoryRecorder)
// ==========================================

/// 抽词历史记录器
///
/// 只追加；调用方不读取返回内容，失败也不影响抽词结果。
#[async_trait]
pub trait HistoryRecorder: Send + Sync + 'static {
    async fn record(&self, entry: HistoryEntry) -> Result<()>;
}

// ==========================================
// 4. 词典存储 (DictionaryStore)
// ==========================================

#[async_trait]
pub trait DictionaryStore: Send + Sync + 'static {
    /// 新建词典，ID 已存在时返回 `StoreCode::Conflict`
    async fn create_dictionary(&self, dictionary: Dictionary) -> Result<()>;

    async fn load_dictionary(&self, id: &str) -> Result<Option<Dictionary>>;

    async fn list_dictionaries(&self) -> Result<Vec<Dictionary>>;

    /// 按 ID 覆盖保存
    async fn save_dictionary(&self, dictionary: &Dictionary) -> Result<()>;

    async fn remove_dictionary(&self, id: &str) -> Result<()>;
}
