use thiserror::Error;

use crate::common::model::TaskStatus;
use crate::persistence::StoreCode;

/// 流水线统一结果类型
///
/// 使用此别名可以简化函数签名：`fn do_something() -> Result<()>`
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    // ==========================================
    // 1. 配置错误 (Configuration)
    // ==========================================
    /// 配置错误
    ///
    /// - 触发场景: 构建 Orchestrator 时缺少 Enricher、配置值互相矛盾。
    /// - 处理: 检查配置文件或环境变量。
    #[error("Configuration error: {0}")]
    Config(String),

    // ==========================================
    // 2. 导入任务错误 (Import Task)
    // ==========================================
    /// 重复任务
    ///
    /// - 触发场景: 对同一个单词调用 `create`，而已有任务处于 querying / ready / imported。
    /// - 处理: 可恢复。调用方拿到已有任务 ID，引导用户跳转过去即可。
    #[error("Import task for this word already exists: {task_id} ({status})")]
    DuplicateTask { task_id: String, status: TaskStatus },

    /// 任务状态不正确
    ///
    /// - 触发场景: 对非 ready 的任务调用 `import`（包括已经 imported 的任务）。
    /// - 处理: 调用方错误，不自动重试。
    #[error("Task {task_id} is {status}, expected ready")]
    InvalidState { task_id: String, status: TaskStatus },

    /// 非法状态流转
    ///
    /// - 触发场景: 代码尝试走状态表之外的流转 (例如 imported -> querying)。
    /// - 后果: 这是程序 Bug，不是一个合法状态。
    #[error("Illegal task transition: {from} -> {to}")]
    IllegalTransition { from: TaskStatus, to: TaskStatus },

    /// 单词数据不完整
    ///
    /// - 触发场景: 释义载荷缺少 word / definitions，或者存储的文本无法解析。
    /// - 处理: 异步查询阶段会被记录为 failed；`import` 阶段直接返回给调用方。
    #[error("Incomplete word payload: {0}")]
    IncompletePayload(String),

    /// 单词为空
    #[error("Word must not be empty")]
    EmptyWord,

    /// 任务不存在
    #[error("Task {0} not found.")]
    TaskNotFound(String),

    // ==========================================
    // 3. 抽词与词典错误 (Sampling & Dictionary)
    // ==========================================
    /// 词典中没有单词
    #[error("Dictionary {0} has no words")]
    EmptyDictionary(String),

    /// 选中的单词在拉取详情前消失了
    ///
    /// - 触发场景: 抽词第 1 步和第 6 步之间单词被删除 (竞态)。
    /// - 处理: 可重试。
    #[error("Word '{word}' not found in dictionary {dictionary_id}")]
    WordNotFound { dictionary_id: String, word: String },

    /// 词典不存在
    #[error("Dictionary {0} not found")]
    DictionaryNotFound(String),

    /// 权限不足
    ///
    /// - 触发场景: 非所有者修改/删除词典，或尝试修改系统词典。
    #[error("Principal {user_id} may not modify dictionary {dictionary_id}")]
    PermissionDenied { user_id: u64, dictionary_id: String },

    /// 权重非法 (必须为有限正数)
    #[error("Invalid weight {weight} for word '{word}'")]
    InvalidWeight { word: String, weight: f64 },

    // ==========================================
    // 4. 基础设施错误 (Infrastructure)
    // ==========================================
    /// 外部协作方不可用
    ///
    /// - 触发场景: Enricher 或存储层网络失败、超时、非 2xx。
    /// - 处理: 对任务而言记录为 failed；对同步调用而言是可重试错误。
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// 存储层返回的失败信封
    ///
    /// - 说明: `code` 是机器可读的失败码，决定是否值得重试。
    #[error("Store failure [{code}]: {message}")]
    Store { code: StoreCode, message: String },

    /// 序列化/反序列化失败
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Redis 交互失败
    #[cfg(feature = "distributed")]
    #[error("Redis interaction failed: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    /// Redis 连接池错误
    #[cfg(feature = "distributed")]
    #[error("Redis pool failure: {0}")]
    Pool(#[from] deadpool_redis::PoolError),
}

impl PipelineError {
    /// 快捷构造存储层失败
    pub fn store(code: StoreCode, message: impl Into<String>) -> Self {
        PipelineError::Store {
            code,
            message: message.into(),
        }
    }

    /// 判断该错误是否值得重试 (Retryable)
    ///
    /// - 返回 `true`: 网络抖动、存储暂时不可用、抽词竞态等暂时性故障。
    /// - 返回 `false`: 调用方错误、数据损坏、程序 Bug 等永久性故障。
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::CollaboratorUnavailable(_) => true,
            PipelineError::WordNotFound { .. } => true,
            PipelineError::Store { code, .. } => code.is_transient(),

            #[cfg(feature = "distributed")]
            PipelineError::Redis(e) => {
                e.is_connection_dropped() || e.is_io_error() || e.is_timeout()
            }
            #[cfg(feature = "distributed")]
            PipelineError::Pool(_) => true,

            PipelineError::Config(_)
            | PipelineError::DuplicateTask { .. }
            | PipelineError::InvalidState { .. }
            | PipelineError::IllegalTransition { .. }
            | PipelineError::IncompletePayload(_)
            | PipelineError::EmptyWord
            | PipelineError::TaskNotFound(_)
            | PipelineError::EmptyDictionary(_)
            | PipelineError::DictionaryNotFound(_)
            | PipelineError::PermissionDenied { .. }
            | PipelineError::InvalidWeight { .. }
            | PipelineError::Serialization(_) => false,
        }
    }
}
