pub mod config;
pub mod error;
pub mod model;
pub mod time;
pub(crate) mod utils;

// 导出配置
pub use config::{EnricherConfig, OrchestratorConfig, PipelineConfig, SamplerConfig, SweepConfig};

// 导出错误类型
pub use error::{PipelineError, Result};

// 导出核心模型
pub use model::{
    BatchCreated, BatchExisting, BatchFailed, BatchReport, CreatedTask, Definition, Dictionary,
    DictionaryPatch, HistoryEntry, ImportTask, NewDictionary, Principal, StoredWordData,
    TaskStats, TaskStatus, WeightRecord, WordData, WordRecord,
};

pub use time::TimeUtils;
// 内部工具的快捷访问
pub(crate) use utils::{calculate_backoff, new_task_id};
