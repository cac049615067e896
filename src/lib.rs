// 1. 基础模块
pub mod common;

// 2. 存储与外部协作方
pub mod enricher;
pub mod persistence;
pub mod policy;

// 3. 导入任务流水线
pub mod orchestrator;

// 4. 学习侧：抽词与词典目录
pub mod catalog;
pub mod sampler;

pub use catalog::{DictionaryCatalog, DictionaryStats};
pub use common::{PipelineConfig, PipelineError, Result};
pub use enricher::{BaiLianEnricher, Enricher};
pub use orchestrator::{OrchestratorBuilder, TaskOrchestrator};
pub use persistence::MemoryPersistence;
pub use sampler::WeightedSampler;
