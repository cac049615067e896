pub mod memory;
pub mod model;
#[cfg(feature = "distributed")]
pub mod redis;
pub mod traits;

pub use memory::MemoryPersistence;
pub use model::StoreCode;
#[cfg(feature = "distributed")]
pub use redis::RedisPersistence;
pub use traits::{DictionaryStore, HistoryRecorder, TaskStore, WordStore};
