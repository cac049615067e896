mod core;
mod store;
mod words;

pub use self::core::MemoryPersistence;
