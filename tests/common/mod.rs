#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

use dictking_core::common::model::{Definition, ImportTask, TaskStatus, WordData};
use dictking_core::persistence::{StoreCode, TaskStore};
use dictking_core::{
    DictionaryCatalog, Enricher, MemoryPersistence, PipelineConfig, PipelineError, Result,
    TaskOrchestrator,
};

// ==========================================
// 载荷
// ==========================================

pub fn quench() -> WordData {
    WordData::new("quench", vec![Definition::new("verb", "扑灭")])
}

pub fn word_with(word: &str, translations: &[&str]) -> WordData {
    WordData::new(
        word,
        translations
            .iter()
            .map(|t| Definition::new("noun", t))
            .collect(),
    )
}

/// 写回不重试、巡检关闭的配置
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.orchestrator.writeback_retries = 0;
    config.sweep.enabled = false;
    config
}

// ==========================================
// 脚本化的 Enricher
// ==========================================

#[derive(Clone)]
pub enum Script {
    Answer(WordData),
    Fail(String),
    Panic,
}

/// 按单词返回预设结果；`gated` 时每次查询都要等 `open_gate`
#[derive(Clone, Default)]
pub struct ScriptedEnricher {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    gate: Option<Arc<Semaphore>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn answer(&self, word: &str, data: WordData) {
        self.scripts
            .lock()
            .insert(word.to_string(), Script::Answer(data));
    }

    pub fn fail(&self, word: &str, reason: &str) {
        self.scripts
            .lock()
            .insert(word.to_string(), Script::Fail(reason.to_string()));
    }

    pub fn panic_on(&self, word: &str) {
        self.scripts.lock().insert(word.to_string(), Script::Panic);
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1_000);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Enricher for ScriptedEnricher {
    async fn lookup(&self, word: &str) -> anyhow::Result<WordData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await?;
        }

        let script = self.scripts.lock().get(word).cloned();
        match script {
            Some(Script::Answer(data)) => Ok(data),
            Some(Script::Fail(reason)) => Err(anyhow::anyhow!(reason)),
            Some(Script::Panic) => panic!("enricher exploded on {word}"),
            None => Err(anyhow::anyhow!("no script for '{word}'")),
        }
    }
}

// ==========================================
// 注入故障的任务存储
// ==========================================

/// `save` 可以被开关控制失败，其余操作直通内存实现
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: MemoryPersistence,
    fail_saves: Arc<AtomicBool>,
    remove_after_list: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new(inner: MemoryPersistence) -> Self {
        Self {
            inner,
            fail_saves: Arc::new(AtomicBool::new(false)),
            remove_after_list: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_saves(&self, on: bool) {
        self.fail_saves.store(on, Ordering::SeqCst);
    }

    /// list 返回快照后立刻删掉其中的任务，模拟并发的用户删除
    pub fn remove_after_list(&self, on: bool) {
        self.remove_after_list.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskStore for FlakyStore {
    async fn create(&self, word: &str) -> Result<ImportTask> {
        self.inner.create(word).await
    }

    async fn find_by_word(&self, word: &str) -> Result<Option<ImportTask>> {
        self.inner.find_by_word(word).await
    }

    async fn load(&self, id: &str) -> Result<Option<ImportTask>> {
        self.inner.load(id).await
    }

    async fn save(&self, task: &ImportTask) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PipelineError::store(
                StoreCode::Unavailable,
                "injected save failure",
            ));
        }
        self.inner.save(task).await
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.inner.remove(id).await
    }

    async fn list(&self, status: Option<TaskStatus>, limit: usize) -> Result<Vec<ImportTask>> {
        let snapshot = self.inner.list(status, limit).await?;
        if self.remove_after_list.load(Ordering::SeqCst) {
            for task in &snapshot {
                self.inner.remove(&task.id).await?;
            }
        }
        Ok(snapshot)
    }
}

// ==========================================
// 组装
// ==========================================

pub struct Harness {
    pub orchestrator: TaskOrchestrator,
    pub enricher: ScriptedEnricher,
    pub memory: MemoryPersistence,
    pub catalog: DictionaryCatalog,
}

pub fn harness(enricher: ScriptedEnricher, config: PipelineConfig) -> Harness {
    let memory = MemoryPersistence::new();
    let orchestrator = TaskOrchestrator::builder()
        .with_config(config)
        .with_persistence(memory.clone())
        .with_enricher(enricher.clone())
        .build()
        .expect("orchestrator should build");

    let shared = Arc::new(memory.clone());
    let catalog = DictionaryCatalog::new(shared.clone(), shared);

    Harness {
        orchestrator,
        enricher,
        memory,
        catalog,
    }
}

/// 轮询直到条件成立 (最多等 2 秒)
pub async fn eventually<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
