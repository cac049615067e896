use async_trait::async_trait;
use std::cmp::Ordering;

use super::MemoryPersistence;
use crate::common::error::Result;
use crate::common::model::{ImportTask, TaskStatus};
use crate::common::new_task_id;
use crate::persistence::traits::TaskStore;

/// 新的在前；时间相同时按 ID 保证顺序稳定
fn newest_first(a: &ImportTask, b: &ImportTask) -> Ordering {
    b.created_at
        .total_cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl TaskStore for MemoryPersistence {
    async fn create(&self, word: &str) -> Result<ImportTask> {
        let task = ImportTask::new(new_task_id(), word);
        self.tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn find_by_word(&self, word: &str) -> Result<Option<ImportTask>> {
        let found = self
            .tasks
            .iter()
            .filter(|entry| entry.word == word)
            .map(|entry| entry.value().clone())
            .min_by(|a, b| {
                a.created_at
                    .total_cmp(&b.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            });
        Ok(found)
    }

    async fn load(&self, id: &str) -> Result<Option<ImportTask>> {
        Ok(self.tasks.get(id).map(|v| v.clone()))
    }

    async fn save(&self, task: &ImportTask) -> Result<()> {
        self.tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.tasks.remove(id);
        Ok(())
    }

    async fn list(&self, status: Option<TaskStatus>, limit: usize) -> Result<Vec<ImportTask>> {
        let mut tasks: Vec<ImportTask> = self
            .tasks
            .iter()
            .filter(|entry| status.is_none_or(|s| entry.status == s))
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by(newest_first);
        tasks.truncate(limit);
        Ok(tasks)
    }
}
