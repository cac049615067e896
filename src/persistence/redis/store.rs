use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};

use super::core::{RedisPersistence, decode};
use crate::common::error::Result;
use crate::common::model::{ImportTask, TaskStatus};
use crate::persistence::traits::TaskStore;

/// MGET 每批的 key 数
const MGET_CHUNK: usize = 200;

impl RedisPersistence {
    /// 按 ID 批量加载，缺失的任务直接跳过
    async fn load_many(&self, ids: &[String]) -> Result<Vec<ImportTask>> {
        let mut conn = self.pool.get().await?;
        let mut tasks = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(MGET_CHUNK) {
            let keys: Vec<String> = chunk.iter().map(|id| self.key_task(id)).collect();
            let raw: Vec<Option<String>> = redis::cmd("MGET")
                .arg(&keys)
                .query_async(&mut conn)
                .await?;

            for (key, json) in keys.iter().zip(raw) {
                if let Some(s) = json {
                    tasks.push(decode::<ImportTask>(key, &s)?);
                }
            }
        }
        Ok(tasks)
    }

    /// 单词索引被清掉后，改指向该单词剩下的最早任务 (如果还有)
    async fn repoint_word_index(&self, word: &str, removed_id: &str) -> Result<()> {
        let ids: Vec<String> = {
            let mut conn = self.pool.get().await?;
            conn.zrange(self.key_tasks(), 0, -1).await?
        };
        let tasks = self.load_many(&ids).await?;

        if let Some(successor) = index_successor(&tasks, word, removed_id) {
            let mut conn = self.pool.get().await?;
            let _: bool = conn
                .hset_nx(self.key_task_by_word(), word, &successor.id)
                .await?;
        }
        Ok(())
    }
}

/// tasks 按创建时间升序；返回同一单词下除 removed_id 外最早的任务
fn index_successor<'a>(
    tasks: &'a [ImportTask],
    word: &str,
    removed_id: &str,
) -> Option<&'a ImportTask> {
    tasks.iter().find(|t| t.word == word && t.id != removed_id)
}

#[async_trait]
impl TaskStore for RedisPersistence {
    async fn create(&self, word: &str) -> Result<ImportTask> {
        let mut conn = self.pool.get().await?;

        // 1. 分配 ID
        let seq: u64 = conn.incr(self.key_task_seq(), 1).await?;
        let task = ImportTask::new(seq.to_string(), word);
        let json = serde_json::to_string(&task)?;

        // 2. 数据主体 + 时间索引 + 单词索引 (只在第一次出现时写入)
        redis::pipe()
            .atomic()
            .set(self.key_task(&task.id), json)
            .zadd(self.key_tasks(), &task.id, task.created_at)
            .hset_nx(self.key_task_by_word(), word, &task.id)
            .query_async::<()>(&mut conn)
            .await?;

        Ok(task)
    }

    async fn find_by_word(&self, word: &str) -> Result<Option<ImportTask>> {
        let id: Option<String> = {
            let mut conn = self.pool.get().await?;
            conn.hget(self.key_task_by_word(), word).await?
        };
        match id {
            Some(id) => self.load(&id).await,
            None => Ok(None),
        }
    }

    async fn load(&self, id: &str) -> Result<Option<ImportTask>> {
        let mut conn = self.pool.get().await?;
        let key = self.key_task(id);
        let json: Option<String> = conn.get(&key).await?;

        json.map(|s| decode(&key, &s)).transpose()
    }

    async fn save(&self, task: &ImportTask) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(task)?;

        redis::pipe()
            .atomic()
            .set(self.key_task(&task.id), json)
            .zadd(self.key_tasks(), &task.id, task.created_at)
            .hset_nx(self.key_task_by_word(), &task.word, &task.id)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let existing = self.load(id).await?;
        let mut conn = self.pool.get().await?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(self.key_task(id))
            .zrem(self.key_tasks(), id);

        // 单词索引只在指向自己时才清掉
        let mut orphaned_word = None;
        if let Some(task) = existing {
            let indexed: Option<String> = conn.hget(self.key_task_by_word(), &task.word).await?;
            if indexed.as_deref() == Some(id) {
                pipe.hdel(self.key_task_by_word(), &task.word);
                orphaned_word = Some(task.word);
            }
        }

        pipe.query_async::<()>(&mut conn).await?;
        drop(conn);

        if let Some(word) = orphaned_word {
            self.repoint_word_index(&word, id).await?;
        }
        Ok(())
    }

    async fn list(&self, status: Option<TaskStatus>, limit: usize) -> Result<Vec<ImportTask>> {
        let ids: Vec<String> = {
            let mut conn = self.pool.get().await?;
            conn.zrevrange(self.key_tasks(), 0, -1).await?
        };

        let mut tasks: Vec<ImportTask> = self
            .load_many(&ids)
            .await?
            .into_iter()
            .filter(|task| status.is_none_or(|s| task.status == s))
            .collect();
        tasks.truncate(limit);
        Ok(tasks)
    }
}
