//! In-memory stores: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fbot_core::error::StoreError;
use fbot_core::task::{NewTask, Task, TaskPatch, TaskStore};
use fbot_core::thread::{ConversationThread, ThreadId, ThreadInfo, ThreadStore};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Threads kept in a map; lost on restart.
#[derive(Clone, Default)]
pub struct InMemoryThreadStore {
    threads: Arc<RwLock<HashMap<ThreadId, ConversationThread>>>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create(&self, thread: &ConversationThread) -> Result<(), StoreError> {
        let mut threads = self.threads.write().await;
        if threads.contains_key(&thread.id) {
            return Err(StoreError::QueryFailed(format!("thread {} already exists", thread.id)));
        }
        threads.insert(thread.id.clone(), thread.clone());
        Ok(())
    }

    async fn load(&self, id: &ThreadId) -> Result<Option<ConversationThread>, StoreError> {
        Ok(self.threads.read().await.get(id).cloned())
    }

    async fn save(&self, thread: &ConversationThread) -> Result<(), StoreError> {
        self.threads.write().await.insert(thread.id.clone(), thread.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<ThreadInfo>, StoreError> {
        let threads = self.threads.read().await;
        let mut infos: Vec<ThreadInfo> = threads
            .values()
            .filter(|t| t.user_id == user_id)
            .map(ThreadInfo::from)
            .collect();
        infos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(infos)
    }
}

/// Tasks kept in an ordered map keyed by id.
#[derive(Default)]
pub struct InMemoryTaskStore {
    inner: RwLock<TaskTable>,
}

#[derive(Default)]
struct TaskTable {
    next_id: i64,
    rows: BTreeMap<i64, Task>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed task, keeping its timestamps. Used to seed
    /// history for analytics.
    pub async fn insert(&self, mut task: Task) -> Task {
        let mut table = self.inner.write().await;
        table.next_id += 1;
        task.id = table.next_id;
        table.rows.insert(task.id, task.clone());
        task
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create(&self, user_id: &str, task: NewTask) -> Result<Task, StoreError> {
        let now = Utc::now();
        Ok(self
            .insert(Task {
                id: 0,
                user_id: user_id.to_string(),
                title: task.title,
                description: task.description,
                completed: false,
                priority: task.priority,
                due_date: task.due_date,
                created_at: now,
                updated_at: now,
            })
            .await)
    }

    async fn list(&self, user_id: &str) -> Result<Vec<Task>, StoreError> {
        let table = self.inner.read().await;
        Ok(table.rows.values().rev().filter(|t| t.user_id == user_id).cloned().collect())
    }

    async fn get(&self, user_id: &str, id: i64) -> Result<Option<Task>, StoreError> {
        let table = self.inner.read().await;
        Ok(table.rows.get(&id).filter(|t| t.user_id == user_id).cloned())
    }

    async fn update(&self, user_id: &str, id: i64, patch: TaskPatch) -> Result<Option<Task>, StoreError> {
        let mut table = self.inner.write().await;
        let Some(task) = table.rows.get_mut(&id).filter(|t| t.user_id == user_id) else {
            return Ok(None);
        };
        patch.apply(task, Utc::now());
        Ok(Some(task.clone()))
    }

    async fn delete(&self, user_id: &str, id: i64) -> Result<bool, StoreError> {
        let mut table = self.inner.write().await;
        if table.rows.get(&id).is_some_and(|t| t.user_id == user_id) {
            table.rows.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn list_created_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError> {
        let table = self.inner.read().await;
        let mut tasks: Vec<Task> = table
            .rows
            .values()
            .filter(|t| t.user_id == user_id && t.created_at >= start && t.created_at <= end)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.created_at, t.id));
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbot_core::thread::Turn;

    #[tokio::test]
    async fn thread_roundtrip() {
        let store = InMemoryThreadStore::new();
        let mut thread = ConversationThread::new("u1");
        store.create(&thread).await.unwrap();
        assert!(store.create(&thread).await.is_err());

        thread.append(Turn::user("xin chào"));
        store.save(&thread).await.unwrap();

        let loaded = store.load(&thread.id).await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(store.list_for_user("u1").await.unwrap().len(), 1);
        assert!(store.list_for_user("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn task_ids_are_not_reused_after_delete() {
        let store = InMemoryTaskStore::new();
        let a = store.create("u", NewTask { title: "a".into(), ..Default::default() }).await.unwrap();
        assert!(store.delete("u", a.id).await.unwrap());
        let b = store.create("u", NewTask { title: "b".into(), ..Default::default() }).await.unwrap();
        assert_ne!(a.id, b.id);
        assert!(!store.delete("u", a.id).await.unwrap());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_scoped() {
        let store = InMemoryTaskStore::new();
        store.create("u", NewTask { title: "first".into(), ..Default::default() }).await.unwrap();
        store.create("u", NewTask { title: "second".into(), ..Default::default() }).await.unwrap();
        store.create("other", NewTask { title: "theirs".into(), ..Default::default() }).await.unwrap();

        let titles: Vec<_> = store.list("u").await.unwrap().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn update_of_foreign_task_is_not_found() {
        let store = InMemoryTaskStore::new();
        let t = store.create("owner", NewTask { title: "x".into(), ..Default::default() }).await.unwrap();
        let patch = TaskPatch { completed: Some(true), ..Default::default() };
        assert!(store.update("intruder", t.id, patch).await.unwrap().is_none());
        assert!(!store.get("owner", t.id).await.unwrap().unwrap().completed);
    }
}
