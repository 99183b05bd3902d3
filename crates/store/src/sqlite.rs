//! SQLite-backed thread and task stores.
//!
//! Both stores run their own migrations against a shared pool (see
//! [`crate::pool`]). Threads keep their turns as a JSON array in one row so
//! a save replaces the whole history atomically; tasks are ordinary rows
//! keyed by an autoincrement id and scoped by `user_id`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use fbot_core::error::StoreError;
use fbot_core::route::RouteDecision;
use fbot_core::task::{NewTask, Priority, Task, TaskPatch, TaskStore};
use fbot_core::thread::{ConversationThread, ThreadId, ThreadInfo, ThreadStore, Turn};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::pool::query_error;

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

// ── Threads ──

/// Durable conversation state.
pub struct SqliteThreadStore {
    pool: SqlitePool,
}

impl SqliteThreadStore {
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS threads (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL,
                turns           TEXT NOT NULL DEFAULT '[]',
                route_decision  TEXT,
                running_summary TEXT NOT NULL DEFAULT '',
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("threads table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_threads_user ON threads(user_id, created_at DESC)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("threads index: {e}")))?;

        debug!("Thread store migrations complete");
        Ok(())
    }

    fn row_to_thread(row: &SqliteRow) -> Result<ConversationThread, StoreError> {
        let turns_json: String = column(row, "turns")?;
        let turns: Vec<Turn> = serde_json::from_str(&turns_json)
            .map_err(|e| StoreError::QueryFailed(format!("turns column is not valid JSON: {e}")))?;
        let route: Option<String> = column(row, "route_decision")?;
        let route_decision = route
            .map(|r| serde_json::from_value::<RouteDecision>(serde_json::Value::String(r)))
            .transpose()
            .map_err(|e| StoreError::QueryFailed(format!("route_decision column: {e}")))?;

        Ok(ConversationThread::from_parts(
            ThreadId(column(row, "id")?),
            column(row, "user_id")?,
            turns,
            route_decision,
            column(row, "running_summary")?,
            column(row, "created_at")?,
            column(row, "updated_at")?,
        ))
    }

    fn encode_turns(thread: &ConversationThread) -> Result<String, StoreError> {
        serde_json::to_string(thread.turns()).map_err(|e| StoreError::Storage(format!("Turn serialization: {e}")))
    }
}

#[async_trait]
impl ThreadStore for SqliteThreadStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create(&self, thread: &ConversationThread) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO threads (id, user_id, turns, route_decision, running_summary, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(thread.id.as_str())
        .bind(&thread.user_id)
        .bind(Self::encode_turns(thread)?)
        .bind(thread.route_decision.map(|r| r.as_str()))
        .bind(thread.running_summary())
        .bind(thread.created_at)
        .bind(thread.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("INSERT thread", e))?;

        debug!(thread_id = %thread.id, "Thread created");
        Ok(())
    }

    async fn load(&self, id: &ThreadId) -> Result<Option<ConversationThread>, StoreError> {
        let row = sqlx::query("SELECT * FROM threads WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("SELECT thread", e))?;

        row.as_ref().map(Self::row_to_thread).transpose()
    }

    async fn save(&self, thread: &ConversationThread) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO threads (id, user_id, turns, route_decision, running_summary, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                turns = excluded.turns,
                route_decision = excluded.route_decision,
                running_summary = excluded.running_summary,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(thread.id.as_str())
        .bind(&thread.user_id)
        .bind(Self::encode_turns(thread)?)
        .bind(thread.route_decision.map(|r| r.as_str()))
        .bind(thread.running_summary())
        .bind(thread.created_at)
        .bind(thread.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("UPSERT thread", e))?;

        debug!(thread_id = %thread.id, turns = thread.len(), "Thread saved");
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<ThreadInfo>, StoreError> {
        let rows = sqlx::query("SELECT * FROM threads WHERE user_id = ?1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error("SELECT threads", e))?;

        rows.iter()
            .map(|row| Self::row_to_thread(row).map(|t| ThreadInfo::from(&t)))
            .collect()
    }
}

// ── Tasks ──

/// Task persistence over SQLite.
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL,
                title       TEXT NOT NULL,
                description TEXT,
                completed   INTEGER NOT NULL DEFAULT 0,
                priority    TEXT NOT NULL DEFAULT 'medium',
                due_date    TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("tasks table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_user_created ON tasks(user_id, created_at)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("tasks index: {e}")))?;

        debug!("Task store migrations complete");
        Ok(())
    }

    fn row_to_task(row: &SqliteRow) -> Result<Task, StoreError> {
        let priority: String = column(row, "priority")?;
        Ok(Task {
            id: column(row, "id")?,
            user_id: column(row, "user_id")?,
            title: column(row, "title")?,
            description: column(row, "description")?,
            completed: column(row, "completed")?,
            priority: priority.parse::<Priority>().map_err(StoreError::QueryFailed)?,
            due_date: column(row, "due_date")?,
            created_at: column(row, "created_at")?,
            updated_at: column(row, "updated_at")?,
        })
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create(&self, user_id: &str, task: NewTask) -> Result<Task, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO tasks (user_id, title, description, completed, priority, due_date, created_at, updated_at)
            VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(user_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.priority.as_str())
        .bind(task.due_date)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("INSERT task", e))?;

        let id = result.last_insert_rowid();
        debug!(task_id = id, user_id, "Task created");
        Ok(Task {
            id,
            user_id: user_id.to_string(),
            title: task.title,
            description: task.description,
            completed: false,
            priority: task.priority,
            due_date: task.due_date,
            created_at: now,
            updated_at: now,
        })
    }

    async fn list(&self, user_id: &str) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE user_id = ?1 ORDER BY created_at DESC, id DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error("SELECT tasks", e))?;
        rows.iter().map(Self::row_to_task).collect()
    }

    async fn get(&self, user_id: &str, id: i64) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("SELECT task", e))?;
        row.as_ref().map(Self::row_to_task).transpose()
    }

    async fn update(&self, user_id: &str, id: i64, patch: TaskPatch) -> Result<Option<Task>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| query_error("BEGIN", e))?;

        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| query_error("SELECT task", e))?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut task = Self::row_to_task(&row)?;
        patch.apply(&mut task, Utc::now());

        sqlx::query(
            r#"
            UPDATE tasks
            SET title = ?1, description = ?2, completed = ?3, priority = ?4, due_date = ?5, updated_at = ?6
            WHERE id = ?7 AND user_id = ?8
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.completed)
        .bind(task.priority.as_str())
        .bind(task.due_date)
        .bind(task.updated_at)
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| query_error("UPDATE task", e))?;

        tx.commit().await.map_err(|e| query_error("COMMIT", e))?;
        Ok(Some(task))
    }

    async fn delete(&self, user_id: &str, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("DELETE task", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_created_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM tasks WHERE user_id = ?1 AND created_at >= ?2 AND created_at <= ?3 ORDER BY created_at, id",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("SELECT tasks in range", e))?;
        rows.iter().map(Self::row_to_task).collect()
    }
}
