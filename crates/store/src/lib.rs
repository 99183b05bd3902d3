//! Storage backends for FBot: conversation threads, tasks, task analytics
//! and the document knowledge base.

pub mod analytics;
pub mod in_memory;
pub mod knowledge;
pub mod pool;
pub mod sqlite;

pub use analytics::TaskAnalytics;
pub use in_memory::{InMemoryTaskStore, InMemoryThreadStore};
pub use knowledge::KeywordKnowledgeBase;
pub use pool::{PoolSettings, open_pool};
pub use sqlite::{SqliteTaskStore, SqliteThreadStore};

use fbot_core::error::StoreError;
use fbot_core::task::TaskStore;
use fbot_core::thread::ThreadStore;
use std::sync::Arc;
use tracing::info;

/// The thread and task stores, opened together so they share one pool.
#[derive(Clone)]
pub struct Stores {
    pub threads: Arc<dyn ThreadStore>,
    pub tasks: Arc<dyn TaskStore>,
}

impl Stores {
    /// Process-local stores; nothing survives a restart.
    pub fn in_memory() -> Self {
        Self {
            threads: Arc::new(InMemoryThreadStore::new()),
            tasks: Arc::new(InMemoryTaskStore::new()),
        }
    }

    /// Open the stores named by `database_url`. The literal `memory` selects
    /// the in-memory backends; anything else is a SQLite URL.
    pub async fn open(database_url: &str, settings: PoolSettings) -> Result<Self, StoreError> {
        if database_url == "memory" {
            info!("Using in-memory stores");
            return Ok(Self::in_memory());
        }
        let pool = open_pool(database_url, settings).await?;
        Ok(Self {
            threads: Arc::new(SqliteThreadStore::from_pool(pool.clone()).await?),
            tasks: Arc::new(SqliteTaskStore::from_pool(pool).await?),
        })
    }

    /// Analytics computed over these stores' tasks.
    pub fn analytics(&self) -> TaskAnalytics {
        TaskAnalytics::new(self.tasks.clone())
    }
}
