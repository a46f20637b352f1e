/// Reading store shared by the ingestion and query endpoints
use log::{info, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{ServiceConfig, DEFAULT_MEMORY_RETENTION};
use crate::database::{self, RetryPolicy};
use crate::models::{NewReading, StoredReading};

/// Handle to wherever readings are kept. Cheap to clone.
#[derive(Debug, Clone)]
pub enum Store {
    Memory(MemoryStore),
    Postgres(PostgresStore),
}

impl Store {
    /// Build the store selected by the configuration
    ///
    /// PostgreSQL is used when `DATABASE_URL` is set (the table is created
    /// on the way), otherwise readings live in process memory.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self, String> {
        match &config.database_url {
            Some(database_url) => {
                let store = PostgresStore::new(database_url.clone(), config.retry);
                database::create_schema(&store.database_url, &store.retry).await?;
                info!("Using PostgreSQL store");
                Ok(Store::Postgres(store))
            }
            None => {
                warn!(
                    "DATABASE_URL not set, keeping the latest {} readings in memory only (not for production)",
                    config.memory_retention
                );
                Ok(Store::Memory(MemoryStore::new(config.memory_retention)))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Postgres(_) => "postgres",
        }
    }

    pub async fn append(&self, new: NewReading) -> Result<StoredReading, String> {
        match self {
            Store::Memory(store) => Ok(store.append(new).await),
            Store::Postgres(store) => {
                database::insert_reading(&new, &store.database_url, &store.retry).await
            }
        }
    }

    /// Latest `limit` readings, newest first
    pub async fn recent(&self, limit: usize) -> Result<Vec<StoredReading>, String> {
        match self {
            Store::Memory(store) => Ok(store.recent(limit).await),
            Store::Postgres(store) => {
                database::fetch_recent(limit, &store.database_url, &store.retry).await
            }
        }
    }
}

/// Readings kept in process memory, oldest dropped past `max_rows`
#[derive(Debug, Clone)]
pub struct MemoryStore {
    rows: Arc<RwLock<VecDeque<StoredReading>>>,
    max_rows: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new(DEFAULT_MEMORY_RETENTION)
    }
}

impl MemoryStore {
    pub fn new(max_rows: usize) -> Self {
        MemoryStore {
            rows: Arc::new(RwLock::new(VecDeque::new())),
            max_rows: max_rows.max(1),
        }
    }

    pub async fn append(&self, new: NewReading) -> StoredReading {
        let mut rows = self.rows.write().await;
        // Ids keep increasing after old rows are dropped
        let id = rows.back().map_or(1, |last| last.id + 1);
        let stored = new.into_stored(id);
        rows.push_back(stored.clone());
        while rows.len() > self.max_rows {
            rows.pop_front();
        }
        stored
    }

    pub async fn recent(&self, limit: usize) -> Vec<StoredReading> {
        let rows = self.rows.read().await;
        rows.iter().rev().take(limit).cloned().collect()
    }
}

#[derive(Debug, Clone)]
pub struct PostgresStore {
    database_url: String,
    retry: RetryPolicy,
}

impl PostgresStore {
    pub fn new(database_url: String, retry: RetryPolicy) -> Self {
        PostgresStore { database_url, retry }
    }
}
