use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use docket_core::errors::AgendaError;

pub mod agenda;
pub mod memory;
pub mod redis_store;

pub use agenda::AgendaRepository;
pub use memory::InMemoryStore;
pub use redis_store::RedisStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("timed out after {0}s connecting to the backing store")]
    ConnectTimeout(u64),
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl From<StoreError> for AgendaError {
    fn from(error: StoreError) -> Self {
        AgendaError::Store(error.to_string())
    }
}

/// One write inside an atomic batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Delete(String),
    HashSet { key: String, fields: Vec<(String, String)> },
    /// Appends to the tail of a list, creating it when missing. An empty
    /// `values` is a no-op.
    ListPush { key: String, values: Vec<String> },
}

/// Minimal key-value contract the agenda needs from its backing store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// All fields of a hash; empty when the key is absent.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Whole list, head to tail; empty when the key is absent.
    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError>;

    async fn scan_keys(&self) -> Result<Vec<String>, StoreError>;

    /// Applies every op or none of them.
    async fn write_batch(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;

    /// Wipes the store and returns the backend's status reply.
    async fn flush(&self) -> Result<String, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
