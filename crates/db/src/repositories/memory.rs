use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KeyValueStore, StoreError, WriteOp};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Value {
    Hash(HashMap<String, String>),
    List(Vec<String>),
}

/// In-process store for tests and local runs. Keys scan in sorted order.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::UnexpectedReply(format!(
        "WRONGTYPE operation against key `{key}` holding the wrong kind of value"
    ))
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        match self.entries.read().await.get(key) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(fields)) => Ok(fields.clone()),
            Some(Value::List(_)) => Err(wrong_type(key)),
        }
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        match self.entries.read().await.get(key) {
            None => Ok(Vec::new()),
            Some(Value::List(values)) => Ok(values.clone()),
            Some(Value::Hash(_)) => Err(wrong_type(key)),
        }
    }

    async fn scan_keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn write_batch(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;

        // Stage on a copy so a type error leaves the store untouched.
        let mut staged = entries.clone();
        for op in ops {
            match op {
                WriteOp::Delete(key) => {
                    staged.remove(&key);
                }
                WriteOp::HashSet { key, fields } => {
                    if fields.is_empty() {
                        continue;
                    }
                    let slot =
                        staged.entry(key.clone()).or_insert_with(|| Value::Hash(HashMap::new()));
                    match slot {
                        Value::Hash(existing) => existing.extend(fields),
                        Value::List(_) => return Err(wrong_type(&key)),
                    }
                }
                WriteOp::ListPush { key, values } => {
                    if values.is_empty() {
                        continue;
                    }
                    let slot =
                        staged.entry(key.clone()).or_insert_with(|| Value::List(Vec::new()));
                    match slot {
                        Value::List(existing) => existing.extend(values),
                        Value::Hash(_) => return Err(wrong_type(&key)),
                    }
                }
            }
        }

        *entries = staged;
        Ok(())
    }

    async fn flush(&self) -> Result<String, StoreError> {
        self.entries.write().await.clear();
        Ok("OK".to_string())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
