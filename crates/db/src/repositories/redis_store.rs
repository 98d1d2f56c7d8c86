use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use super::{KeyValueStore, StoreError, WriteOp};
use crate::connection::LazyConnection;

const SCAN_BATCH: usize = 100;

/// Production backing store. Clones share one lazily opened connection.
#[derive(Clone)]
pub struct RedisStore {
    connection: Arc<LazyConnection>,
}

impl RedisStore {
    pub fn new(redis_url: &str, connect_timeout_secs: u64) -> Result<Self, StoreError> {
        Ok(Self { connection: Arc::new(LazyConnection::open(redis_url, connect_timeout_secs)?) })
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut con = self.connection.get().await?;
        let found: bool = redis::cmd("EXISTS").arg(key).query_async(&mut con).await?;
        Ok(found)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut con = self.connection.get().await?;
        let fields: HashMap<String, String> =
            redis::cmd("HGETALL").arg(key).query_async(&mut con).await?;
        Ok(fields)
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut con = self.connection.get().await?;
        let values: Vec<String> =
            redis::cmd("LRANGE").arg(key).arg(0).arg(-1).query_async(&mut con).await?;
        Ok(values)
    }

    async fn scan_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut con = self.connection.get().await?;
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut con)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once across iterations.
        let mut seen = HashSet::new();
        keys.retain(|key| seen.insert(key.clone()));
        Ok(keys)
    }

    async fn write_batch(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in ops {
            match op {
                WriteOp::Delete(key) => {
                    pipe.cmd("DEL").arg(key).ignore();
                }
                WriteOp::HashSet { key, fields } => {
                    if fields.is_empty() {
                        continue;
                    }
                    let cmd = pipe.cmd("HSET").arg(key);
                    for (field, value) in fields {
                        cmd.arg(field).arg(value);
                    }
                    cmd.ignore();
                }
                WriteOp::ListPush { key, values } => {
                    if values.is_empty() {
                        continue;
                    }
                    pipe.cmd("RPUSH").arg(key).arg(values).ignore();
                }
            }
        }

        let mut con = self.connection.get().await?;
        let _: () = pipe.query_async(&mut con).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<String, StoreError> {
        let mut con = self.connection.get().await?;
        let reply: String = redis::cmd("FLUSHDB").query_async(&mut con).await?;
        Ok(reply)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut con = self.connection.get().await?;
        let reply: String = redis::cmd("PING").query_async(&mut con).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::UnexpectedReply(reply))
        }
    }
}
