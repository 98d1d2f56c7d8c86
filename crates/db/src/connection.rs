use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::Client;
use tokio::sync::OnceCell;

use crate::repositories::StoreError;

/// A Redis connection opened on first use and shared afterwards. Cloning the
/// multiplexed handle is cheap; every clone talks over the same socket.
pub struct LazyConnection {
    client: Client,
    connect_timeout: Duration,
    connection: OnceCell<MultiplexedConnection>,
}

impl LazyConnection {
    pub fn open(redis_url: &str, connect_timeout_secs: u64) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;
        Ok(Self {
            client,
            connect_timeout: Duration::from_secs(connect_timeout_secs.max(1)),
            connection: OnceCell::new(),
        })
    }

    pub async fn get(&self) -> Result<MultiplexedConnection, StoreError> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                tokio::time::timeout(
                    self.connect_timeout,
                    self.client.get_multiplexed_async_connection(),
                )
                .await
                .map_err(|_| StoreError::ConnectTimeout(self.connect_timeout.as_secs()))?
                .map_err(StoreError::from)
            })
            .await?;
        Ok(connection.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.initialized()
    }
}
