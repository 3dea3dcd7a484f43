//! Redis implementation of the durable backend.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::backend::{BackendError, MemoryBackend};

/// Redis-backed durable KV and event bus.
///
/// Clones share one multiplexed connection; the manager reconnects
/// transparently after connection loss.
#[derive(Clone)]
pub struct RedisBackend {
  connection: ConnectionManager,
}

impl RedisBackend {
  /// Connect to the Redis instance at `url` (e.g. `redis://127.0.0.1/`).
  pub async fn connect(url: &str) -> Result<Self, BackendError> {
    let client = redis::Client::open(url).map_err(BackendError::Redis)?;
    let connection = ConnectionManager::new(client).await?;
    Ok(Self { connection })
  }

  /// Wrap an existing connection manager.
  pub fn new(connection: ConnectionManager) -> Self {
    Self { connection }
  }
}

#[async_trait]
impl MemoryBackend for RedisBackend {
  async fn set_with_ttl(
    &self,
    key: &str,
    value: Bytes,
    ttl: Duration,
  ) -> Result<(), BackendError> {
    let mut connection = self.connection.clone();
    connection
      .set_ex::<_, _, ()>(key, value.as_ref(), ttl.as_secs())
      .await?;
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError> {
    let mut connection = self.connection.clone();
    let value: Option<Vec<u8>> = connection.get(key).await?;
    Ok(value.map(Bytes::from))
  }

  async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), BackendError> {
    let mut connection = self.connection.clone();
    connection
      .publish::<_, _, ()>(channel, payload.as_ref())
      .await?;
    Ok(())
  }
}
