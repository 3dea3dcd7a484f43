//! The durable backend: a shared KV-with-TTL plus best-effort pub/sub.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;

/// Errors from the durable backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
  /// The Redis server refused the command or the connection failed.
  #[error("redis error: {0}")]
  Redis(#[from] redis::RedisError),

  /// The backend is not reachable.
  #[error("backend unavailable: {0}")]
  Unavailable(String),
}

/// The durable KV and event bus shared by all workflows.
///
/// Keys carry a TTL; publishes are best-effort broadcast with no replay.
/// Implementations are shared across workflows and must be thread-safe.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
  /// Write `value` under `key`, expiring after `ttl`.
  async fn set_with_ttl(&self, key: &str, value: Bytes, ttl: Duration)
  -> Result<(), BackendError>;

  /// Read the blob under `key`; `None` if absent or expired.
  async fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError>;

  /// Publish a frame on `channel`.
  async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), BackendError>;
}

/// In-process backend for tests and local development.
///
/// Honors TTLs and records every published frame in publish order, so tests
/// can assert on the exact event stream a consumer would see.
#[derive(Default)]
pub struct InMemoryBackend {
  entries: Mutex<HashMap<String, (Bytes, Instant)>>,
  published: Mutex<Vec<(String, Bytes)>>,
}

impl InMemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// All frames published so far as `(channel, frame)` pairs.
  pub fn published(&self) -> Vec<(String, Bytes)> {
    self.published.lock().unwrap().clone()
  }

  /// Frames published on one channel, in publish order.
  pub fn published_on(&self, channel: &str) -> Vec<Bytes> {
    self
      .published
      .lock()
      .unwrap()
      .iter()
      .filter(|(c, _)| c == channel)
      .map(|(_, frame)| frame.clone())
      .collect()
  }
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
  async fn set_with_ttl(
    &self,
    key: &str,
    value: Bytes,
    ttl: Duration,
  ) -> Result<(), BackendError> {
    let expires_at = Instant::now() + ttl;
    self
      .entries
      .lock()
      .unwrap()
      .insert(key.to_string(), (value, expires_at));
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError> {
    let mut entries = self.entries.lock().unwrap();
    let expired = matches!(entries.get(key), Some((_, expires_at)) if *expires_at <= Instant::now());
    if expired {
      entries.remove(key);
      return Ok(None);
    }
    Ok(entries.get(key).map(|(value, _)| value.clone()))
  }

  async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), BackendError> {
    self
      .published
      .lock()
      .unwrap()
      .push((channel.to_string(), payload));
    Ok(())
  }
}
