//! Process-wide registry of workflow memories.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use freesia_recipe::Recipe;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::MemoryBackend;
use crate::codec;
use crate::error::MemoryError;
use crate::event::Event;
use crate::workflow::{Snapshot, WorkflowMemory};

const SNAPSHOT_KEY_PREFIX: &str = "pipeline_trigger:";
/// Snapshots expire an hour after they are written.
const SNAPSHOT_TTL: Duration = Duration::from_secs(3600);

/// The process-wide store of workflow memories.
///
/// Workflows are independent: the registry lock guards only the map itself
/// and is never held across I/O or workflow-level operations.
pub struct MemoryStore {
  workflows: RwLock<HashMap<String, WorkflowMemory>>,
  backend: Arc<dyn MemoryBackend>,
}

impl MemoryStore {
  pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
    Self {
      workflows: RwLock::new(HashMap::new()),
      backend,
    }
  }

  /// Create and register the memory for one workflow run, with `batch_size`
  /// pre-seeded batch roots. Replaces any prior registration under the same
  /// ID.
  pub fn new_workflow_memory(
    &self,
    workflow_id: &str,
    recipe: Option<Arc<Recipe>>,
    batch_size: usize,
  ) -> WorkflowMemory {
    let memory = WorkflowMemory::new(workflow_id, recipe, batch_size, self.backend.clone());
    self
      .workflows
      .write()
      .unwrap()
      .insert(workflow_id.to_string(), memory.clone());
    info!(workflow_id = %workflow_id, batch_size, "workflow memory created");
    memory
  }

  /// Look up a registered workflow memory.
  pub fn get_workflow_memory(&self, workflow_id: &str) -> Result<WorkflowMemory, MemoryError> {
    self
      .workflows
      .read()
      .unwrap()
      .get(workflow_id)
      .cloned()
      .ok_or_else(|| MemoryError::NotFound(format!("workflow memory '{workflow_id}'")))
  }

  /// Drop a workflow's memory from the registry. Idempotent.
  pub fn purge_workflow_memory(&self, workflow_id: &str) {
    if self
      .workflows
      .write()
      .unwrap()
      .remove(workflow_id)
      .is_some()
    {
      info!(workflow_id = %workflow_id, "workflow memory purged");
    }
  }

  /// Snapshot a workflow's memory to the durable KV, TTL one hour.
  ///
  /// The snapshot carries the state tree and recipe; the mutex and backend
  /// handle are reconstituted on restore.
  pub async fn write_workflow_memory_to_redis(
    &self,
    workflow_id: &str,
    cancel: &CancellationToken,
  ) -> Result<(), MemoryError> {
    let memory = self.get_workflow_memory(workflow_id)?;
    let snapshot = memory.snapshot().await;
    let frame = codec::encode(&snapshot)?;
    let key = snapshot_key(workflow_id);

    tokio::select! {
      result = self.backend.set_with_ttl(&key, frame, SNAPSHOT_TTL) => result?,
      _ = cancel.cancelled() => return Err(MemoryError::Cancelled),
    }
    info!(workflow_id = %workflow_id, "workflow memory snapshot written");
    Ok(())
  }

  /// Restore a workflow's memory from the durable KV and register it.
  ///
  /// The restored memory takes its ID from the lookup key and this store's
  /// backend handle; streaming starts disabled.
  pub async fn load_workflow_memory_from_redis(
    &self,
    workflow_id: &str,
    cancel: &CancellationToken,
  ) -> Result<WorkflowMemory, MemoryError> {
    let key = snapshot_key(workflow_id);
    let frame = tokio::select! {
      result = self.backend.get(&key) => result?,
      _ = cancel.cancelled() => return Err(MemoryError::Cancelled),
    };
    let frame =
      frame.ok_or_else(|| MemoryError::NotFound(format!("snapshot for workflow '{workflow_id}'")))?;

    let snapshot: Snapshot = codec::decode(&frame)?;
    let memory = WorkflowMemory::from_snapshot(snapshot, workflow_id, self.backend.clone())?;
    self
      .workflows
      .write()
      .unwrap()
      .insert(workflow_id.to_string(), memory.clone());
    info!(workflow_id = %workflow_id, "workflow memory restored from snapshot");
    Ok(memory)
  }

  /// Publish a workflow-status event that is not tied to a memory mutation
  /// (`pipeline_started`, `pipeline_completed`, `pipeline_closed`).
  pub async fn send_workflow_status_event(
    &self,
    workflow_id: &str,
    event: &Event,
    cancel: &CancellationToken,
  ) -> Result<(), MemoryError> {
    let frame = codec::encode(event)?;
    debug!(workflow_id = %workflow_id, event = event.tag(), "publishing workflow status event");
    tokio::select! {
      result = self.backend.publish(workflow_id, frame) => Ok(result?),
      _ = cancel.cancelled() => Err(MemoryError::Cancelled),
    }
  }
}

fn snapshot_key(workflow_id: &str) -> String {
  format!("{SNAPSHOT_KEY_PREFIX}{workflow_id}")
}
