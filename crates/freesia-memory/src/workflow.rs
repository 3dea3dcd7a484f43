//! Per-workflow memory.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use freesia_data::{PathError, Value, path};
use freesia_recipe::Recipe;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backend::MemoryBackend;
use crate::codec;
use crate::error::MemoryError;
use crate::event::{
  ComponentInputUpdatedData, ComponentOutputUpdatedData, ComponentStatusUpdatedData, Event,
  PipelineOutputUpdatedData,
};
use crate::types::{ComponentDataType, ComponentStatus, ComponentStatusType, PipelineDataType};

const STATUS_KEY: &str = "status";

/// Handle to one workflow's memory.
///
/// Cheap to clone; all clones share the same state. Every operation
/// serialises on an internal mutex, and events are published while it is
/// held, so within one workflow the event order on the bus equals the
/// mutation order. Reads return deep copies of the addressed sub-value; the
/// live graph never leaves the lock.
#[derive(Clone)]
pub struct WorkflowMemory {
  inner: Arc<Inner>,
}

impl std::fmt::Debug for WorkflowMemory {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WorkflowMemory")
      .field("id", &self.inner.id)
      .field("batch_size", &self.inner.batch_size)
      .finish()
  }
}

struct Inner {
  id: String,
  batch_size: usize,
  backend: Arc<dyn MemoryBackend>,
  /// One-way flag; checked without the state lock.
  streaming: AtomicBool,
  state: Mutex<State>,
}

struct State {
  /// One root map per batch index. Length fixed at creation.
  data: Vec<Value>,
  recipe: Option<Arc<Recipe>>,
}

/// The durable form of a workflow memory: state only, no runtime handles.
#[derive(Serialize, Deserialize)]
pub(crate) struct Snapshot {
  pub id: String,
  pub data: Vec<Value>,
  pub recipe: Option<Recipe>,
}

impl WorkflowMemory {
  pub(crate) fn new(
    id: impl Into<String>,
    recipe: Option<Arc<Recipe>>,
    batch_size: usize,
    backend: Arc<dyn MemoryBackend>,
  ) -> Self {
    let data = (0..batch_size).map(|_| batch_root()).collect();
    Self {
      inner: Arc::new(Inner {
        id: id.into(),
        batch_size,
        backend,
        streaming: AtomicBool::new(false),
        state: Mutex::new(State { data, recipe }),
      }),
    }
  }

  /// Reconstitute a memory from its durable form, with a fresh mutex and the
  /// given backend handle. The snapshot's own `id` field is ignored in
  /// favour of the lookup key.
  pub(crate) fn from_snapshot(
    snapshot: Snapshot,
    id: &str,
    backend: Arc<dyn MemoryBackend>,
  ) -> Result<Self, MemoryError> {
    if snapshot.data.iter().any(|root| root.as_map().is_none()) {
      return Err(malformed_root());
    }
    Ok(Self {
      inner: Arc::new(Inner {
        id: id.to_string(),
        batch_size: snapshot.data.len(),
        backend,
        streaming: AtomicBool::new(false),
        state: Mutex::new(State {
          data: snapshot.data,
          recipe: snapshot.recipe.map(Arc::new),
        }),
      }),
    })
  }

  pub(crate) async fn snapshot(&self) -> Snapshot {
    let state = self.inner.state.lock().await;
    Snapshot {
      id: self.inner.id.clone(),
      data: state.data.clone(),
      recipe: state.recipe.as_deref().cloned(),
    }
  }

  /// The workflow ID this memory belongs to.
  pub fn id(&self) -> &str {
    &self.inner.id
  }

  /// Number of parallel batch indices, fixed at creation.
  pub fn batch_size(&self) -> usize {
    self.inner.batch_size
  }

  /// Turn on event emission. One-way: once enabled, every subsequent
  /// emitting mutation publishes to the bus.
  pub fn enable_streaming(&self) {
    self.inner.streaming.store(true, Ordering::Relaxed);
  }

  pub fn is_streaming(&self) -> bool {
    self.inner.streaming.load(Ordering::Relaxed)
  }

  pub async fn recipe(&self) -> Option<Arc<Recipe>> {
    self.inner.state.lock().await.recipe.clone()
  }

  pub async fn set_recipe(&self, recipe: Arc<Recipe>) {
    self.inner.state.lock().await.recipe = Some(recipe);
  }

  /// Set an arbitrary top-level key in one batch root.
  pub async fn set(&self, batch_idx: usize, key: &str, value: Value) -> Result<(), MemoryError> {
    if key.is_empty() {
      return Err(
        PathError::Invalid {
          path: key.to_string(),
          reason: "empty key".to_string(),
        }
        .into(),
      );
    }
    let mut state = self.inner.state.lock().await;
    state
      .root_map_mut(batch_idx)?
      .insert(key.to_string(), value);
    Ok(())
  }

  /// Resolve a path expression against one batch root.
  ///
  /// The empty path returns the whole root. Returns a deep copy.
  pub async fn get(&self, batch_idx: usize, path: &str) -> Result<Value, MemoryError> {
    let state = self.inner.state.lock().await;
    let root = state.root(batch_idx)?;
    Ok(path::resolve(root, path)?.clone())
  }

  /// Install the skeleton for `component_id`: empty input/output/setup and
  /// an all-false status triple.
  ///
  /// Idempotent: re-initialising resets the component.
  pub async fn init_component(
    &self,
    batch_idx: usize,
    component_id: &str,
  ) -> Result<(), MemoryError> {
    let mut state = self.inner.state.lock().await;
    state
      .root_map_mut(batch_idx)?
      .insert(component_id.to_string(), component_skeleton());
    Ok(())
  }

  /// Write a component data slot, emitting `component_input_updated` /
  /// `component_output_updated` for the input/output slots when streaming.
  pub async fn set_component_data(
    &self,
    batch_idx: usize,
    component_id: &str,
    data_type: ComponentDataType,
    value: Value,
    cancel: &CancellationToken,
  ) -> Result<(), MemoryError> {
    let mut state = self.inner.state.lock().await;
    let component = state.component_mut(batch_idx, component_id)?;

    let event = if self.is_streaming() {
      match data_type {
        ComponentDataType::Input => Some(Event::ComponentInputUpdated(ComponentInputUpdatedData {
          update_time: Utc::now(),
          component_id: component_id.to_string(),
          batch_index: batch_idx,
          input: value.to_structural(),
        })),
        ComponentDataType::Output => {
          Some(Event::ComponentOutputUpdated(ComponentOutputUpdatedData {
            update_time: Utc::now(),
            component_id: component_id.to_string(),
            batch_index: batch_idx,
            output: value.to_structural(),
          }))
        }
        ComponentDataType::Element | ComponentDataType::Setup => None,
      }
    } else {
      None
    };

    component.insert(data_type.as_str().to_string(), value);

    match event {
      Some(event) => self.publish(&event, cancel).await,
      None => Ok(()),
    }
  }

  /// Read a component data slot. Returns a deep copy; a slot that was never
  /// written (`element` before its first assignment) reads as `Null`.
  pub async fn get_component_data(
    &self,
    batch_idx: usize,
    component_id: &str,
    data_type: ComponentDataType,
  ) -> Result<Value, MemoryError> {
    let state = self.inner.state.lock().await;
    let component = state.component(batch_idx, component_id)?;
    Ok(
      component
        .get(data_type.as_str())
        .cloned()
        .unwrap_or(Value::Null),
    )
  }

  /// Flip one status flag, always emitting `component_status_updated` with
  /// the full post-mutation triple when streaming.
  pub async fn set_component_status(
    &self,
    batch_idx: usize,
    component_id: &str,
    status_type: ComponentStatusType,
    value: bool,
    cancel: &CancellationToken,
  ) -> Result<(), MemoryError> {
    let mut state = self.inner.state.lock().await;
    let component = state.component_mut(batch_idx, component_id)?;
    let status_map = component
      .get_mut(STATUS_KEY)
      .and_then(Value::as_map_mut)
      .ok_or_else(|| MemoryError::ComponentNotFound(component_id.to_string()))?;

    status_map.insert(status_type.as_str().to_string(), Value::Boolean(value));
    let status = read_status(status_map);

    if !self.is_streaming() {
      return Ok(());
    }
    let event = Event::ComponentStatusUpdated(ComponentStatusUpdatedData {
      update_time: Utc::now(),
      component_id: component_id.to_string(),
      batch_index: batch_idx,
      status,
    });
    self.publish(&event, cancel).await
  }

  /// Read one status flag. Flags that were never written read as false.
  pub async fn get_component_status(
    &self,
    batch_idx: usize,
    component_id: &str,
    status_type: ComponentStatusType,
  ) -> Result<bool, MemoryError> {
    let state = self.inner.state.lock().await;
    let component = state.component(batch_idx, component_id)?;
    let status_map = component
      .get(STATUS_KEY)
      .and_then(Value::as_map)
      .ok_or_else(|| MemoryError::ComponentNotFound(component_id.to_string()))?;
    Ok(read_status(status_map).get(status_type))
  }

  /// Write a pipeline data slot, emitting `pipeline_output_updated` for the
  /// output slot when streaming.
  pub async fn set_pipeline_data(
    &self,
    batch_idx: usize,
    data_type: PipelineDataType,
    value: Value,
    cancel: &CancellationToken,
  ) -> Result<(), MemoryError> {
    let mut state = self.inner.state.lock().await;
    let root = state.root_map_mut(batch_idx)?;

    let event = if self.is_streaming() && data_type == PipelineDataType::Output {
      Some(Event::PipelineOutputUpdated(PipelineOutputUpdatedData {
        update_time: Utc::now(),
        batch_index: batch_idx,
        output: value.to_structural(),
      }))
    } else {
      None
    };

    root.insert(data_type.as_str().to_string(), value);

    match event {
      Some(event) => self.publish(&event, cancel).await,
      None => Ok(()),
    }
  }

  /// Read a pipeline data slot. Returns a deep copy.
  pub async fn get_pipeline_data(
    &self,
    batch_idx: usize,
    data_type: PipelineDataType,
  ) -> Result<Value, MemoryError> {
    let state = self.inner.state.lock().await;
    state
      .root_map(batch_idx)?
      .get(data_type.as_str())
      .cloned()
      .ok_or_else(|| MemoryError::NotFound(format!("pipeline {data_type} data")))
  }

  /// Encode and publish an event on this workflow's channel.
  ///
  /// Callers hold the state lock, which is what orders events on the bus.
  /// Cancellation aborts only the publish; the mutation has already applied.
  async fn publish(&self, event: &Event, cancel: &CancellationToken) -> Result<(), MemoryError> {
    let frame = codec::encode(event)?;
    debug!(workflow_id = %self.inner.id, event = event.tag(), "publishing state event");
    tokio::select! {
      result = self.inner.backend.publish(&self.inner.id, frame) => Ok(result?),
      _ = cancel.cancelled() => Err(MemoryError::Cancelled),
    }
  }
}

impl State {
  fn root(&self, index: usize) -> Result<&Value, MemoryError> {
    let batch_size = self.data.len();
    self
      .data
      .get(index)
      .ok_or(MemoryError::BatchOutOfRange { index, batch_size })
  }

  fn root_map(&self, index: usize) -> Result<&BTreeMap<String, Value>, MemoryError> {
    self
      .root(index)?
      .as_map()
      .ok_or_else(malformed_root)
  }

  fn root_map_mut(&mut self, index: usize) -> Result<&mut BTreeMap<String, Value>, MemoryError> {
    let batch_size = self.data.len();
    self
      .data
      .get_mut(index)
      .ok_or(MemoryError::BatchOutOfRange { index, batch_size })?
      .as_map_mut()
      .ok_or_else(malformed_root)
  }

  fn component(
    &self,
    index: usize,
    component_id: &str,
  ) -> Result<&BTreeMap<String, Value>, MemoryError> {
    self
      .root_map(index)?
      .get(component_id)
      .and_then(Value::as_map)
      .ok_or_else(|| MemoryError::ComponentNotFound(component_id.to_string()))
  }

  fn component_mut(
    &mut self,
    index: usize,
    component_id: &str,
  ) -> Result<&mut BTreeMap<String, Value>, MemoryError> {
    self
      .root_map_mut(index)?
      .get_mut(component_id)
      .and_then(Value::as_map_mut)
      .ok_or_else(|| MemoryError::ComponentNotFound(component_id.to_string()))
  }
}

/// A snapshot whose batch roots are not maps is malformed, the same failure
/// class as a frame that does not decode at all.
fn malformed_root() -> MemoryError {
  MemoryError::Decode(rmp_serde::decode::Error::Syntax(
    "batch root is not a map".to_string(),
  ))
}

/// A fresh batch root: `{"variable": {}, "secret": {}, "output": {}}`.
fn batch_root() -> Value {
  let mut fields = BTreeMap::new();
  fields.insert(
    PipelineDataType::Variable.as_str().to_string(),
    Value::map(),
  );
  fields.insert(PipelineDataType::Secret.as_str().to_string(), Value::map());
  fields.insert(PipelineDataType::Output.as_str().to_string(), Value::map());
  Value::Map(fields)
}

fn component_skeleton() -> Value {
  let mut status = BTreeMap::new();
  for flag in [
    ComponentStatusType::Started,
    ComponentStatusType::Skipped,
    ComponentStatusType::Completed,
  ] {
    status.insert(flag.as_str().to_string(), Value::Boolean(false));
  }

  let mut fields = BTreeMap::new();
  fields.insert(
    ComponentDataType::Input.as_str().to_string(),
    Value::map(),
  );
  fields.insert(
    ComponentDataType::Output.as_str().to_string(),
    Value::map(),
  );
  fields.insert(STATUS_KEY.to_string(), Value::Map(status));
  fields.insert(
    ComponentDataType::Setup.as_str().to_string(),
    Value::map(),
  );
  Value::Map(fields)
}

fn read_status(status_map: &BTreeMap<String, Value>) -> ComponentStatus {
  let flag = |status_type: ComponentStatusType| {
    status_map
      .get(status_type.as_str())
      .and_then(Value::as_boolean)
      .unwrap_or(false)
  };
  ComponentStatus {
    started: flag(ComponentStatusType::Started),
    skipped: flag(ComponentStatusType::Skipped),
    completed: flag(ComponentStatusType::Completed),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::InMemoryBackend;

  fn memory(batch_size: usize) -> WorkflowMemory {
    WorkflowMemory::new("w-test", None, batch_size, Arc::new(InMemoryBackend::new()))
  }

  #[tokio::test]
  async fn fresh_batches_have_empty_pipeline_slots() {
    let memory = memory(2);
    for batch_idx in 0..2 {
      for data_type in [
        PipelineDataType::Variable,
        PipelineDataType::Secret,
        PipelineDataType::Output,
      ] {
        let value = memory.get_pipeline_data(batch_idx, data_type).await.unwrap();
        assert_eq!(value, Value::map());
      }
    }
  }

  #[tokio::test]
  async fn out_of_range_batch_index_is_rejected() {
    let memory = memory(1);
    let err = memory.get(1, "").await.unwrap_err();
    assert!(matches!(
      err,
      MemoryError::BatchOutOfRange {
        index: 1,
        batch_size: 1
      }
    ));
  }

  #[tokio::test]
  async fn component_data_requires_init() {
    let memory = memory(1);
    let cancel = CancellationToken::new();
    let err = memory
      .set_component_data(0, "c1", ComponentDataType::Input, Value::map(), &cancel)
      .await
      .unwrap_err();
    assert!(matches!(err, MemoryError::ComponentNotFound(id) if id == "c1"));
  }

  #[tokio::test]
  async fn init_component_resets_state() {
    let memory = memory(1);
    let cancel = CancellationToken::new();
    memory.init_component(0, "c1").await.unwrap();
    memory
      .set_component_status(0, "c1", ComponentStatusType::Started, true, &cancel)
      .await
      .unwrap();

    memory.init_component(0, "c1").await.unwrap();
    let started = memory
      .get_component_status(0, "c1", ComponentStatusType::Started)
      .await
      .unwrap();
    assert!(!started);
    assert_eq!(
      memory
        .get_component_data(0, "c1", ComponentDataType::Input)
        .await
        .unwrap(),
      Value::map()
    );
  }

  #[tokio::test]
  async fn set_rejects_the_empty_key() {
    let memory = memory(1);
    let err = memory.set(0, "", Value::map()).await.unwrap_err();
    assert!(matches!(err, MemoryError::Path(PathError::Invalid { .. })));
  }

  #[tokio::test]
  async fn reads_return_deep_copies() {
    let memory = memory(1);
    memory
      .set(0, "k", Value::from_structural(&serde_json::json!({"a": 1})))
      .await
      .unwrap();

    let mut copy = memory.get(0, "k").await.unwrap();
    copy
      .as_map_mut()
      .unwrap()
      .insert("b".to_string(), Value::from(2.0));

    // The live graph is unaffected by mutating the returned copy.
    assert_eq!(
      memory.get(0, "k").await.unwrap(),
      Value::from_structural(&serde_json::json!({"a": 1}))
    );
  }

  #[tokio::test]
  async fn streaming_is_a_one_way_flag() {
    let memory = memory(1);
    assert!(!memory.is_streaming());
    memory.enable_streaming();
    assert!(memory.is_streaming());
  }
}
