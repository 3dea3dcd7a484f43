//! Streaming event envelope.
//!
//! Every mutation-driven event carries the structural projection of the
//! affected value, so consumers see plain JSON-shaped data regardless of the
//! typed leaves stored in memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ComponentStatus;

/// A state-change event published on the workflow's channel.
///
/// Wire shape: `{ "event": <tag>, "data": <payload> }`. Tags are snake_case;
/// payload fields are camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
  PipelineStarted(PipelineStartedData),
  PipelineOutputUpdated(PipelineOutputUpdatedData),
  PipelineCompleted(PipelineCompletedData),
  PipelineClosed(PipelineClosedData),
  ComponentStatusUpdated(ComponentStatusUpdatedData),
  ComponentInputUpdated(ComponentInputUpdatedData),
  ComponentOutputUpdated(ComponentOutputUpdatedData),
}

impl Event {
  /// The wire tag of this event.
  pub fn tag(&self) -> &'static str {
    match self {
      Event::PipelineStarted(_) => "pipeline_started",
      Event::PipelineOutputUpdated(_) => "pipeline_output_updated",
      Event::PipelineCompleted(_) => "pipeline_completed",
      Event::PipelineClosed(_) => "pipeline_closed",
      Event::ComponentStatusUpdated(_) => "component_status_updated",
      Event::ComponentInputUpdated(_) => "component_input_updated",
      Event::ComponentOutputUpdated(_) => "component_output_updated",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStartedData {
  pub update_time: DateTime<Utc>,
  pub batch_index: usize,
  /// Structural projection of the batch's pipeline variables.
  pub variable: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutputUpdatedData {
  pub update_time: DateTime<Utc>,
  pub batch_index: usize,
  pub output: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineCompletedData {
  pub update_time: DateTime<Utc>,
  pub batch_index: usize,
  pub output: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineClosedData {
  pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatusUpdatedData {
  pub update_time: DateTime<Utc>,
  #[serde(rename = "componentID")]
  pub component_id: String,
  pub batch_index: usize,
  /// The full post-mutation triple, not just the flag that changed.
  pub status: ComponentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInputUpdatedData {
  pub update_time: DateTime<Utc>,
  #[serde(rename = "componentID")]
  pub component_id: String,
  pub batch_index: usize,
  pub input: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentOutputUpdatedData {
  pub update_time: DateTime<Utc>,
  #[serde(rename = "componentID")]
  pub component_id: String,
  pub batch_index: usize,
  pub output: serde_json::Value,
}
