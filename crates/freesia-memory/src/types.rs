//! Data-type and status tags for workflow memory slots.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pipeline-scoped data slots within a batch root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineDataType {
  Variable,
  Secret,
  Output,
  /// The output template, preserved in memory so results can be re-rendered.
  #[serde(rename = "_output")]
  OutputTemplate,
}

impl PipelineDataType {
  /// The stable string form, used as map key and wire token.
  pub fn as_str(&self) -> &'static str {
    match self {
      PipelineDataType::Variable => "variable",
      PipelineDataType::Secret => "secret",
      PipelineDataType::Output => "output",
      PipelineDataType::OutputTemplate => "_output",
    }
  }
}

impl fmt::Display for PipelineDataType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Component-scoped data slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentDataType {
  Input,
  Output,
  /// Iterator element binding. An opaque slot: the orchestrator defines its
  /// meaning, the memory core only stores it.
  Element,
  Setup,
}

impl ComponentDataType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ComponentDataType::Input => "input",
      ComponentDataType::Output => "output",
      ComponentDataType::Element => "element",
      ComponentDataType::Setup => "setup",
    }
  }
}

impl fmt::Display for ComponentDataType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Component execution status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatusType {
  Started,
  Skipped,
  Completed,
}

impl ComponentStatusType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ComponentStatusType::Started => "started",
      ComponentStatusType::Skipped => "skipped",
      ComponentStatusType::Completed => "completed",
    }
  }
}

impl fmt::Display for ComponentStatusType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The full status triple of one component in one batch index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentStatus {
  pub started: bool,
  pub skipped: bool,
  pub completed: bool,
}

impl ComponentStatus {
  pub fn get(&self, status_type: ComponentStatusType) -> bool {
    match status_type {
      ComponentStatusType::Started => self.started,
      ComponentStatusType::Skipped => self.skipped,
      ComponentStatusType::Completed => self.completed,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tags_have_stable_string_forms() {
    assert_eq!(PipelineDataType::Variable.as_str(), "variable");
    assert_eq!(PipelineDataType::OutputTemplate.as_str(), "_output");
    assert_eq!(ComponentDataType::Element.as_str(), "element");
    assert_eq!(ComponentStatusType::Completed.as_str(), "completed");
  }

  #[test]
  fn tag_serde_matches_the_string_form() {
    for tag in [
      PipelineDataType::Variable,
      PipelineDataType::Secret,
      PipelineDataType::Output,
      PipelineDataType::OutputTemplate,
    ] {
      assert_eq!(
        serde_json::to_value(tag).unwrap(),
        serde_json::Value::String(tag.as_str().to_string())
      );
    }
  }

  #[test]
  fn status_defaults_to_all_false() {
    let status = ComponentStatus::default();
    assert!(!status.get(ComponentStatusType::Started));
    assert!(!status.get(ComponentStatusType::Skipped));
    assert!(!status.get(ComponentStatusType::Completed));
  }
}
