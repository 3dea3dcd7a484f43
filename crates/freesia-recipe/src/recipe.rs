use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A pipeline recipe.
///
/// Component inputs and setups are free-form documents: their shape is
/// defined by the component's own schema, which the memory core does not
/// know about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
  pub version: String,

  /// Declared pipeline inputs, keyed by variable name.
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub variable: HashMap<String, VariableDef>,

  /// The pipeline graph, keyed by component ID.
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub component: HashMap<String, ComponentDef>,

  /// Declared pipeline outputs, keyed by output name.
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub output: HashMap<String, OutputDef>,
}

/// A declared pipeline input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  /// Declared data format (`string`, `number`, `image/png`, ...).
  #[serde(skip_serializing_if = "Option::is_none")]
  pub format: Option<String>,
}

/// A node in the pipeline graph: a connector, operator, or iterator step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentDef {
  /// The component implementation this node runs.
  #[serde(rename = "type")]
  pub component_type: String,

  /// The task the component executes, for multi-task components.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub task: Option<String>,

  /// Input template, rendered against workflow memory before execution.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub input: Option<serde_json::Value>,

  /// Connection/configuration values.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub setup: Option<serde_json::Value>,

  /// Skip-condition expression evaluated against workflow memory.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
}

/// A declared pipeline output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputDef {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  /// Template expression producing the output value.
  pub value: String,
}
