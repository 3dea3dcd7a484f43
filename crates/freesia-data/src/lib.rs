//! Freesia Data
//!
//! This crate provides the dynamic value model for pipeline state. Pipeline
//! data has no compile-time schema: its shape is determined by the recipe at
//! runtime, so it is represented as a recursive [`Value`] tree of maps,
//! arrays, scalars, and typed file leaves.
//!
//! Two projections exist for every value:
//! - [`Value::to_structural`] produces the JSON-shaped envelope used on the
//!   wire (streaming events), and
//! - the serde implementation produces the self-describing binary form used
//!   for snapshots.
//!
//! The [`path`] module resolves dotted/bracketed path expressions
//! (`variable.images[0].url`) against a value tree.

pub mod path;
mod value;

pub use path::{PathError, Segment};
pub use value::{FileValue, Value};
