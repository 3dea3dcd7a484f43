//! Memory core errors.

use freesia_data::PathError;

use crate::backend::BackendError;

/// Errors from workflow memory and store operations.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
  /// Workflow, data slot, or path target absent.
  #[error("not found: {0}")]
  NotFound(String),

  /// Batch index outside `0..batch_size`.
  #[error("batch index {index} out of range for batch size {batch_size}")]
  BatchOutOfRange { index: usize, batch_size: usize },

  /// Component not initialised in this batch index.
  #[error("component '{0}' not found")]
  ComponentNotFound(String),

  /// Invalid path expression or missing path target.
  #[error(transparent)]
  Path(#[from] PathError),

  /// A snapshot or event frame is malformed: it failed to decode, or it
  /// decoded to a shape that violates a memory invariant.
  #[error("decode error: {0}")]
  Decode(#[from] rmp_serde::decode::Error),

  /// A value failed to encode.
  #[error("encode error: {0}")]
  Encode(#[from] rmp_serde::encode::Error),

  /// Durable KV or event bus failure. For event publishes the in-memory
  /// mutation has already been applied when this surfaces.
  #[error("backend error: {0}")]
  Backend(#[from] BackendError),

  /// The I/O portion of the operation was cancelled.
  #[error("operation cancelled")]
  Cancelled,
}
