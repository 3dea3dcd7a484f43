//! Binary codec for events and snapshots.
//!
//! MessagePack, field-name encoded: the frames are self-describing, so the
//! dynamic payload fields (`serde_json::Value`) decode without out-of-band
//! schema, and snapshots written by one process restore in another. The
//! closed [`Event`](crate::Event) enum plays the role of the payload-type
//! registry: a frame with an unknown tag fails to decode.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::MemoryError;

/// Encode a value to a binary frame.
pub fn encode<T: Serialize>(value: &T) -> Result<Bytes, MemoryError> {
  Ok(Bytes::from(rmp_serde::to_vec_named(value)?))
}

/// Decode a binary frame.
pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T, MemoryError> {
  Ok(rmp_serde::from_slice(frame)?)
}
