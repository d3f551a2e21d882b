//! Structured error types for the flow engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("config: {0}")]
  Config(String),

  #[error("store: {0}")]
  Store(#[from] StoreError),
}

impl EngineError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn config(msg: impl Into<String>) -> Self {
    Self::Config(msg.into())
  }
}

/// Failure at the event store boundary. A failed batch is considered not persisted.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("backend: {0}")]
  Backend(String),

  #[error("schema: {0}")]
  Schema(String),
}

impl StoreError {
  pub fn backend(msg: impl Into<String>) -> Self {
    Self::Backend(msg.into())
  }
}

/// Timestamp normalization failure. Local to one field of one record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
  #[error("empty timestamp")]
  Empty,

  #[error("epoch millis out of range: {0}")]
  OutOfRange(String),

  #[error("unrecognized timestamp format: {0}")]
  Unrecognized(String),
}
