//! Request types for the gateway.

use serde::Deserialize;

/// `?start=&end=` on report routes. Any format the timestamp normalizer accepts.
#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
  #[serde(default)]
  pub start: Option<String>,
  #[serde(default)]
  pub end: Option<String>,
}
