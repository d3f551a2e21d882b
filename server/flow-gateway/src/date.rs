//! Report range parsing for query parameters.

use flow_engine::normalize::normalize;
use flow_engine::{EngineError, TimeRange};

use crate::types::RangeParams;

/// Parse optional `start` / `end` with the engine's timestamp normalizer.
pub fn parse_range(params: &RangeParams) -> Result<TimeRange, EngineError> {
  let start = parse_bound("start", params.start.as_deref())?;
  let end = parse_bound("end", params.end.as_deref())?;
  if let (Some(s), Some(e)) = (start, end) {
    if s > e {
      return Err(EngineError::validation("start", "must not be after end"));
    }
  }
  Ok(TimeRange::new(start, end))
}

fn parse_bound(
  field: &str,
  raw: Option<&str>,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, EngineError> {
  match raw.map(str::trim).filter(|s| !s.is_empty()) {
    Some(s) => normalize(s)
      .map(Some)
      .map_err(|e| EngineError::validation(field, &e.to_string())),
    None => Ok(None),
  }
}
