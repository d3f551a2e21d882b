//! Normalize heterogeneous cube/database timestamps into UTC instants.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;

/// Earliest accepted epoch value (2000-01-01T00:00:00Z).
const MIN_EPOCH_MS: i64 = 946_684_800_000;
/// First rejected epoch value (2100-01-01T00:00:00Z).
const MAX_EPOCH_MS: i64 = 4_102_444_800_000;

/// Textual fallbacks, in priority order. RFC 3339 is tried after these.
const TEXT_FORMATS: [&str; 2] = [
  "%a, %d %b %Y %H:%M:%S UTC",
  "%a, %d %b %Y %H:%M:%S GMT",
];

/// What to do when a vendor timestamp does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailurePolicy {
  /// Drop the record.
  Skip,
  /// Substitute the ingestion instant.
  IngestTime,
}

/// Parse a raw timestamp: epoch millis first, then the textual formats.
pub fn normalize(raw: &str) -> Result<DateTime<Utc>, ParseError> {
  let s = raw.trim();
  if s.is_empty() {
    return Err(ParseError::Empty);
  }

  if s.bytes().all(|b| b.is_ascii_digit()) {
    return from_epoch_millis(s);
  }

  for fmt in TEXT_FORMATS {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
      return Ok(naive.and_utc());
    }
  }

  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|_| ParseError::Unrecognized(s.to_string()))
}

/// Normalize a JSON cell (string or number) as delivered by cubes.
///
/// Numbers go through their decimal text, so `1740834175000` and
/// `"1740834175000"` (or `-5` and `"-5"`) always classify the same way.
pub fn normalize_value(value: &Value) -> Result<DateTime<Utc>, ParseError> {
  match value {
    Value::String(s) => normalize(s),
    Value::Number(n) => normalize(&n.to_string()),
    Value::Null => Err(ParseError::Empty),
    other => Err(ParseError::Unrecognized(other.to_string())),
  }
}

/// Apply a failure policy: `None` means the record should be skipped.
pub fn resolve(
  parsed: Result<DateTime<Utc>, ParseError>,
  policy: ParseFailurePolicy,
  ingested_at: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
  match (parsed, policy) {
    (Ok(ts), _) => Some(ts),
    (Err(_), ParseFailurePolicy::Skip) => None,
    (Err(_), ParseFailurePolicy::IngestTime) => Some(ingested_at),
  }
}

fn from_epoch_millis(s: &str) -> Result<DateTime<Utc>, ParseError> {
  let ms: i64 = s
    .parse()
    .map_err(|_| ParseError::OutOfRange(s.to_string()))?;
  if !(MIN_EPOCH_MS..MAX_EPOCH_MS).contains(&ms) {
    return Err(ParseError::OutOfRange(s.to_string()));
  }
  Utc
    .timestamp_millis_opt(ms)
    .single()
    .ok_or_else(|| ParseError::OutOfRange(s.to_string()))
}
