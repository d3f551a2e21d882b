//! Engine configuration with sane defaults and environment overrides.

use chrono::Duration;
use serde::Deserialize;

use crate::error::EngineError;
use crate::normalize::ParseFailurePolicy;
use crate::types::Direction;

/// Which vendor timestamp annotates ingestion logs. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampSource {
  /// Ignore vendor timestamps.
  System,
  /// Per-row `Trajectory end`.
  Vehicle,
  /// Payload-level `data_end_timestamp`.
  Top,
}

/// Tunables for ingestion and correlation.
#[derive(Debug, Clone)]
pub struct Config {
  /// Gate feeds accepted by ingestion; each is one dedup stream.
  pub streams: Vec<String>,
  pub timestamp_source: TimestampSource,
  pub parse_failure: ParseFailurePolicy,
  /// Max entry→exit gap for a match (inclusive). `None` = unbounded.
  pub correlation_window: Option<Duration>,
  /// Drop pedestrian detections from correlation input.
  pub exclude_pedestrians: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      streams: ["car_in", "car_out", "bike_in", "bike_out"]
        .iter()
        .map(|s| s.to_string())
        .collect(),
      timestamp_source: TimestampSource::System,
      parse_failure: ParseFailurePolicy::IngestTime,
      correlation_window: Some(Duration::days(7)),
      exclude_pedestrians: true,
    }
  }
}

impl Config {
  /// Load from process environment (see `from_lookup` for keys).
  pub fn from_env() -> Result<Self, EngineError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Build a config from a key lookup. Unset keys keep their defaults.
  ///
  /// Keys: `FLOW_STREAMS`, `TIMESTAMP_MODE`, `TIMESTAMP_POLICY`,
  /// `CORRELATION_WINDOW_HOURS` (0 disables), `CORRELATION_EXCLUDE_PEDESTRIANS`.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, EngineError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut config = Self::default();

    if let Some(raw) = lookup("FLOW_STREAMS") {
      config.streams = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    }

    if let Some(raw) = lookup("TIMESTAMP_MODE") {
      config.timestamp_source = match raw.trim().to_ascii_lowercase().as_str() {
        "system" => TimestampSource::System,
        "vehicle" => TimestampSource::Vehicle,
        "top" => TimestampSource::Top,
        other => {
          return Err(EngineError::config(format!(
            "TIMESTAMP_MODE: expected system|vehicle|top, got {other}"
          )))
        }
      };
    }

    if let Some(raw) = lookup("TIMESTAMP_POLICY") {
      config.parse_failure = match raw.trim().to_ascii_lowercase().as_str() {
        "skip" => ParseFailurePolicy::Skip,
        "ingest_time" => ParseFailurePolicy::IngestTime,
        other => {
          return Err(EngineError::config(format!(
            "TIMESTAMP_POLICY: expected skip|ingest_time, got {other}"
          )))
        }
      };
    }

    if let Some(raw) = lookup("CORRELATION_WINDOW_HOURS") {
      let hours: i64 = raw.trim().parse().map_err(|_| {
        EngineError::config(format!("CORRELATION_WINDOW_HOURS: not an integer: {raw}"))
      })?;
      config.correlation_window = match hours {
        0 => None,
        h if h > 0 => Some(Duration::hours(h)),
        _ => {
          return Err(EngineError::config(
            "CORRELATION_WINDOW_HOURS: must not be negative",
          ))
        }
      };
    }

    if let Some(raw) = lookup("CORRELATION_EXCLUDE_PEDESTRIANS") {
      config.exclude_pedestrians = match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => true,
        "0" | "false" | "no" => false,
        other => {
          return Err(EngineError::config(format!(
            "CORRELATION_EXCLUDE_PEDESTRIANS: expected a boolean, got {other}"
          )))
        }
      };
    }

    config.validate()?;
    Ok(config)
  }

  /// Every stream must be a directional gate feed.
  pub fn validate(&self) -> Result<(), EngineError> {
    if self.streams.is_empty() {
      return Err(EngineError::config("no streams configured"));
    }
    for stream in &self.streams {
      if Direction::from_gate(stream).is_none() {
        return Err(EngineError::config(format!(
          "stream {stream} lacks an _in/_out suffix"
        )));
      }
    }
    Ok(())
  }

  pub fn has_stream(&self, gate: &str) -> bool {
    self.streams.iter().any(|s| s == gate)
  }
}
