//! Core types for the flow engine (JSON contracts + internal models).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Plate value used by cubes when no plate could be read.
pub const UNPLATED: &str = "-";

/// Category excluded from vehicle-flow statistics.
pub const PEDESTRIAN: &str = "pedestrian";

/// `duration_seconds` of an entry with no matched exit.
pub const OPEN_DURATION: f64 = -1.0;

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: what the cube sends)
// ---------------------------------------------------------------------------

/// One webhook body. Unknown fields are silently ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
  #[serde(default)]
  pub cube_id: Option<String>,
  #[serde(default)]
  pub name: Option<String>,
  /// Batch-level vendor timestamp (reference only).
  #[serde(default)]
  pub data_end_timestamp: Option<Value>,
  #[serde(default)]
  pub data: Option<PayloadTable>,
}

/// Column-oriented detection table: rows are zipped against `header`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayloadTable {
  #[serde(default)]
  pub header: Vec<String>,
  #[serde(default)]
  pub data: Option<Vec<Vec<Value>>>,
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  In,
  Out,
}

impl Direction {
  /// Derive direction from a gate id suffix (`_in` / `_out`, case-insensitive).
  pub fn from_gate(gate_id: &str) -> Option<Self> {
    let gate = gate_id.to_ascii_lowercase();
    if gate.ends_with("_in") {
      Some(Self::In)
    } else if gate.ends_with("_out") {
      Some(Self::Out)
    } else {
      None
    }
  }
}

// ---------------------------------------------------------------------------
// Canonical records
// ---------------------------------------------------------------------------

/// One admitted detection, as persisted in the event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleEvent {
  pub detection_id: String,
  pub license_plate: String,
  pub category: String,
  pub color: String,
  /// Ingestion instant; vendor timestamps never land here.
  pub observed_at: DateTime<Utc>,
  pub gate_id: String,
  pub zone: String,
  pub description: String,
}

impl VehicleEvent {
  pub fn direction(&self) -> Option<Direction> {
    Direction::from_gate(&self.gate_id)
  }

  pub fn is_unplated(&self) -> bool {
    self.license_plate.is_empty() || self.license_plate == UNPLATED
  }

  pub fn is_pedestrian(&self) -> bool {
    self.category.eq_ignore_ascii_case(PEDESTRIAN)
  }
}

/// Entry matched to its exit, or an open entry. Recomputed on demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryExitPair {
  pub entry: VehicleEvent,
  pub exit: Option<VehicleEvent>,
  pub duration_seconds: f64,
}

impl EntryExitPair {
  pub fn open(entry: VehicleEvent) -> Self {
    Self {
      entry,
      exit: None,
      duration_seconds: OPEN_DURATION,
    }
  }

  pub fn is_open(&self) -> bool {
    self.exit.is_none()
  }
}

/// Inclusive time bounds; `None` leaves that side unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
  pub start: Option<DateTime<Utc>>,
  pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
  pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
    Self { start, end }
  }

  pub fn unbounded() -> Self {
    Self::default()
  }

  pub fn contains(&self, ts: DateTime<Utc>) -> bool {
    self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
  }
}

// ---------------------------------------------------------------------------
// Admission + acknowledgment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
  Admitted,
  Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
  Accepted,
  AllDuplicates,
  Rejected,
  StoreFailed,
}

/// Structured acknowledgment for one webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestAck {
  pub status: IngestStatus,
  pub gate: String,
  pub batch_id: Uuid,
  pub total: usize,
  pub admitted: usize,
  pub duplicates: usize,
  pub skipped: usize,
  #[serde(default)]
  pub admitted_ids: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
}

impl IngestAck {
  pub fn rejected(gate: &str, message: impl Into<String>) -> Self {
    Self {
      status: IngestStatus::Rejected,
      gate: gate.to_string(),
      batch_id: Uuid::new_v4(),
      total: 0,
      admitted: 0,
      duplicates: 0,
      skipped: 0,
      admitted_ids: Vec::new(),
      message: Some(message.into()),
    }
  }
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for invalid input lines or failed requests.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}
