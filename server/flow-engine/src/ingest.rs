//! Webhook ingestion, phase one: validate the payload and admit detections.
//!
//! Admission and persistence are two separate phases. `prepare` records every
//! admitted detection in the deduplicator before the batch is written; a failed
//! write does not roll those admissions back, so a redelivery of the same rows
//! is classified as duplicates and the data is lost. Callers surface this as a
//! `store_failed` acknowledgment.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{Config, TimestampSource};
use crate::dedupe::Deduplicate;
use crate::error::EngineError;
use crate::normalize::{self, ParseFailurePolicy};
use crate::types::*;

const ID_FIELD: &str = "ID";
const PLATE_FIELD: &str = "License plate";
const CATEGORY_FIELD: &str = "Category";
const COLOR_FIELD: &str = "Color";
const TRAJECTORY_END_FIELD: &str = "Trajectory end";
const NOT_AVAILABLE: &str = "N/A";

/// Admitted detections of one webhook call, ready for a single batch insert.
#[derive(Debug, Clone)]
pub struct PreparedBatch {
  pub gate: String,
  pub batch_id: Uuid,
  pub events: Vec<VehicleEvent>,
  pub total: usize,
  pub duplicates: usize,
  pub skipped: usize,
}

impl PreparedBatch {
  /// `AllDuplicates` only when every row was a known detection.
  pub fn status(&self) -> IngestStatus {
    if self.total > 0 && self.duplicates == self.total {
      IngestStatus::AllDuplicates
    } else {
      IngestStatus::Accepted
    }
  }

  pub fn ack(&self, status: IngestStatus, message: Option<String>) -> IngestAck {
    IngestAck {
      status,
      gate: self.gate.clone(),
      batch_id: self.batch_id,
      total: self.total,
      admitted: self.events.len(),
      duplicates: self.duplicates,
      skipped: self.skipped,
      admitted_ids: self.events.iter().map(|e| e.detection_id.clone()).collect(),
      message,
    }
  }
}

/// Decode a raw webhook body. Malformed JSON is a validation failure.
pub fn parse_payload(body: &[u8]) -> Result<WebhookPayload, EngineError> {
  serde_json::from_slice(body)
    .map_err(|e| EngineError::validation("body", &format!("invalid JSON: {}", e)))
}

/// Validate a payload and admit its rows on the `gate` stream.
///
/// Returns a validation error (and admits nothing) when the gate is unknown,
/// `data` / `data.data` is missing, or rows are present without an `ID` column.
pub fn prepare(
  config: &Config,
  dedup: &dyn Deduplicate,
  gate: &str,
  payload: &WebhookPayload,
  ingested_at: DateTime<Utc>,
) -> Result<PreparedBatch, EngineError> {
  if !config.has_stream(gate) {
    return Err(EngineError::validation("gate", "unknown gate feed"));
  }

  let table = payload
    .data
    .as_ref()
    .ok_or_else(|| EngineError::validation("data", "missing 'data' key"))?;
  let rows = table
    .data
    .as_ref()
    .ok_or_else(|| EngineError::validation("data.data", "missing 'data' key"))?;

  if !rows.is_empty() && !table.header.iter().any(|h| h == ID_FIELD) {
    return Err(EngineError::validation("data.header", "missing 'ID' column"));
  }

  // Batch-level vendor timestamp, resolved once.
  let top_reference = match config.timestamp_source {
    TimestampSource::Top => Some(reference_time(
      payload.data_end_timestamp.as_ref(),
      config.parse_failure,
      ingested_at,
    )),
    _ => None,
  };

  let zone = payload
    .cube_id
    .clone()
    .unwrap_or_else(|| NOT_AVAILABLE.to_string());
  let description = payload.name.clone().unwrap_or_else(|| gate.to_string());

  let mut batch = PreparedBatch {
    gate: gate.to_string(),
    batch_id: Uuid::new_v4(),
    events: Vec::new(),
    total: rows.len(),
    duplicates: 0,
    skipped: 0,
  };

  for row in rows {
    let fields = zip_row(&table.header, row);

    let detection_id = match fields.get(ID_FIELD).filter(|id| !id.trim().is_empty()) {
      Some(id) => id.clone(),
      None => {
        warn!(gate = %gate, "row_without_id_skipped");
        batch.skipped += 1;
        continue;
      }
    };

    let reference = match config.timestamp_source {
      TimestampSource::System => Some(None),
      TimestampSource::Top => top_reference.flatten().map(Some),
      TimestampSource::Vehicle => {
        let raw = row_value(&table.header, row, TRAJECTORY_END_FIELD);
        reference_time(raw, config.parse_failure, ingested_at).map(Some)
      }
    };
    let Some(reference) = reference else {
      warn!(gate = %gate, detection_id = %detection_id, "vendor_timestamp_invalid_row_skipped");
      batch.skipped += 1;
      continue;
    };

    if dedup.admit(gate, &detection_id) == Admission::Duplicate {
      debug!(gate = %gate, detection_id = %detection_id, "detection_duplicate");
      batch.duplicates += 1;
      continue;
    }

    debug!(
      gate = %gate,
      detection_id = %detection_id,
      observed_at = %ingested_at.to_rfc3339(),
      source_ts = %reference.map(|ts| ts.to_rfc3339()).unwrap_or_else(|| "SYSTEM".into()),
      "detection_admitted"
    );

    batch.events.push(VehicleEvent {
      detection_id,
      license_plate: field_or(&fields, PLATE_FIELD, UNPLATED),
      category: field_or(&fields, CATEGORY_FIELD, NOT_AVAILABLE),
      color: field_or(&fields, COLOR_FIELD, NOT_AVAILABLE),
      observed_at: ingested_at,
      gate_id: gate.to_string(),
      zone: zone.clone(),
      description: description.clone(),
    });
  }

  Ok(batch)
}

/// Parse a vendor timestamp for log annotation; `None` means skip under the policy.
fn reference_time(
  raw: Option<&Value>,
  policy: ParseFailurePolicy,
  ingested_at: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
  let parsed = match raw {
    Some(value) => normalize::normalize_value(value),
    None => Err(crate::error::ParseError::Empty),
  };
  if let Err(e) = &parsed {
    warn!(error = %e, "vendor_timestamp_parse_failed");
  }
  normalize::resolve(parsed, policy, ingested_at)
}

/// Zip a row against the header. Later duplicate columns win; null cells are absent.
fn zip_row(header: &[String], row: &[Value]) -> HashMap<String, String> {
  header
    .iter()
    .zip(row)
    .filter_map(|(name, cell)| cell_text(cell).map(|v| (name.clone(), v)))
    .collect()
}

fn row_value<'a>(header: &[String], row: &'a [Value], field: &str) -> Option<&'a Value> {
  header
    .iter()
    .zip(row)
    .filter(|(name, _)| name.as_str() == field)
    .map(|(_, cell)| cell)
    .last()
}

fn cell_text(cell: &Value) -> Option<String> {
  match cell {
    Value::Null => None,
    Value::String(s) => Some(s.clone()),
    other => Some(other.to_string()),
  }
}

fn field_or(fields: &HashMap<String, String>, name: &str, default: &str) -> String {
  fields
    .get(name)
    .map(|v| v.trim())
    .filter(|v| !v.is_empty())
    .unwrap_or(default)
    .to_string()
}
