//! Core engine: owns the injected deduplicator and store, runs ingestion and reports.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::correlation::{self, CorrelationOptions};
use crate::dedupe::Deduplicate;
use crate::error::EngineError;
use crate::ingest;
use crate::stats::{self, DurationStats, FlowCounts};
use crate::store::EventStore;
use crate::types::*;

/// The flow engine. Cheap to share behind an `Arc`; all state is in its collaborators.
pub struct Engine {
  config: Config,
  dedup: Arc<dyn Deduplicate>,
  store: Arc<dyn EventStore>,
}

impl Engine {
  pub fn new(config: Config, dedup: Arc<dyn Deduplicate>, store: Arc<dyn EventStore>) -> Self {
    Self {
      config,
      dedup,
      store,
    }
  }

  pub fn correlation_options(&self) -> CorrelationOptions {
    CorrelationOptions::from(&self.config)
  }

  /// Ingest one raw webhook body delivered on `gate`.
  ///
  /// Always yields a structured acknowledgment; validation and store failures
  /// are reported through its status.
  pub async fn ingest(&self, gate: &str, body: &[u8]) -> IngestAck {
    match ingest::parse_payload(body) {
      Ok(payload) => self.ingest_payload(gate, &payload).await,
      Err(e) => {
        warn!(gate = %gate, error = %e, "webhook_rejected");
        IngestAck::rejected(gate, e.to_string())
      }
    }
  }

  pub async fn ingest_payload(&self, gate: &str, payload: &WebhookPayload) -> IngestAck {
    let batch = match ingest::prepare(&self.config, self.dedup.as_ref(), gate, payload, Utc::now()) {
      Ok(batch) => batch,
      Err(e) => {
        warn!(gate = %gate, error = %e, "webhook_rejected");
        return IngestAck::rejected(gate, e.to_string());
      }
    };

    if !batch.events.is_empty() {
      if let Err(e) = self.store.insert_batch(&batch.events).await {
        // Admissions stay recorded: a redelivery of these rows will be dropped as duplicates.
        error!(
          gate = %gate,
          batch_id = %batch.batch_id,
          admitted = batch.events.len(),
          error = %e,
          "store_insert_failed"
        );
        return batch.ack(IngestStatus::StoreFailed, Some(e.to_string()));
      }
    }

    let status = batch.status();
    info!(
      gate = %gate,
      batch_id = %batch.batch_id,
      total = batch.total,
      admitted = batch.events.len(),
      duplicates = batch.duplicates,
      skipped = batch.skipped,
      "webhook_ingested"
    );
    batch.ack(status, None)
  }

  /// Pairs for one plate whose entry lies in `range`.
  pub async fn pairs_for_plate(
    &self,
    plate: &str,
    range: TimeRange,
  ) -> Result<Vec<EntryExitPair>, EngineError> {
    let options = self.correlation_options();
    let events = self
      .store
      .query_by_plate(plate, widen(range, &options))
      .await?;
    Ok(restrict(correlation::correlate(&events, &options), range))
  }

  /// Pairs for every plate whose entry lies in `range`.
  pub async fn pairs_in_range(&self, range: TimeRange) -> Result<Vec<EntryExitPair>, EngineError> {
    let options = self.correlation_options();
    let events = self.store.query_range(widen(range, &options)).await?;
    Ok(restrict(correlation::correlate(&events, &options), range))
  }

  pub async fn duration_stats(&self, range: TimeRange) -> Result<DurationStats, EngineError> {
    let pairs = self.pairs_in_range(range).await?;
    Ok(stats::duration_stats(&pairs))
  }

  pub async fn flow_counts(&self, range: TimeRange) -> Result<FlowCounts, EngineError> {
    let events = self.store.query_range(range).await?;
    Ok(stats::flow_counts(&events))
  }
}

/// The store slice whose correlation agrees with the full history on `range`.
///
/// Matching chains can reach arbitrarily far back (each earlier entry may consume
/// the exit a later one would take), so the start stays open. No entry up to the
/// range end can match an exit past `end + window`.
fn widen(range: TimeRange, options: &CorrelationOptions) -> TimeRange {
  match (options.window, range.end) {
    (Some(window), Some(end)) => TimeRange::new(None, Some(end + window)),
    _ => TimeRange::unbounded(),
  }
}

fn restrict(pairs: Vec<EntryExitPair>, range: TimeRange) -> Vec<EntryExitPair> {
  pairs
    .into_iter()
    .filter(|p| range.contains(p.entry.observed_at))
    .collect()
}
