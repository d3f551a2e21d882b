//! Event store boundary: batch append + ordered reads.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::types::{TimeRange, VehicleEvent};

/// Persistence required by the engine.
#[async_trait]
pub trait EventStore: Send + Sync {
  /// Append a batch. All-or-nothing from the caller's point of view.
  async fn insert_batch(&self, events: &[VehicleEvent]) -> Result<(), StoreError>;

  /// Events for one plate, ascending by `observed_at`.
  async fn query_by_plate(
    &self,
    plate: &str,
    range: TimeRange,
  ) -> Result<Vec<VehicleEvent>, StoreError>;

  /// Events of every plate, ascending by `observed_at`.
  async fn query_range(&self, range: TimeRange) -> Result<Vec<VehicleEvent>, StoreError>;
}

/// In-memory store for the CLI and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
  inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
  events: Vec<VehicleEvent>,
  batches: usize,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of successful `insert_batch` calls.
  pub fn batch_count(&self) -> usize {
    self.inner.lock().batches
  }

  pub fn len(&self) -> usize {
    self.inner.lock().events.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn events(&self) -> Vec<VehicleEvent> {
    self.inner.lock().events.clone()
  }

  fn select<F>(&self, keep: F) -> Vec<VehicleEvent>
  where
    F: Fn(&VehicleEvent) -> bool,
  {
    let mut out: Vec<VehicleEvent> = self
      .inner
      .lock()
      .events
      .iter()
      .filter(|e| keep(e))
      .cloned()
      .collect();
    out.sort_by_key(|e| e.observed_at);
    out
  }
}

#[async_trait]
impl EventStore for MemoryStore {
  async fn insert_batch(&self, events: &[VehicleEvent]) -> Result<(), StoreError> {
    let mut inner = self.inner.lock();
    inner.events.extend_from_slice(events);
    inner.batches += 1;
    Ok(())
  }

  async fn query_by_plate(
    &self,
    plate: &str,
    range: TimeRange,
  ) -> Result<Vec<VehicleEvent>, StoreError> {
    Ok(self.select(|e| e.license_plate == plate && range.contains(e.observed_at)))
  }

  async fn query_range(&self, range: TimeRange) -> Result<Vec<VehicleEvent>, StoreError> {
    Ok(self.select(|e| range.contains(e.observed_at)))
  }
}
