//! Per-stream detection deduplication.
//!
//! Cubes deliver at-least-once, so the same detection ID can arrive in several
//! webhook calls. A detection is forwarded to storage only the first time its
//! ID is admitted on a given stream (gate feed). IDs are scoped per stream: the
//! same ID on two different gates is two different detections.
//!
//! The in-memory sets live for the process lifetime and are never evicted.
//! Growth is bounded by operational detection volume; a bounded or persistent
//! implementation can be swapped in behind [`Deduplicate`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::types::Admission;

/// Admission gate for detections.
pub trait Deduplicate: Send + Sync {
  /// Record `detection_id` on `stream_id`; `Duplicate` if already seen there.
  fn admit(&self, stream_id: &str, detection_id: &str) -> Admission;
}

type SeenSet = Arc<Mutex<HashSet<String>>>;

/// Process-wide in-memory seen-sets, one lock per stream.
#[derive(Debug, Default)]
pub struct Deduplicator {
  streams: RwLock<HashMap<String, SeenSet>>,
}

impl Deduplicator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of admitted IDs on a stream.
  pub fn seen_count(&self, stream_id: &str) -> usize {
    self
      .streams
      .read()
      .get(stream_id)
      .map(|set| set.lock().len())
      .unwrap_or(0)
  }

  /// Forget every admitted ID on every stream.
  pub fn reset(&self) {
    self.streams.write().clear();
  }

  fn stream(&self, stream_id: &str) -> SeenSet {
    if let Some(set) = self.streams.read().get(stream_id) {
      return Arc::clone(set);
    }
    let mut streams = self.streams.write();
    Arc::clone(streams.entry(stream_id.to_string()).or_default())
  }
}

impl Deduplicate for Deduplicator {
  fn admit(&self, stream_id: &str, detection_id: &str) -> Admission {
    let set = self.stream(stream_id);
    // Check-and-insert under one lock so concurrent admits of an ID cannot both win.
    let inserted = set.lock().insert(detection_id.to_string());
    if inserted {
      Admission::Admitted
    } else {
      Admission::Duplicate
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;

  #[test]
  fn second_admit_is_duplicate() {
    let dedup = Deduplicator::new();
    assert_eq!(dedup.admit("car_in", "42"), Admission::Admitted);
    assert_eq!(dedup.admit("car_in", "42"), Admission::Duplicate);
    assert_eq!(dedup.seen_count("car_in"), 1);
  }

  #[test]
  fn streams_are_independent() {
    let dedup = Deduplicator::new();
    assert_eq!(dedup.admit("car_in", "42"), Admission::Admitted);
    assert_eq!(dedup.admit("car_out", "42"), Admission::Admitted);
    assert_eq!(dedup.seen_count("car_in"), 1);
    assert_eq!(dedup.seen_count("car_out"), 1);
    assert_eq!(dedup.seen_count("bike_in"), 0);
  }

  #[test]
  fn reset_forgets_everything() {
    let dedup = Deduplicator::new();
    dedup.admit("car_in", "1");
    dedup.reset();
    assert_eq!(dedup.seen_count("car_in"), 0);
    assert_eq!(dedup.admit("car_in", "1"), Admission::Admitted);
  }

  #[test]
  fn concurrent_admits_admit_exactly_once() {
    let dedup = Arc::new(Deduplicator::new());
    let handles: Vec<_> = (0..16)
      .map(|_| {
        let dedup = Arc::clone(&dedup);
        thread::spawn(move || {
          (0..200)
            .filter(|i| dedup.admit("car_in", &i.to_string()) == Admission::Admitted)
            .count()
        })
      })
      .collect();

    let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(admitted, 200);
    assert_eq!(dedup.seen_count("car_in"), 200);
  }
}
