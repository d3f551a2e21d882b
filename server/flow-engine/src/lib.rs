//! Parking Flow Correlation Engine: deduplicating ingestion + entry/exit pairing.
//!
//! Admits cube detections once per gate stream, hands admitted batches to an
//! injected event store, and pairs each entry with the nearest later exit for
//! the same plate to report dwell time.
//!
//! No network and no SQL here; persistence is behind [`EventStore`].

pub mod config;
pub mod correlation;
pub mod dedupe;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod stats;
pub mod store;
pub mod types;

pub use config::Config;
pub use correlation::{correlate, CorrelationOptions};
pub use dedupe::{Deduplicate, Deduplicator};
pub use engine::Engine;
pub use error::{EngineError, ParseError, StoreError};
pub use store::{EventStore, MemoryStore};
pub use types::{EntryExitPair, IngestAck, IngestStatus, TimeRange, VehicleEvent, WebhookPayload};
