//! Parking Flow Gateway
//!
//! HTTP service that receives cube webhooks, runs them through the flow engine
//! (dedup + batch insert into PostgreSQL), and serves entry/exit pairs and
//! dwell statistics.

mod date;
mod handlers;
mod state;
mod store;
mod types;

pub use handlers::{duration_stats, flow_counts, health, pairs_for_plate, pairs_in_range, webhook};
pub use state::AppState;
pub use store::PgEventStore;
pub use types::RangeParams;
