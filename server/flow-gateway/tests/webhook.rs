//! Handler-level tests against an in-memory store.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{Duration, TimeZone, Utc};
use flow_engine::{Config, Deduplicator, Engine, EventStore, IngestStatus, MemoryStore, VehicleEvent};
use flow_gateway::{AppState, RangeParams};

fn app() -> (Arc<AppState>, Arc<MemoryStore>) {
  let store = Arc::new(MemoryStore::new());
  let engine = Engine::new(Config::default(), Arc::new(Deduplicator::new()), store.clone());
  (Arc::new(AppState::new(engine)), store)
}

fn body(ids: &[&str]) -> Bytes {
  let rows: Vec<_> = ids
    .iter()
    .map(|id| serde_json::json!([id, "KA01AB1234", "car", "white"]))
    .collect();
  let payload = serde_json::json!({
    "cube_id": "cube-7",
    "name": "North Gate",
    "data": { "header": ["ID", "License plate", "Category", "Color"], "data": rows }
  });
  Bytes::from(serde_json::to_vec(&payload).unwrap())
}

fn range(start: Option<&str>, end: Option<&str>) -> Query<RangeParams> {
  Query(RangeParams {
    start: start.map(String::from),
    end: end.map(String::from),
  })
}

#[tokio::test]
async fn health_is_ok() {
  assert_eq!(flow_gateway::health().await, "ok");
}

#[tokio::test]
async fn webhook_accepts_then_reports_duplicates() {
  let (state, store) = app();

  let (status, ack) =
    flow_gateway::webhook(State(state.clone()), Path("car_in".into()), body(&["1", "2"])).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(ack.status, IngestStatus::Accepted);
  assert_eq!(ack.admitted, 2);

  let (status, ack) =
    flow_gateway::webhook(State(state.clone()), Path("car_in".into()), body(&["2", "1"])).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(ack.status, IngestStatus::AllDuplicates);
  assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn malformed_and_unknown_gate_are_bad_requests() {
  let (state, store) = app();

  let (status, ack) = flow_gateway::webhook(
    State(state.clone()),
    Path("car_in".into()),
    Bytes::from_static(b"{\"cube_id\": 3"),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(ack.status, IngestStatus::Rejected);

  let (status, _) =
    flow_gateway::webhook(State(state.clone()), Path("loading_dock".into()), body(&["1"])).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(store.is_empty());
}

#[tokio::test]
async fn bad_range_is_a_bad_request() {
  let (state, _) = app();
  let err = flow_gateway::pairs_in_range(State(state), range(Some("yesterday"), None))
    .await
    .unwrap_err();
  assert_eq!(err.0, StatusCode::BAD_REQUEST);
  assert_eq!(err.1.field.as_deref(), Some("start"));
}

fn stored(id: &str, gate: &str, minutes: i64) -> VehicleEvent {
  VehicleEvent {
    detection_id: id.into(),
    license_plate: "KA01AB1234".into(),
    category: "car".into(),
    color: "white".into(),
    observed_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes),
    gate_id: gate.into(),
    zone: "cube-7".into(),
    description: "North Gate".into(),
  }
}

#[tokio::test]
async fn reports_pairs_and_stats() {
  let (state, store) = app();
  store
    .insert_batch(&[
      stored("e1", "car_in", 0),
      stored("x1", "car_out", 90),
      stored("e2", "car_in", 120),
    ])
    .await
    .unwrap();

  let pairs = flow_gateway::pairs_for_plate(
    State(state.clone()),
    Path("KA01AB1234".into()),
    range(Some("2025-03-01T00:00:00Z"), Some("2025-03-02T00:00:00Z")),
  )
  .await
  .unwrap()
  .0;
  assert_eq!(pairs.len(), 2);
  assert_eq!(pairs[0].entry.detection_id, "e2");
  assert!(pairs[0].is_open());
  assert!((pairs[1].duration_seconds - 5400.0).abs() < 1e-9);

  let stats = flow_gateway::duration_stats(State(state.clone()), range(None, None))
    .await
    .unwrap()
    .0;
  assert_eq!(stats.matched, 1);
  assert_eq!(stats.open, 1);

  let counts = flow_gateway::flow_counts(State(state), range(None, None))
    .await
    .unwrap()
    .0;
  assert_eq!(counts.entries, 2);
  assert_eq!(counts.exits, 1);
}
