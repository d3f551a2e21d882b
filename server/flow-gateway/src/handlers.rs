//! HTTP handlers for the gateway.

use axum::{
  body::Bytes,
  extract::{Path, Query, State},
  http::StatusCode,
  Json,
};
use std::sync::Arc;
use tracing::error;

use flow_engine::stats::{DurationStats, FlowCounts};
use flow_engine::types::ErrorOutput;
use flow_engine::{EngineError, EntryExitPair, IngestAck, IngestStatus};

use crate::date;
use crate::state::AppState;
use crate::types::RangeParams;

type ApiError = (StatusCode, Json<ErrorOutput>);

pub async fn health() -> &'static str {
  "ok"
}

/// `POST /webhooks/:gate`. The raw body is decoded by the engine so that
/// malformed JSON still gets a structured `rejected` acknowledgment.
pub async fn webhook(
  State(state): State<Arc<AppState>>,
  Path(gate): Path<String>,
  body: Bytes,
) -> (StatusCode, Json<IngestAck>) {
  let ack = state.engine.ingest(&gate, &body).await;
  let status = match ack.status {
    IngestStatus::Accepted | IngestStatus::AllDuplicates => StatusCode::OK,
    IngestStatus::Rejected => StatusCode::BAD_REQUEST,
    IngestStatus::StoreFailed => StatusCode::SERVICE_UNAVAILABLE,
  };
  (status, Json(ack))
}

pub async fn pairs_for_plate(
  State(state): State<Arc<AppState>>,
  Path(plate): Path<String>,
  Query(params): Query<RangeParams>,
) -> Result<Json<Vec<EntryExitPair>>, ApiError> {
  let range = date::parse_range(&params).map_err(api_error)?;
  let pairs = state
    .engine
    .pairs_for_plate(&plate, range)
    .await
    .map_err(api_error)?;
  Ok(Json(pairs))
}

pub async fn pairs_in_range(
  State(state): State<Arc<AppState>>,
  Query(params): Query<RangeParams>,
) -> Result<Json<Vec<EntryExitPair>>, ApiError> {
  let range = date::parse_range(&params).map_err(api_error)?;
  let pairs = state.engine.pairs_in_range(range).await.map_err(api_error)?;
  Ok(Json(pairs))
}

pub async fn duration_stats(
  State(state): State<Arc<AppState>>,
  Query(params): Query<RangeParams>,
) -> Result<Json<DurationStats>, ApiError> {
  let range = date::parse_range(&params).map_err(api_error)?;
  let stats = state.engine.duration_stats(range).await.map_err(api_error)?;
  Ok(Json(stats))
}

pub async fn flow_counts(
  State(state): State<Arc<AppState>>,
  Query(params): Query<RangeParams>,
) -> Result<Json<FlowCounts>, ApiError> {
  let range = date::parse_range(&params).map_err(api_error)?;
  let counts = state.engine.flow_counts(range).await.map_err(api_error)?;
  Ok(Json(counts))
}

fn api_error(e: EngineError) -> ApiError {
  match e {
    EngineError::Validation { field, reason } => (
      StatusCode::BAD_REQUEST,
      Json(ErrorOutput::new(reason).with_field(field)),
    ),
    other => {
      error!(error = %other, "report_failed");
      (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorOutput::new(other.to_string())),
      )
    }
  }
}
