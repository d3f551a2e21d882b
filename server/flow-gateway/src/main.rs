//! Binary entrypoint for the flow gateway.

use axum::{routing::get, routing::post, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

use flow_engine::{Config, Deduplicator, Engine};
use flow_gateway::{AppState, PgEventStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  // RUST_LOG overrides; debug shows per-detection admission lines.
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_timer(UtcTime::rfc_3339())
    .with_target(false)
    .init();

  let database_url = std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;
  let port: u16 = std::env::var("PORT")
    .unwrap_or_else(|_| "5000".into())
    .parse()
    .map_err(|_| "PORT must be a valid u16")?;
  let table = std::env::var("DB_TABLE").unwrap_or_else(|_| "parking".into());
  let config = Config::from_env()?;

  info!(
    streams = ?config.streams,
    timestamp_source = ?config.timestamp_source,
    parse_failure = ?config.parse_failure,
    correlation_window_hours = ?config.correlation_window.map(|w| w.num_hours()),
    table = %table,
    "config_loaded"
  );

  let pool = sqlx_postgres::PgPool::connect(&database_url).await?;
  let store = PgEventStore::new(pool, &table)?;
  store.ensure_schema().await?;

  let engine = Engine::new(config, Arc::new(Deduplicator::new()), Arc::new(store));
  let state = Arc::new(AppState::new(engine));

  let app = Router::new()
    .route("/health", get(flow_gateway::health))
    .route("/webhooks/:gate", post(flow_gateway::webhook))
    .route("/pairs", get(flow_gateway::pairs_in_range))
    .route("/pairs/:plate", get(flow_gateway::pairs_for_plate))
    .route("/stats/durations", get(flow_gateway::duration_stats))
    .route("/stats/flow", get(flow_gateway::flow_counts))
    .with_state(state);

  let addr = SocketAddr::from(([0, 0, 0, 0], port));
  info!(addr = %addr, "flow_gateway_listening");

  let listener = tokio::net::TcpListener::bind(addr).await?;
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      tokio::signal::ctrl_c().await.ok();
      info!("shutdown_signal_received");
    })
    .await?;

  Ok(())
}
