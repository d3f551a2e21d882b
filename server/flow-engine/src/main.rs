//! Binary entrypoint: offline correlation over JSON lines.
//!
//! Each input line is a VehicleEvent (as exported from the event store). After
//! stdin closes, every plate is correlated and output lines are either:
//! - An EntryExitPair (newest entry first)
//! - An ErrorOutput (for input lines that failed to parse, emitted as they are read)
//!
//! Correlation options come from the same environment keys as the gateway.

use flow_engine::types::ErrorOutput;
use flow_engine::{correlate, Config, CorrelationOptions, VehicleEvent};
use std::io::{self, BufRead, Write};
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

fn main() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_timer(UtcTime::rfc_3339())
    .with_target(false)
    .with_writer(io::stderr)
    .init();

  if let Err(e) = run() {
    error!(error = %e, "flow_engine_failed");
    std::process::exit(1);
  }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
  let config = Config::from_env()?;
  let options = CorrelationOptions::from(&config);

  let stdin = io::stdin();
  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());
  let mut events: Vec<VehicleEvent> = Vec::new();

  for line in stdin.lock().lines() {
    let line = line?;

    // Skip blank lines.
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }

    match serde_json::from_str::<VehicleEvent>(trimmed) {
      Ok(event) => events.push(event),
      Err(e) => {
        let err = ErrorOutput::new(format!("json parse: {}", e));
        serde_json::to_writer(&mut out, &err)?;
        writeln!(out)?;
      }
    }
  }

  let pairs = correlate(&events, &options);
  let open = pairs.iter().filter(|p| p.is_open()).count();
  for pair in &pairs {
    serde_json::to_writer(&mut out, pair)?;
    writeln!(out)?;
  }
  out.flush()?;

  info!(events = events.len(), pairs = pairs.len(), open, "correlation_complete");
  Ok(())
}
