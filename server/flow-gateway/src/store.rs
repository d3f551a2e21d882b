//! PostgreSQL event store (sqlx).
//!
//! One row per admitted detection. A webhook batch is written with a single
//! `INSERT ... SELECT FROM UNNEST(...)` statement, so it lands entirely or not at all.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flow_engine::{EventStore, StoreError, TimeRange, VehicleEvent};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::{PgPool, PgRow, Postgres};

const COLUMNS: &str =
  "insertion_id, license_plate, category, color, timestamp, gate, zone, description";

pub struct PgEventStore {
  pool: PgPool,
  table: String,
}

impl PgEventStore {
  /// `table` is interpolated into SQL, so it must be a plain identifier.
  pub fn new(pool: PgPool, table: &str) -> Result<Self, StoreError> {
    validate_table(table)?;
    Ok(Self {
      pool,
      table: table.to_string(),
    })
  }

  /// Create the table and its plate/time index if missing.
  pub async fn ensure_schema(&self) -> Result<(), StoreError> {
    let create = format!(
      r#"
      CREATE TABLE IF NOT EXISTS {t} (
        id BIGSERIAL PRIMARY KEY,
        insertion_id TEXT NOT NULL,
        license_plate TEXT NOT NULL DEFAULT '-',
        category TEXT,
        color TEXT,
        timestamp TIMESTAMPTZ NOT NULL,
        gate TEXT NOT NULL,
        zone TEXT,
        description TEXT
      )
      "#,
      t = self.table
    );
    let index = format!(
      "CREATE INDEX IF NOT EXISTS {t}_plate_ts_idx ON {t} (license_plate, timestamp)",
      t = self.table
    );

    for sql in [create, index] {
      query::<Postgres>(&sql)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Schema(e.to_string()))?;
    }
    Ok(())
  }
}

#[async_trait]
impl EventStore for PgEventStore {
  async fn insert_batch(&self, events: &[VehicleEvent]) -> Result<(), StoreError> {
    if events.is_empty() {
      return Ok(());
    }

    let timestamps: Vec<DateTime<Utc>> = events.iter().map(|e| e.observed_at).collect();

    let sql = format!(
      r#"
      INSERT INTO {t} ({COLUMNS})
      SELECT * FROM UNNEST(
        $1::text[], $2::text[], $3::text[], $4::text[],
        $5::timestamptz[], $6::text[], $7::text[], $8::text[]
      )
      "#,
      t = self.table
    );

    query::<Postgres>(&sql)
      .bind(text_column(events, |e| &e.detection_id))
      .bind(text_column(events, |e| &e.license_plate))
      .bind(text_column(events, |e| &e.category))
      .bind(text_column(events, |e| &e.color))
      .bind(timestamps)
      .bind(text_column(events, |e| &e.gate_id))
      .bind(text_column(events, |e| &e.zone))
      .bind(text_column(events, |e| &e.description))
      .execute(&self.pool)
      .await
      .map_err(|e| StoreError::backend(e.to_string()))?;
    Ok(())
  }

  async fn query_by_plate(
    &self,
    plate: &str,
    range: TimeRange,
  ) -> Result<Vec<VehicleEvent>, StoreError> {
    let sql = format!(
      r#"
      SELECT {COLUMNS} FROM {t}
      WHERE license_plate = $1
        AND ($2::timestamptz IS NULL OR timestamp >= $2)
        AND ($3::timestamptz IS NULL OR timestamp <= $3)
      ORDER BY timestamp ASC, insertion_id ASC
      "#,
      t = self.table
    );

    let rows = query::<Postgres>(&sql)
      .bind(plate)
      .bind(range.start)
      .bind(range.end)
      .fetch_all(&self.pool)
      .await
      .map_err(|e| StoreError::backend(e.to_string()))?;
    rows.iter().map(decode_row).collect()
  }

  async fn query_range(&self, range: TimeRange) -> Result<Vec<VehicleEvent>, StoreError> {
    let sql = format!(
      r#"
      SELECT {COLUMNS} FROM {t}
      WHERE ($1::timestamptz IS NULL OR timestamp >= $1)
        AND ($2::timestamptz IS NULL OR timestamp <= $2)
      ORDER BY timestamp ASC, insertion_id ASC
      "#,
      t = self.table
    );

    let rows = query::<Postgres>(&sql)
      .bind(range.start)
      .bind(range.end)
      .fetch_all(&self.pool)
      .await
      .map_err(|e| StoreError::backend(e.to_string()))?;
    rows.iter().map(decode_row).collect()
  }
}

fn text_column(events: &[VehicleEvent], field: impl Fn(&VehicleEvent) -> &String) -> Vec<String> {
  events.iter().map(|e| field(e).clone()).collect()
}

fn decode_row(row: &PgRow) -> Result<VehicleEvent, StoreError> {
  let text = |col: &str, default: &str| -> Result<String, StoreError> {
    row
      .try_get::<Option<String>, _>(col)
      .map(|v| v.unwrap_or_else(|| default.to_string()))
      .map_err(|e| StoreError::backend(format!("{col}: {e}")))
  };

  Ok(VehicleEvent {
    detection_id: text("insertion_id", "")?,
    license_plate: text("license_plate", "-")?,
    category: text("category", "N/A")?,
    color: text("color", "N/A")?,
    observed_at: row
      .try_get::<DateTime<Utc>, _>("timestamp")
      .map_err(|e| StoreError::backend(format!("timestamp: {e}")))?,
    gate_id: text("gate", "")?,
    zone: text("zone", "N/A")?,
    description: text("description", "")?,
  })
}

fn validate_table(name: &str) -> Result<(), StoreError> {
  let mut chars = name.chars();
  let valid_start = chars
    .next()
    .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
  let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
  if valid_start && valid_rest && name.len() <= 63 {
    Ok(())
  } else {
    Err(StoreError::Schema(format!("invalid table name: {name:?}")))
  }
}
