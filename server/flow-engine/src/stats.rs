//! Reporting summaries over correlated pairs and raw events.

use serde::Serialize;

use crate::types::{Direction, EntryExitPair, VehicleEvent};

/// Dwell-time summary. Only positive matched durations contribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationStats {
  pub matched: usize,
  pub open: usize,
  pub average_seconds: f64,
  pub median_seconds: f64,
}

/// Entry/exit totals for vehicle flow (pedestrians excluded).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlowCounts {
  pub entries: u64,
  pub exits: u64,
}

pub fn duration_stats(pairs: &[EntryExitPair]) -> DurationStats {
  let mut durations: Vec<f64> = pairs
    .iter()
    .filter(|p| p.exit.is_some() && p.duration_seconds > 0.0)
    .map(|p| p.duration_seconds)
    .collect();
  let open = pairs.iter().filter(|p| p.is_open()).count();

  if durations.is_empty() {
    return DurationStats {
      matched: 0,
      open,
      average_seconds: 0.0,
      median_seconds: 0.0,
    };
  }

  durations.sort_by(|a, b| a.total_cmp(b));
  let n = durations.len();
  let average = durations.iter().sum::<f64>() / n as f64;
  let median = if n % 2 == 1 {
    durations[n / 2]
  } else {
    (durations[n / 2 - 1] + durations[n / 2]) / 2.0
  };

  DurationStats {
    matched: n,
    open,
    average_seconds: average,
    median_seconds: median,
  }
}

pub fn flow_counts(events: &[VehicleEvent]) -> FlowCounts {
  events
    .iter()
    .filter(|e| !e.is_pedestrian())
    .fold(FlowCounts::default(), |mut acc, e| {
      match e.direction() {
        Some(Direction::In) => acc.entries += 1,
        Some(Direction::Out) => acc.exits += 1,
        None => {}
      }
      acc
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{TimeZone, Utc};

  fn event(gate: &str, category: &str) -> VehicleEvent {
    VehicleEvent {
      detection_id: "1".into(),
      license_plate: "AB12".into(),
      category: category.into(),
      color: "N/A".into(),
      observed_at: Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
      gate_id: gate.into(),
      zone: "N/A".into(),
      description: "N/A".into(),
    }
  }

  fn pair(duration: Option<f64>) -> EntryExitPair {
    match duration {
      Some(d) => EntryExitPair {
        entry: event("car_in", "car"),
        exit: Some(event("car_out", "car")),
        duration_seconds: d,
      },
      None => EntryExitPair::open(event("car_in", "car")),
    }
  }

  #[test]
  fn empty_stats_are_zero() {
    let stats = duration_stats(&[pair(None)]);
    assert_eq!(stats.matched, 0);
    assert_eq!(stats.open, 1);
    assert_eq!(stats.average_seconds, 0.0);
    assert_eq!(stats.median_seconds, 0.0);
  }

  #[test]
  fn average_and_median() {
    let pairs = vec![pair(Some(60.0)), pair(Some(180.0)), pair(Some(120.0)), pair(Some(600.0)), pair(None)];
    let stats = duration_stats(&pairs);
    assert_eq!(stats.matched, 4);
    assert_eq!(stats.open, 1);
    assert!((stats.average_seconds - 240.0).abs() < 1e-9);
    assert!((stats.median_seconds - 150.0).abs() < 1e-9);
  }

  #[test]
  fn flow_counts_skip_pedestrians_and_undirected() {
    let events = vec![
      event("car_in", "car"),
      event("bike_in", "motorbike"),
      event("car_out", "car"),
      event("car_out", "pedestrian"),
      event("lobby", "car"),
    ];
    assert_eq!(flow_counts(&events), FlowCounts { entries: 2, exits: 1 });
  }
}
