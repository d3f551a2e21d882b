//! Pair entry detections with exit detections for the same plate.
//!
//! Matching is a forward, non-overlapping greedy join: each entry takes the
//! earliest later exit that no earlier entry has consumed, within the
//! correlation window. Entries without a qualifying exit stay open with a
//! duration of -1.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::types::{Direction, EntryExitPair, VehicleEvent};

/// Call-site knobs for one correlation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationOptions {
  /// Max entry→exit gap (inclusive). `None` = unbounded.
  pub window: Option<Duration>,
  pub exclude_pedestrians: bool,
}

impl Default for CorrelationOptions {
  fn default() -> Self {
    Self {
      window: Some(Duration::days(7)),
      exclude_pedestrians: true,
    }
  }
}

impl From<&Config> for CorrelationOptions {
  fn from(config: &Config) -> Self {
    Self {
      window: config.correlation_window,
      exclude_pedestrians: config.exclude_pedestrians,
    }
  }
}

/// Correlate events (any mix of plates) into entry/exit pairs, newest entry first.
///
/// Events that cannot take part (unplated, no direction suffix, missing id,
/// excluded pedestrians) are dropped from the input; this never fails.
pub fn correlate(events: &[VehicleEvent], options: &CorrelationOptions) -> Vec<EntryExitPair> {
  let mut by_plate: BTreeMap<&str, Vec<&VehicleEvent>> = BTreeMap::new();
  for event in events.iter().filter(|e| eligible(e, options)) {
    by_plate
      .entry(event.license_plate.as_str())
      .or_default()
      .push(event);
  }

  let mut pairs: Vec<EntryExitPair> = by_plate
    .into_values()
    .flat_map(|plate_events| match_plate(plate_events, options.window))
    .collect();

  pairs.sort_by(newest_entry_first);
  pairs
}

fn eligible(event: &VehicleEvent, options: &CorrelationOptions) -> bool {
  !event.is_unplated()
    && !event.detection_id.is_empty()
    && event.direction().is_some()
    && !(options.exclude_pedestrians && event.is_pedestrian())
}

/// Greedy forward match for a single plate.
fn match_plate(mut events: Vec<&VehicleEvent>, window: Option<Duration>) -> Vec<EntryExitPair> {
  events.sort_by_key(|e| e.observed_at);

  let (entries, exits): (Vec<&VehicleEvent>, Vec<&VehicleEvent>) = events
    .into_iter()
    .partition(|e| e.direction() == Some(Direction::In));

  let mut pairs = Vec::with_capacity(entries.len());
  // Exits before `cursor` are consumed or can no longer qualify.
  let mut cursor = 0usize;

  for entry in entries {
    let candidate = exits[cursor..]
      .iter()
      .position(|x| x.observed_at > entry.observed_at)
      .map(|offset| cursor + offset);

    let matched = candidate.and_then(|idx| {
      let exit = exits[idx];
      let gap = exit.observed_at - entry.observed_at;
      let in_window = window.map_or(true, |w| gap <= w);
      let seconds = duration_seconds(entry.observed_at, exit.observed_at);
      (in_window && seconds > 0.0).then_some((idx, seconds))
    });

    match matched {
      Some((idx, seconds)) => {
        let exit = exits[idx];
        cursor = idx + 1;
        // An exit's timestamp is consumed as a whole.
        while cursor < exits.len() && exits[cursor].observed_at == exit.observed_at {
          cursor += 1;
        }
        pairs.push(EntryExitPair {
          entry: entry.clone(),
          exit: Some(exit.clone()),
          duration_seconds: seconds,
        });
      }
      None => pairs.push(EntryExitPair::open(entry.clone())),
    }
  }

  pairs
}

/// Elapsed seconds, keeping sub-second precision.
fn duration_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
  let delta = to - from;
  match delta.num_microseconds() {
    Some(us) => us as f64 / 1_000_000.0,
    None => delta.num_milliseconds() as f64 / 1_000.0,
  }
}

fn newest_entry_first(a: &EntryExitPair, b: &EntryExitPair) -> Ordering {
  b.entry
    .observed_at
    .cmp(&a.entry.observed_at)
    .then_with(|| b.entry.gate_id.cmp(&a.entry.gate_id))
    .then_with(|| b.entry.detection_id.cmp(&a.entry.detection_id))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::OPEN_DURATION;
  use chrono::TimeZone;

  fn t(min: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap() + Duration::minutes(min)
  }

  fn ev(id: &str, plate: &str, gate: &str, at: DateTime<Utc>) -> VehicleEvent {
    VehicleEvent {
      detection_id: id.into(),
      license_plate: plate.into(),
      category: "car".into(),
      color: "white".into(),
      observed_at: at,
      gate_id: gate.into(),
      zone: "cube-1".into(),
      description: "Gate".into(),
    }
  }

  fn opts() -> CorrelationOptions {
    CorrelationOptions::default()
  }

  #[test]
  fn entry_matches_earliest_later_exit() {
    let events = vec![
      ev("e1", "AB12", "car_in", t(0)),
      ev("x1", "AB12", "car_out", t(30)),
      ev("x2", "AB12", "car_out", t(90)),
    ];
    let pairs = correlate(&events, &opts());
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].exit.as_ref().unwrap().detection_id, "x1");
    assert!((pairs[0].duration_seconds - 1800.0).abs() < 1e-9);
  }

  #[test]
  fn exit_is_not_reused_by_later_entry() {
    let events = vec![
      ev("e1", "AB12", "car_in", t(0)),
      ev("x1", "AB12", "car_out", t(10)),
      ev("e2", "AB12", "car_in", t(20)),
    ];
    let pairs = correlate(&events, &opts());
    assert_eq!(pairs.len(), 2);
    // Newest entry first.
    assert_eq!(pairs[0].entry.detection_id, "e2");
    assert!(pairs[0].is_open());
    assert_eq!(pairs[1].entry.detection_id, "e1");
    assert_eq!(pairs[1].exit.as_ref().unwrap().detection_id, "x1");
  }

  #[test]
  fn back_to_back_entries_take_successive_exits() {
    let events = vec![
      ev("e1", "AB12", "car_in", t(0)),
      ev("e2", "AB12", "car_in", t(5)),
      ev("x1", "AB12", "car_out", t(10)),
      ev("x2", "AB12", "car_out", t(15)),
    ];
    let pairs = correlate(&events, &opts());
    let by_entry: Vec<_> = pairs
      .iter()
      .map(|p| (p.entry.detection_id.as_str(), p.exit.as_ref().map(|x| x.detection_id.as_str())))
      .collect();
    assert_eq!(by_entry, vec![("e2", Some("x2")), ("e1", Some("x1"))]);
  }

  #[test]
  fn exits_sharing_a_timestamp_are_consumed_together() {
    let events = vec![
      ev("e1", "AB12", "car_in", t(0)),
      ev("e2", "AB12", "car_in", t(1)),
      ev("x1", "AB12", "car_out", t(10)),
      ev("x1b", "AB12", "bike_out", t(10)),
    ];
    let pairs = correlate(&events, &opts());
    let e2 = pairs.iter().find(|p| p.entry.detection_id == "e2").unwrap();
    assert!(e2.is_open());
  }

  #[test]
  fn unmatched_entry_is_open() {
    let events = vec![
      ev("x0", "AB12", "car_out", t(0)),
      ev("e1", "AB12", "car_in", t(5)),
    ];
    let pairs = correlate(&events, &opts());
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].exit.is_none());
    assert_eq!(pairs[0].duration_seconds, OPEN_DURATION);
  }

  #[test]
  fn exit_at_same_instant_does_not_match() {
    let events = vec![
      ev("e1", "AB12", "car_in", t(0)),
      ev("x1", "AB12", "car_out", t(0)),
    ];
    let pairs = correlate(&events, &opts());
    assert!(pairs[0].is_open());
  }

  #[test]
  fn plates_never_cross_match() {
    let events = vec![
      ev("e1", "AB12", "car_in", t(0)),
      ev("x1", "CD34", "car_out", t(10)),
    ];
    let pairs = correlate(&events, &opts());
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].is_open());
  }

  #[test]
  fn unplated_events_never_appear() {
    let events = vec![
      ev("e1", "-", "car_in", t(0)),
      ev("x1", "-", "car_out", t(10)),
      ev("e2", "", "car_in", t(1)),
    ];
    assert!(correlate(&events, &opts()).is_empty());
  }

  #[test]
  fn gate_without_direction_is_ignored() {
    let events = vec![
      ev("e1", "AB12", "car_in", t(0)),
      ev("x1", "AB12", "lobby", t(10)),
    ];
    let pairs = correlate(&events, &opts());
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].is_open());
  }

  #[test]
  fn pedestrians_excluded_by_default() {
    let mut walker = ev("e1", "AB12", "car_in", t(0));
    walker.category = "Pedestrian".into();
    let events = vec![walker];
    assert!(correlate(&events, &opts()).is_empty());
    let lenient = CorrelationOptions {
      exclude_pedestrians: false,
      ..opts()
    };
    assert_eq!(correlate(&events, &lenient).len(), 1);
  }

  #[test]
  fn defaults_agree_with_config_defaults() {
    assert_eq!(opts(), CorrelationOptions::from(&Config::default()));
  }

  #[test]
  fn window_upper_bound_is_inclusive() {
    let window = Duration::hours(1);
    let options = CorrelationOptions {
      window: Some(window),
      ..opts()
    };

    let at_boundary = vec![
      ev("e1", "AB12", "car_in", t(0)),
      ev("x1", "AB12", "car_out", t(0) + window),
    ];
    let pairs = correlate(&at_boundary, &options);
    assert_eq!(pairs[0].exit.as_ref().unwrap().detection_id, "x1");
    assert!((pairs[0].duration_seconds - 3600.0).abs() < 1e-9);

    let past_boundary = vec![
      ev("e1", "AB12", "car_in", t(0)),
      ev("x1", "AB12", "car_out", t(0) + window + Duration::milliseconds(1)),
    ];
    assert!(correlate(&past_boundary, &options)[0].is_open());
  }

  #[test]
  fn out_of_window_exit_stays_available() {
    let options = CorrelationOptions {
      window: Some(Duration::minutes(30)),
      ..opts()
    };
    let events = vec![
      ev("e1", "AB12", "car_in", t(0)),
      ev("e2", "AB12", "car_in", t(50)),
      ev("x1", "AB12", "car_out", t(60)),
    ];
    let pairs = correlate(&events, &options);
    assert_eq!(pairs[0].entry.detection_id, "e2");
    assert_eq!(pairs[0].exit.as_ref().unwrap().detection_id, "x1");
    assert!(pairs[1].is_open());
  }

  #[test]
  fn unbounded_window_matches_any_gap() {
    let options = CorrelationOptions {
      window: None,
      ..opts()
    };
    let events = vec![
      ev("e1", "AB12", "car_in", t(0)),
      ev("x1", "AB12", "car_out", t(0) + Duration::days(30)),
    ];
    assert!(!correlate(&events, &options)[0].is_open());
  }

  #[test]
  fn sub_second_precision_preserved() {
    let events = vec![
      ev("e1", "AB12", "car_in", t(0)),
      ev("x1", "AB12", "car_out", t(0) + Duration::milliseconds(1500)),
    ];
    let pairs = correlate(&events, &opts());
    assert!((pairs[0].duration_seconds - 1.5).abs() < 1e-9);
  }

  #[test]
  fn unsorted_input_is_ordered_before_matching() {
    let events = vec![
      ev("x2", "AB12", "car_out", t(90)),
      ev("x1", "AB12", "car_out", t(30)),
      ev("e1", "AB12", "car_in", t(0)),
    ];
    let pairs = correlate(&events, &opts());
    assert_eq!(pairs[0].exit.as_ref().unwrap().detection_id, "x1");
  }

  #[test]
  fn output_is_newest_entry_first_across_plates() {
    let events = vec![
      ev("a", "AB12", "car_in", t(0)),
      ev("b", "CD34", "car_in", t(20)),
      ev("c", "EF56", "bike_in", t(10)),
    ];
    let ids: Vec<_> = correlate(&events, &opts())
      .into_iter()
      .map(|p| p.entry.detection_id)
      .collect();
    assert_eq!(ids, vec!["b", "c", "a"]);
  }
}
