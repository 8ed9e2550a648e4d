//! Replayed context annotations.

use serde_json::json;

use crate::devices::types::{Component, ContextFeed};
use crate::error::SimResult;
use crate::replay::store::MeasurementStore;
use crate::sim::clock::Clock;
use crate::sim::types::ContextRecord;

/// Replays annotation records recorded alongside the telemetry.
///
/// All records still valid at construction are loaded once; each step then
/// returns the currently live subset: recorded strictly before now, not
/// yet ended, and starting within the lookahead horizon.
pub struct ContextReplay {
    clock: Clock,
    location: String,
    horizon_ticks: i64,
    records: Vec<ContextRecord>,
}

impl ContextReplay {
    /// Loads all records for `location` valid at or after `clock`.
    pub fn new(
        clock: Clock,
        location: &str,
        horizon_ticks: i64,
        store: &MeasurementStore,
    ) -> SimResult<Self> {
        Ok(Self {
            records: store.context_records(location, &clock)?,
            clock,
            location: location.to_string(),
            horizon_ticks,
        })
    }

    /// Number of records loaded at construction.
    pub fn loaded(&self) -> usize {
        self.records.len()
    }
}

impl Component for ContextReplay {
    fn id(&self) -> String {
        format!("context/replay/{}", self.location)
    }

    fn specification(&self) -> serde_json::Value {
        json!({
            "model": "replay",
            "location": self.location,
            "horizon_ticks": self.horizon_ticks,
            "records": self.records.len(),
        })
    }
}

impl ContextFeed for ContextReplay {
    fn step(&mut self, step_ticks: i64) -> SimResult<Vec<ContextRecord>> {
        let now = self.clock;
        self.clock = self.clock.advance(step_ticks);
        let horizon = now.advance(self.horizon_ticks);

        Ok(self
            .records
            .iter()
            .filter(|c| c.valid_to > now && now > c.recorded_at && horizon > c.valid_from)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(recorded: f64, from: f64, to: f64) -> ContextRecord {
        ContextRecord {
            recorded_at: Clock::from_seconds(recorded, 1),
            valid_from: Clock::from_seconds(from, 1),
            valid_to: Clock::from_seconds(to, 1),
            source: "test".to_string(),
            payload: serde_json::Value::Null,
        }
    }

    fn feed(records: Vec<ContextRecord>, at: f64, horizon_ticks: i64) -> ContextReplay {
        ContextReplay {
            clock: Clock::from_seconds(at, 1),
            location: "site".to_string(),
            horizon_ticks,
            records,
        }
    }

    #[test]
    fn live_records_are_visible() {
        // Recorded at 5, valid over [8, 20); now=10 with a wide horizon.
        let mut feed = feed(vec![record(5.0, 8.0, 20.0)], 10.0, 100);
        assert_eq!(feed.step(1).unwrap().len(), 1);
    }

    #[test]
    fn records_are_hidden_until_after_their_recording_time() {
        let mut feed = feed(vec![record(15.0, 8.0, 20.0)], 10.0, 100);
        assert!(feed.step(1).unwrap().is_empty());
    }

    #[test]
    fn ended_records_drop_out() {
        let mut feed = feed(vec![record(0.0, 2.0, 10.0)], 10.0, 100);
        // valid_to == now is no longer live: validity is half-open.
        assert!(feed.step(1).unwrap().is_empty());
    }

    #[test]
    fn horizon_gates_far_future_records() {
        let records = vec![record(0.0, 50.0, 60.0)];
        let mut narrow = feed(records.clone(), 10.0, 20);
        assert!(narrow.step(1).unwrap().is_empty());

        let mut wide = feed(records, 10.0, 100);
        assert_eq!(wide.step(1).unwrap().len(), 1);
    }

    #[test]
    fn stepping_moves_the_visibility_window() {
        let mut feed = feed(vec![record(0.0, 30.0, 40.0)], 0.0, 5);
        // At t=0 the record starts beyond the 5 s horizon.
        assert!(feed.step(10).unwrap().is_empty());
        // By t=30 it is live.
        assert!(feed.step(10).unwrap().is_empty());
        assert!(feed.step(10).unwrap().is_empty());
        assert_eq!(feed.step(10).unwrap().len(), 1);
    }
}
