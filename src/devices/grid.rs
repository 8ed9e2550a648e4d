//! Time-of-use priced grid connection.

use serde_json::json;

use crate::devices::types::{Component, Grid};
use crate::error::SimResult;
use crate::sim::clock::Clock;
use crate::sim::types::{GridDemand, GridStep};

/// A grid connection with a piecewise tariff and demand limits.
///
/// Delivery always matches demand. Exceeding a configured limit raises the
/// `limit_violated` flag on the result rather than failing the step.
#[derive(Debug, Clone)]
pub struct PricedGrid {
    clock: Clock,
    /// `(epoch seconds, price per kWh)`, ascending by time.
    price_schedule: Vec<(f64, f64)>,
    max_power_apparent_va: f64,
    max_power_active_w: f64,
}

impl PricedGrid {
    /// Creates a grid with the given tariff schedule and limits.
    ///
    /// Pass `f64::INFINITY` limits for an unconstrained connection.
    pub fn new(
        clock: Clock,
        mut price_schedule: Vec<(f64, f64)>,
        max_power_apparent_va: f64,
        max_power_active_w: f64,
    ) -> Self {
        price_schedule.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            clock,
            price_schedule,
            max_power_apparent_va,
            max_power_active_w,
        }
    }

    /// Price in effect at `ts`: the most recent entry at or before it,
    /// 0 when the schedule is empty or entirely in the future.
    fn price_at(&self, ts: f64) -> f64 {
        self.price_schedule
            .iter()
            .rev()
            .find(|(start, _)| *start <= ts)
            .map(|(_, price)| *price)
            .unwrap_or(0.0)
    }
}

impl Component for PricedGrid {
    fn id(&self) -> String {
        "grid/priced".to_string()
    }

    fn specification(&self) -> serde_json::Value {
        json!({
            "model": "priced",
            "price_schedule": self.price_schedule,
            "max_power_apparent_va": self.max_power_apparent_va,
            "max_power_active_w": self.max_power_active_w,
        })
    }
}

impl Grid for PricedGrid {
    fn step(&mut self, step_ticks: i64, demand: Option<&GridDemand>) -> SimResult<GridStep> {
        let next_clock = self.clock.advance(step_ticks);
        // Tariff lookup uses the step's starting time.
        let price = self.price_at(self.clock.to_seconds());
        let hours = Clock::difference_hours(self.clock, next_clock)?;
        self.clock = next_clock;

        let Some(demand) = demand else {
            return Ok(GridStep {
                power_delivered_apparent_va: 0.0,
                power_delivered_active_w: 0.0,
                cost: 0.0,
                limit_violated: false,
            });
        };

        Ok(GridStep {
            power_delivered_apparent_va: demand.power_apparent_va,
            power_delivered_active_w: demand.power_active_w,
            cost: demand.power_active_w * hours / 1000.0 * price,
            limit_violated: demand.power_active_w > self.max_power_active_w
                || demand.power_apparent_va > self.max_power_apparent_va,
        })
    }
}
