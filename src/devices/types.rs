//! The stepped-component contract shared by analytic and replay models.

use rand::{Rng, rngs::StdRng};

use crate::error::SimResult;
use crate::sim::types::{
    BatteryCommand, BatteryStep, ContextRecord, GridDemand, GridStep, InverterObservation,
    InverterStep, LoadStep, PowerSourceStep,
};

/// Behavior common to every simulated component.
///
/// Identity and specification exist for provenance: a run log can record
/// exactly which models, with which parameters, produced it. The `context`
/// hook delivers out-of-band annotation records; components ignore them
/// unless they opt in.
pub trait Component {
    /// Stable identifier for logs and exports.
    fn id(&self) -> String;

    /// The component's configuration echoed back as structured data.
    fn specification(&self) -> serde_json::Value;

    /// Receives context records valid around the current tick.
    fn context(&mut self, _records: &[ContextRecord]) {}
}

/// DC generator: a PV array model or replayed generator telemetry.
pub trait PowerSource: Component {
    fn step(&mut self, step_ticks: i64) -> SimResult<PowerSourceStep>;
}

/// Storage. `command` is `None` on the first tick, before any dispatch
/// decision exists.
pub trait Battery: Component {
    fn step(&mut self, step_ticks: i64, command: Option<&BatteryCommand>) -> SimResult<BatteryStep>;
}

/// AC consumer.
pub trait Load: Component {
    fn step(&mut self, step_ticks: i64) -> SimResult<LoadStep>;
}

/// Utility connection. `demand` is `None` on the first tick.
pub trait Grid: Component {
    fn step(&mut self, step_ticks: i64, demand: Option<&GridDemand>) -> SimResult<GridStep>;
}

/// DC to AC converter and dispatch policy.
pub trait Inverter: Component {
    fn step(
        &mut self,
        step_ticks: i64,
        observation: &InverterObservation,
    ) -> SimResult<InverterStep>;
}

/// Feed of out-of-band annotation records.
pub trait ContextFeed: Component {
    /// Records currently live: recorded before now, not yet ended, and
    /// starting within the feed's lookahead horizon.
    fn step(&mut self, step_ticks: i64) -> SimResult<Vec<ContextRecord>>;
}

/// Gaussian noise via the Box-Muller transform, mean 0.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn zero_std_dev_is_silent() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(gaussian_noise(&mut rng, 0.0), 0.0);
        assert_eq!(gaussian_noise(&mut rng, -1.0), 0.0);
    }

    #[test]
    fn same_seed_same_noise() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for _ in 0..16 {
            assert_eq!(gaussian_noise(&mut a, 0.5), gaussian_noise(&mut b, 0.5));
        }
    }
}
