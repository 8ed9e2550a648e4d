//! Analytic household load model.

use rand::{SeedableRng, rngs::StdRng};
use serde_json::json;

use crate::devices::types::{Component, Load, gaussian_noise};
use crate::error::SimResult;
use crate::sim::clock::Clock;
use crate::sim::types::LoadStep;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// A household AC load: sinusoidal daily demand plus seeded noise.
///
/// Active power is `base + amp * sin(2*pi*day_pos + phase) + N(0, noise)`,
/// floored at zero. Apparent power follows from the configured power
/// factor, current from the supply voltage.
#[derive(Debug, Clone)]
pub struct HouseLoad {
    clock: Clock,
    base_power_w: f64,
    amp_power_w: f64,
    phase_rad: f64,
    noise_std_w: f64,
    power_factor: f64,
    voltage_v: f64,
    rng: StdRng,
}

impl HouseLoad {
    /// # Panics
    ///
    /// Panics if the power factor is outside (0, 1] or the supply voltage
    /// is not positive.
    pub fn new(
        clock: Clock,
        base_power_w: f64,
        amp_power_w: f64,
        phase_rad: f64,
        noise_std_w: f64,
        power_factor: f64,
        voltage_v: f64,
        seed: u64,
    ) -> Self {
        assert!(power_factor > 0.0 && power_factor <= 1.0);
        assert!(voltage_v > 0.0);

        Self {
            clock,
            base_power_w,
            amp_power_w,
            phase_rad,
            noise_std_w: noise_std_w.max(0.0),
            power_factor,
            voltage_v,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Component for HouseLoad {
    fn id(&self) -> String {
        "load/house".to_string()
    }

    fn specification(&self) -> serde_json::Value {
        json!({
            "model": "house",
            "base_power_w": self.base_power_w,
            "amp_power_w": self.amp_power_w,
            "phase_rad": self.phase_rad,
            "noise_std_w": self.noise_std_w,
            "power_factor": self.power_factor,
            "voltage_v": self.voltage_v,
        })
    }
}

impl Load for HouseLoad {
    fn step(&mut self, step_ticks: i64) -> SimResult<LoadStep> {
        let ts = self.clock.to_seconds();
        self.clock = self.clock.advance(step_ticks);

        let day_pos = ts.rem_euclid(SECONDS_PER_DAY) / SECONDS_PER_DAY;
        let angle = 2.0 * std::f64::consts::PI * day_pos + self.phase_rad;
        let noise = gaussian_noise(&mut self.rng, self.noise_std_w);

        let active_w = (self.base_power_w + self.amp_power_w * angle.sin() + noise).max(0.0);
        let apparent_va = active_w / self.power_factor;

        Ok(LoadStep {
            current_a: apparent_va / self.voltage_v,
            voltage_v: self.voltage_v,
            power_apparent_va: apparent_va,
            power_active_w: active_w,
        })
    }
}
