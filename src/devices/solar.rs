//! Analytic PV array model.

use rand::{SeedableRng, rngs::StdRng};
use serde_json::json;

use crate::devices::types::{Component, PowerSource, gaussian_noise};
use crate::error::SimResult;
use crate::sim::clock::Clock;
use crate::sim::types::PowerSourceStep;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// A PV array with a half-sine daylight profile and seeded weather noise.
///
/// Output rises from zero at sunrise to `peak_power_w` at solar noon and
/// back to zero at sunset, every simulated day, multiplied by
/// `1 + N(0, noise_std)` to mimic passing clouds. Reproducible by seed.
#[derive(Debug, Clone)]
pub struct SolarArray {
    clock: Clock,
    peak_power_w: f64,
    /// Sunrise as an hour of day, e.g. `6.5` for 06:30 UTC.
    sunrise_hour: f64,
    sunset_hour: f64,
    noise_std: f64,
    /// Constant DC bus voltage used to derive the current reading.
    bus_voltage_v: f64,
    rng: StdRng,
}

impl SolarArray {
    /// # Panics
    ///
    /// Panics if the daylight window is empty or leaves the 24 h day, or
    /// the bus voltage is not positive.
    pub fn new(
        clock: Clock,
        peak_power_w: f64,
        sunrise_hour: f64,
        sunset_hour: f64,
        noise_std: f64,
        bus_voltage_v: f64,
        seed: u64,
    ) -> Self {
        assert!(sunrise_hour < sunset_hour && sunset_hour <= 24.0);
        assert!(bus_voltage_v > 0.0);

        Self {
            clock,
            peak_power_w: peak_power_w.max(0.0),
            sunrise_hour,
            sunset_hour,
            noise_std: noise_std.max(0.0),
            bus_voltage_v,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Daylight fraction in [0, 1] at `ts` epoch seconds: a half sine over
    /// the daylight window, zero at night.
    fn daylight_frac(&self, ts: f64) -> f64 {
        let hour = ts.rem_euclid(SECONDS_PER_DAY) / 3_600.0;
        if hour < self.sunrise_hour || hour >= self.sunset_hour {
            return 0.0;
        }
        let position = (hour - self.sunrise_hour) / (self.sunset_hour - self.sunrise_hour);
        (std::f64::consts::PI * position).sin()
    }
}

impl Component for SolarArray {
    fn id(&self) -> String {
        "power-source/solar".to_string()
    }

    fn specification(&self) -> serde_json::Value {
        json!({
            "model": "solar",
            "peak_power_w": self.peak_power_w,
            "sunrise_hour": self.sunrise_hour,
            "sunset_hour": self.sunset_hour,
            "noise_std": self.noise_std,
            "bus_voltage_v": self.bus_voltage_v,
        })
    }
}

impl PowerSource for SolarArray {
    fn step(&mut self, step_ticks: i64) -> SimResult<PowerSourceStep> {
        let ts = self.clock.to_seconds();
        self.clock = self.clock.advance(step_ticks);

        let frac = self.daylight_frac(ts);
        if frac <= 0.0 {
            return Ok(PowerSourceStep {
                voltage_v: self.bus_voltage_v,
                current_a: 0.0,
                power_w: 0.0,
            });
        }

        let noise_mult = 1.0 + gaussian_noise(&mut self.rng, self.noise_std);
        let power_w = (self.peak_power_w * frac * noise_mult).max(0.0);

        Ok(PowerSourceStep {
            voltage_v: self.bus_voltage_v,
            current_a: power_w / self.bus_voltage_v,
            power_w,
        })
    }
}
