//! Energy-integrator battery model.

use serde_json::json;

use crate::devices::types::{Battery, Component};
use crate::error::SimResult;
use crate::sim::clock::Clock;
use crate::sim::types::{BatteryCommand, BatteryMode, BatteryStep};

/// A battery modeled as a joule store behind a constant nominal voltage.
///
/// Charging and discharging integrate `V * I * t` through the configured
/// efficiencies, clamped so stored energy stays within `[0, capacity]`.
/// SOC therefore never leaves `[0, 1]`.
#[derive(Debug, Clone)]
pub struct LinearBattery {
    clock: Clock,
    energy_j: f64,
    capacity_j: f64,
    nominal_voltage_v: f64,
    charge_efficiency: f64,
    discharge_efficiency: f64,
}

impl LinearBattery {
    /// Creates a battery holding `initial_soc * capacity_j` joules.
    ///
    /// # Arguments
    ///
    /// * `clock` - Starting instant; the battery advances its own copy
    /// * `initial_soc` - Starting state of charge in [0, 1]
    /// * `capacity_j` - Usable capacity in joules (must be > 0)
    /// * `nominal_voltage_v` - Constant pack voltage
    /// * `charge_efficiency` - Fraction of input energy stored, in (0, 1]
    /// * `discharge_efficiency` - Fraction of drawn energy delivered, in (0, 1]
    ///
    /// # Panics
    ///
    /// Panics if capacity is non-positive, the initial SOC is outside
    /// [0, 1], or an efficiency is outside (0, 1].
    pub fn new(
        clock: Clock,
        initial_soc: f64,
        capacity_j: f64,
        nominal_voltage_v: f64,
        charge_efficiency: f64,
        discharge_efficiency: f64,
    ) -> Self {
        assert!(capacity_j > 0.0);
        assert!((0.0..=1.0).contains(&initial_soc));
        assert!(charge_efficiency > 0.0 && charge_efficiency <= 1.0);
        assert!(discharge_efficiency > 0.0 && discharge_efficiency <= 1.0);

        Self {
            clock,
            energy_j: initial_soc * capacity_j,
            capacity_j,
            nominal_voltage_v,
            charge_efficiency,
            discharge_efficiency,
        }
    }

    /// State of charge in [0, 1].
    pub fn soc(&self) -> f64 {
        self.energy_j / self.capacity_j
    }

    /// Energy currently stored (J).
    pub fn energy_j(&self) -> f64 {
        self.energy_j
    }
}

impl Component for LinearBattery {
    fn id(&self) -> String {
        "battery/linear".to_string()
    }

    fn specification(&self) -> serde_json::Value {
        json!({
            "model": "linear",
            "capacity_j": self.capacity_j,
            "nominal_voltage_v": self.nominal_voltage_v,
            "charge_efficiency": self.charge_efficiency,
            "discharge_efficiency": self.discharge_efficiency,
        })
    }
}

impl Battery for LinearBattery {
    fn step(
        &mut self,
        step_ticks: i64,
        command: Option<&BatteryCommand>,
    ) -> SimResult<BatteryStep> {
        let next_clock = self.clock.advance(step_ticks);
        let hours = Clock::difference_hours(self.clock, next_clock)?;
        self.clock = next_clock;

        let Some(command) = command else {
            return Ok(BatteryStep {
                voltage_v: self.nominal_voltage_v,
                current_a: 0.0,
                soc: self.soc(),
                discharge_capacity_c: 0.0,
                discharge_energy_j: 0.0,
            });
        };

        let discharge_energy_j = match command.mode {
            BatteryMode::Discharge => {
                let wanted = self.nominal_voltage_v * command.current_a * hours * 3600.0
                    / self.discharge_efficiency;
                // Never draw more than what is stored.
                wanted.min(self.energy_j)
            }
            // Idle carries zero current, so it folds into the charge arm.
            BatteryMode::Charge | BatteryMode::Idle => {
                let added = (self.nominal_voltage_v * command.current_a * hours * 3600.0
                    * self.charge_efficiency)
                    .min(self.capacity_j - self.energy_j);
                -added
            }
        };
        self.energy_j -= discharge_energy_j;

        Ok(BatteryStep {
            voltage_v: self.nominal_voltage_v,
            current_a: command.current_a,
            soc: self.soc(),
            discharge_capacity_c: discharge_energy_j / self.nominal_voltage_v,
            discharge_energy_j,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_TICKS: i64 = 3_600;

    fn clock() -> Clock {
        Clock::new(0, 1)
    }

    fn command(mode: BatteryMode, current_a: f64) -> BatteryCommand {
        BatteryCommand { mode, current_a }
    }

    #[test]
    fn no_command_is_an_idle_snapshot() {
        let mut battery = LinearBattery::new(clock(), 0.75, 36_000.0, 48.0, 1.0, 1.0);
        let step = battery.step(HOUR_TICKS, None).unwrap();
        assert_eq!(step.soc, 0.75);
        assert_eq!(step.current_a, 0.0);
        assert_eq!(step.discharge_energy_j, 0.0);
    }

    #[test]
    fn discharge_removes_exactly_v_i_t_at_unit_efficiency() {
        // 48 V * 5 A * 1 h = 864 kJ capacity leaves room to verify exactly.
        let capacity_j = 1_728_000.0;
        let mut battery = LinearBattery::new(clock(), 1.0, capacity_j, 48.0, 1.0, 1.0);

        let step = battery
            .step(HOUR_TICKS, Some(&command(BatteryMode::Discharge, 5.0)))
            .unwrap();

        let expected_j = 48.0 * 5.0 * 3_600.0;
        assert_eq!(step.discharge_energy_j, expected_j);
        assert_eq!(step.discharge_capacity_c, expected_j / 48.0);
        assert!((battery.energy_j() - (capacity_j - expected_j)).abs() < 1e-9);
    }

    #[test]
    fn discharge_clamps_at_empty() {
        let mut battery = LinearBattery::new(clock(), 0.01, 100_000.0, 48.0, 1.0, 1.0);
        let step = battery
            .step(HOUR_TICKS, Some(&command(BatteryMode::Discharge, 100.0)))
            .unwrap();
        // Requested far more than stored; only the stored joules move.
        assert_eq!(step.discharge_energy_j, 1_000.0);
        assert_eq!(step.soc, 0.0);
        assert!(battery.soc() >= 0.0);
    }

    #[test]
    fn charge_clamps_at_capacity() {
        let mut battery = LinearBattery::new(clock(), 0.99, 100_000.0, 48.0, 1.0, 1.0);
        let step = battery
            .step(HOUR_TICKS, Some(&command(BatteryMode::Charge, 100.0)))
            .unwrap();
        assert!((step.discharge_energy_j + 1_000.0).abs() < 1e-6);
        assert_eq!(step.soc, 1.0);
    }

    #[test]
    fn discharge_efficiency_inflates_draw() {
        // Delivering V*I*t at 50% efficiency drains twice that from storage.
        let mut battery = LinearBattery::new(clock(), 1.0, 10_000_000.0, 48.0, 1.0, 0.5);
        let step = battery
            .step(HOUR_TICKS, Some(&command(BatteryMode::Discharge, 5.0)))
            .unwrap();
        assert_eq!(step.discharge_energy_j, 48.0 * 5.0 * 3_600.0 / 0.5);
    }

    #[test]
    fn charge_efficiency_shrinks_stored_energy() {
        let mut battery = LinearBattery::new(clock(), 0.0, 10_000_000.0, 48.0, 0.9, 1.0);
        let step = battery
            .step(HOUR_TICKS, Some(&command(BatteryMode::Charge, 5.0)))
            .unwrap();
        assert_eq!(step.discharge_energy_j, -(48.0 * 5.0 * 3_600.0 * 0.9));
    }

    #[test]
    fn idle_command_moves_no_energy() {
        let mut battery = LinearBattery::new(clock(), 0.5, 100_000.0, 48.0, 1.0, 1.0);
        let step = battery.step(HOUR_TICKS, Some(&BatteryCommand::idle())).unwrap();
        assert_eq!(step.discharge_energy_j, 0.0);
        assert_eq!(step.soc, 0.5);
    }

    #[test]
    #[should_panic]
    fn zero_capacity_panics() {
        LinearBattery::new(clock(), 0.5, 0.0, 48.0, 1.0, 1.0);
    }

    #[test]
    #[should_panic]
    fn out_of_range_soc_panics() {
        LinearBattery::new(clock(), 1.1, 100.0, 48.0, 1.0, 1.0);
    }
}
