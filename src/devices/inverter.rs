//! PV-first dispatch policy.

use serde_json::json;

use crate::devices::types::{Component, Inverter};
use crate::error::SimResult;
use crate::sim::clock::Clock;
use crate::sim::types::{
    BatteryCommand, BatteryMode, GridDemand, InverterObservation, InverterStep,
};

/// Rule-based inverter that serves load from PV first, then battery, then
/// grid.
///
/// The decision is a four-way tree over the previous tick's observation,
/// with no hysteresis or lookahead:
///
/// 1. PV covers load, battery full: idle the battery, waste the surplus.
/// 2. PV covers load, battery has headroom: charge with the surplus.
/// 3. PV short, battery above its floor: discharge to cover the shortfall.
/// 4. PV short, battery at its floor: draw the shortfall from the grid.
#[derive(Debug, Clone)]
pub struct PvFirstInverter {
    clock: Clock,
    pv_to_ac_efficiency: f64,
    battery_to_ac_efficiency: f64,
    pv_to_battery_efficiency: f64,
    min_soc: f64,
    max_soc: f64,
    /// The inverter's own parasitic draw, always added to the load.
    own_load_w: f64,
}

impl PvFirstInverter {
    /// # Panics
    ///
    /// Panics if an efficiency is outside (0, 1] or `min_soc >= max_soc`.
    pub fn new(
        clock: Clock,
        pv_to_ac_efficiency: f64,
        battery_to_ac_efficiency: f64,
        pv_to_battery_efficiency: f64,
        min_soc: f64,
        max_soc: f64,
        own_load_w: f64,
    ) -> Self {
        for eff in [
            pv_to_ac_efficiency,
            battery_to_ac_efficiency,
            pv_to_battery_efficiency,
        ] {
            assert!(eff > 0.0 && eff <= 1.0);
        }
        assert!(min_soc < max_soc);

        Self {
            clock,
            pv_to_ac_efficiency,
            battery_to_ac_efficiency,
            pv_to_battery_efficiency,
            min_soc,
            max_soc,
            own_load_w,
        }
    }
}

impl Component for PvFirstInverter {
    fn id(&self) -> String {
        "inverter/pv-first".to_string()
    }

    fn specification(&self) -> serde_json::Value {
        json!({
            "model": "pv-first",
            "pv_to_ac_efficiency": self.pv_to_ac_efficiency,
            "battery_to_ac_efficiency": self.battery_to_ac_efficiency,
            "pv_to_battery_efficiency": self.pv_to_battery_efficiency,
            "min_soc": self.min_soc,
            "max_soc": self.max_soc,
            "own_load_w": self.own_load_w,
        })
    }
}

impl Inverter for PvFirstInverter {
    fn step(
        &mut self,
        step_ticks: i64,
        observation: &InverterObservation,
    ) -> SimResult<InverterStep> {
        self.clock = self.clock.advance(step_ticks);

        let pv_w = observation.power_source.power_w;
        let load_w = observation.load.power_active_w + self.own_load_w;
        let soc = observation.battery.soc;

        if pv_w * self.pv_to_ac_efficiency >= load_w {
            // PV covers the load; the remainder stays on the DC side.
            let pv_remaining_w = pv_w - load_w / self.pv_to_ac_efficiency;
            let zero_grid = GridDemand::none();

            if soc >= self.max_soc {
                return Ok(InverterStep {
                    next_battery_command: BatteryCommand::idle(),
                    next_grid_demand: zero_grid,
                    generator_power_drawn_w: load_w / self.pv_to_ac_efficiency,
                });
            }

            let battery_voltage_v = observation.battery.voltage_v;
            let charge_current_a =
                pv_remaining_w * self.pv_to_battery_efficiency / battery_voltage_v;
            return Ok(InverterStep {
                next_battery_command: BatteryCommand {
                    mode: BatteryMode::Charge,
                    current_a: charge_current_a,
                },
                next_grid_demand: zero_grid,
                generator_power_drawn_w: pv_w,
            });
        }

        let shortfall_w = load_w - pv_w * self.pv_to_ac_efficiency;

        if soc > self.min_soc {
            let battery_voltage_v = observation.battery.voltage_v;
            let discharge_current_a =
                shortfall_w / self.battery_to_ac_efficiency / battery_voltage_v;
            return Ok(InverterStep {
                next_battery_command: BatteryCommand {
                    mode: BatteryMode::Discharge,
                    current_a: discharge_current_a,
                },
                next_grid_demand: GridDemand::none(),
                generator_power_drawn_w: pv_w,
            });
        }

        Ok(InverterStep {
            next_battery_command: BatteryCommand::idle(),
            next_grid_demand: GridDemand {
                power_apparent_va: shortfall_w,
                power_active_w: shortfall_w,
            },
            generator_power_drawn_w: pv_w,
        })
    }
}
