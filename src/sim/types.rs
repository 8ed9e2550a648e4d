//! Step records exchanged between components, context annotations, and the
//! aggregates the simulator accumulates over a run.
//!
//! All records are plain immutable values produced fresh each tick and
//! owned by the caller.

use std::fmt;

use super::clock::Clock;

/// Battery operating mode commanded for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryMode {
    Charge,
    Discharge,
    Idle,
}

/// Control command applied to a battery for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryCommand {
    pub mode: BatteryMode,
    /// Commanded current magnitude (A, non-negative).
    pub current_a: f64,
}

impl BatteryCommand {
    /// An idle command at zero current.
    pub fn idle() -> Self {
        Self {
            mode: BatteryMode::Idle,
            current_a: 0.0,
        }
    }
}

/// Battery measurements produced by one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryStep {
    pub voltage_v: f64,
    pub current_a: f64,
    /// State of charge in [0, 1].
    pub soc: f64,
    /// Charge moved out of the pack this step (C); negative while charging.
    pub discharge_capacity_c: f64,
    /// Energy moved out of the pack this step (J); negative while charging.
    pub discharge_energy_j: f64,
}

/// Generator-side measurements produced by one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerSourceStep {
    pub voltage_v: f64,
    pub current_a: f64,
    pub power_w: f64,
}

/// AC load measurements produced by one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadStep {
    pub current_a: f64,
    pub voltage_v: f64,
    pub power_apparent_va: f64,
    pub power_active_w: f64,
}

/// AC power requested from the grid for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridDemand {
    pub power_apparent_va: f64,
    pub power_active_w: f64,
}

impl GridDemand {
    /// Zero demand.
    pub fn none() -> Self {
        Self {
            power_apparent_va: 0.0,
            power_active_w: 0.0,
        }
    }
}

/// Grid delivery for one step.
///
/// The grid always satisfies demand; exceeding a configured limit raises
/// `limit_violated` instead of failing the step, since an overdraw is a
/// valid simulated outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridStep {
    pub power_delivered_apparent_va: f64,
    pub power_delivered_active_w: f64,
    /// Energy cost for this step in the tariff's money unit.
    pub cost: f64,
    pub limit_violated: bool,
}

/// What the dispatch policy sees: the current tick's component results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverterObservation {
    pub battery: BatteryStep,
    pub power_source: PowerSourceStep,
    pub load: LoadStep,
}

/// Inverter dispatch decision; the setpoints apply on the next tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverterStep {
    pub next_battery_command: BatteryCommand,
    pub next_grid_demand: GridDemand,
    /// DC power the inverter actually pulled from the generator (W).
    pub generator_power_drawn_w: f64,
}

/// Out-of-band annotation valid over `[valid_from, valid_to)`.
///
/// A record becomes visible strictly after `recorded_at` and only once its
/// validity start falls within the feed's lookahead horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextRecord {
    pub recorded_at: Clock,
    pub valid_from: Clock,
    pub valid_to: Clock,
    /// Origin tag, e.g. a weather service or operator log.
    pub source: String,
    /// Opaque structured payload.
    pub payload: serde_json::Value,
}

/// Per-tick energy deltas derived from one step's component results.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepAggregates {
    pub generated_energy_wh: f64,
    pub battery_charge_energy_wh: f64,
    pub battery_discharge_energy_wh: f64,
    pub load_energy_wh: f64,
    pub generator_energy_unused_wh: f64,
}

impl StepAggregates {
    /// Derives the deltas for one tick spanning `hours`.
    ///
    /// Charge and discharge energies are split from the battery's signed
    /// discharge energy, so exactly one of the two is nonzero per tick.
    pub fn from_step(
        power_source: &PowerSourceStep,
        battery: &BatteryStep,
        load: &LoadStep,
        inverter: &InverterStep,
        hours: f64,
    ) -> Self {
        Self {
            generated_energy_wh: power_source.power_w * hours,
            battery_charge_energy_wh: (-battery.discharge_energy_j / 3600.0).max(0.0),
            battery_discharge_energy_wh: (battery.discharge_energy_j / 3600.0).max(0.0),
            load_energy_wh: load.power_active_w * hours,
            generator_energy_unused_wh: (power_source.power_w - inverter.generator_power_drawn_w)
                * hours,
        }
    }
}

/// Running totals and extrema over a simulation run.
///
/// A pure fold: each tick's value is a function of the previous snapshot
/// and that tick's step results only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CumulativeAggregates {
    pub total_generated_energy_wh: f64,
    pub total_battery_charge_energy_wh: f64,
    pub total_battery_discharge_energy_wh: f64,
    pub total_load_energy_wh: f64,
    pub total_generator_energy_unused_wh: f64,
    pub max_grid_power_demand_active_w: f64,
    pub max_grid_power_demand_apparent_va: f64,
    pub max_battery_voltage_v: f64,
    pub max_battery_current_a: f64,
    pub max_load_voltage_v: f64,
    pub max_load_current_a: f64,
    pub max_generator_voltage_v: f64,
    pub max_generator_current_a: f64,
    pub max_battery_soc: f64,
    /// Starts at 1.0 so the first step establishes the true minimum.
    pub min_battery_soc: f64,
}

impl Default for CumulativeAggregates {
    fn default() -> Self {
        Self {
            total_generated_energy_wh: 0.0,
            total_battery_charge_energy_wh: 0.0,
            total_battery_discharge_energy_wh: 0.0,
            total_load_energy_wh: 0.0,
            total_generator_energy_unused_wh: 0.0,
            max_grid_power_demand_active_w: 0.0,
            max_grid_power_demand_apparent_va: 0.0,
            max_battery_voltage_v: 0.0,
            max_battery_current_a: 0.0,
            max_load_voltage_v: 0.0,
            max_load_current_a: 0.0,
            max_generator_voltage_v: 0.0,
            max_generator_current_a: 0.0,
            max_battery_soc: 0.0,
            min_battery_soc: 1.0,
        }
    }
}

impl CumulativeAggregates {
    /// Folds one tick into the running totals and extrema.
    ///
    /// `grid_demand` is the demand the inverter just issued for the next
    /// tick, so peak-demand tracking sees every setpoint ever requested.
    pub fn accumulate(
        &self,
        step: &StepAggregates,
        battery: &BatteryStep,
        power_source: &PowerSourceStep,
        load: &LoadStep,
        grid_demand: &GridDemand,
    ) -> Self {
        Self {
            total_generated_energy_wh: self.total_generated_energy_wh + step.generated_energy_wh,
            total_battery_charge_energy_wh: self.total_battery_charge_energy_wh
                + step.battery_charge_energy_wh,
            total_battery_discharge_energy_wh: self.total_battery_discharge_energy_wh
                + step.battery_discharge_energy_wh,
            total_load_energy_wh: self.total_load_energy_wh + step.load_energy_wh,
            total_generator_energy_unused_wh: self.total_generator_energy_unused_wh
                + step.generator_energy_unused_wh,
            max_grid_power_demand_active_w: self
                .max_grid_power_demand_active_w
                .max(grid_demand.power_active_w),
            max_grid_power_demand_apparent_va: self
                .max_grid_power_demand_apparent_va
                .max(grid_demand.power_apparent_va),
            max_battery_voltage_v: self.max_battery_voltage_v.max(battery.voltage_v),
            max_battery_current_a: self.max_battery_current_a.max(battery.current_a),
            max_load_voltage_v: self.max_load_voltage_v.max(load.voltage_v),
            max_load_current_a: self.max_load_current_a.max(load.current_a),
            max_generator_voltage_v: self.max_generator_voltage_v.max(power_source.voltage_v),
            max_generator_current_a: self.max_generator_current_a.max(power_source.current_a),
            max_battery_soc: self.max_battery_soc.max(battery.soc),
            min_battery_soc: self.min_battery_soc.min(battery.soc),
        }
    }
}

impl fmt::Display for CumulativeAggregates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Run summary ---")?;
        writeln!(
            f,
            "Generated energy:      {:.1} Wh ({:.1} Wh unused)",
            self.total_generated_energy_wh, self.total_generator_energy_unused_wh
        )?;
        writeln!(
            f,
            "Battery throughput:    {:.1} Wh charged / {:.1} Wh discharged",
            self.total_battery_charge_energy_wh, self.total_battery_discharge_energy_wh
        )?;
        writeln!(f, "Load energy:           {:.1} Wh", self.total_load_energy_wh)?;
        writeln!(
            f,
            "Peak grid demand:      {:.1} W / {:.1} VA",
            self.max_grid_power_demand_active_w, self.max_grid_power_demand_apparent_va
        )?;
        write!(
            f,
            "Battery SOC range:     {:.1}% to {:.1}%",
            self.min_battery_soc * 100.0,
            self.max_battery_soc * 100.0
        )
    }
}

/// Complete record of one simulator tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorStep {
    pub battery: BatteryStep,
    pub power_source: PowerSourceStep,
    pub load: LoadStep,
    pub grid: GridStep,
    pub inverter: InverterStep,
    pub step_aggregates: StepAggregates,
    pub cumulative_aggregates: CumulativeAggregates,
}
