//! Replay adapters that read one interpolated row per tick.
//!
//! Unlike the preloaded adapters, these query the store on every step: the
//! nearest rows around the pre-advance clock are fetched and interpolated
//! in one shot. The read blocks the tick; the simulator never overlaps
//! component reads.

use std::rc::Rc;

use serde_json::json;
use tracing::warn;

use crate::devices::types::{Battery, Component, Grid, Inverter, Load, PowerSource};
use crate::error::SimResult;
use crate::replay::channels;
use crate::replay::resampler::Reanchor;
use crate::replay::row::{RowAt, interpolate_row};
use crate::replay::store::MeasurementStore;
use crate::sim::clock::Clock;
use crate::sim::types::{
    BatteryCommand, BatteryMode, BatteryStep, GridDemand, GridStep, InverterObservation,
    InverterStep, LoadStep, PowerSourceStep,
};

fn row_at(store: &MeasurementStore, entity: i64, ts: f64) -> SimResult<RowAt> {
    interpolate_row(&store.rows_around(entity, ts)?, ts)
}

/// Battery telemetry replay with per-tick reads.
pub struct RowwiseBattery {
    clock: Clock,
    entity: i64,
    store: Rc<MeasurementStore>,
    nominal_voltage_v: f64,
}

impl RowwiseBattery {
    pub fn new(clock: Clock, entity: i64, nominal_voltage_v: f64, store: Rc<MeasurementStore>) -> Self {
        Self {
            clock,
            entity,
            store,
            nominal_voltage_v,
        }
    }
}

impl Component for RowwiseBattery {
    fn id(&self) -> String {
        format!("battery/replay-rowwise/{}", self.entity)
    }

    fn specification(&self) -> serde_json::Value {
        json!({
            "model": "replay-rowwise",
            "entity": self.entity,
            "nominal_voltage_v": self.nominal_voltage_v,
        })
    }
}

impl Battery for RowwiseBattery {
    fn step(
        &mut self,
        step_ticks: i64,
        _command: Option<&BatteryCommand>,
    ) -> SimResult<BatteryStep> {
        let next_clock = self.clock.advance(step_ticks);
        let hours = Clock::difference_hours(self.clock, next_clock)?;
        let ts = self.clock.to_seconds();
        self.clock = next_clock;

        let row = row_at(&self.store, self.entity, ts)?;
        let raw_voltage = row.number(channels::BATT_VOLTAGE)?;
        let current = row.number(channels::BATT_CURRENT)?;
        let soc_pct = row.number(channels::BATT_SOC)?;

        // Same dropout policy as the preloaded adapter: energy integrates
        // the raw sample, the reported bus voltage falls back to nominal.
        let discharge_energy_j = raw_voltage * current * hours * 3600.0;
        let voltage = if raw_voltage == 0.0 {
            warn!(entity = self.entity, ts, "0 V battery sample, using nominal voltage");
            self.nominal_voltage_v
        } else {
            raw_voltage
        };

        Ok(BatteryStep {
            voltage_v: voltage,
            current_a: current,
            soc: soc_pct / 100.0,
            discharge_capacity_c: discharge_energy_j / self.nominal_voltage_v,
            discharge_energy_j,
        })
    }
}

impl Reanchor for RowwiseBattery {
    fn reanchor(&self, clock: Clock) -> SimResult<Self> {
        Ok(Self::new(clock, self.entity, self.nominal_voltage_v, Rc::clone(&self.store)))
    }
}

/// PV generator telemetry replay with per-tick reads.
pub struct RowwisePowerSource {
    clock: Clock,
    entity: i64,
    store: Rc<MeasurementStore>,
}

impl RowwisePowerSource {
    pub fn new(clock: Clock, entity: i64, store: Rc<MeasurementStore>) -> Self {
        Self { clock, entity, store }
    }
}

impl Component for RowwisePowerSource {
    fn id(&self) -> String {
        format!("power-source/replay-rowwise/{}", self.entity)
    }

    fn specification(&self) -> serde_json::Value {
        json!({ "model": "replay-rowwise", "entity": self.entity })
    }
}

impl PowerSource for RowwisePowerSource {
    fn step(&mut self, step_ticks: i64) -> SimResult<PowerSourceStep> {
        let ts = self.clock.to_seconds();
        self.clock = self.clock.advance(step_ticks);

        let row = row_at(&self.store, self.entity, ts)?;
        Ok(PowerSourceStep {
            voltage_v: row.number(channels::PV_VOLTAGE)?,
            current_a: row.number(channels::PV_CURRENT)?,
            power_w: row.number(channels::PV_POWER)?,
        })
    }
}

impl Reanchor for RowwisePowerSource {
    fn reanchor(&self, clock: Clock) -> SimResult<Self> {
        Ok(Self::new(clock, self.entity, Rc::clone(&self.store)))
    }
}

/// AC load telemetry replay with per-tick reads.
pub struct RowwiseLoad {
    clock: Clock,
    entity: i64,
    store: Rc<MeasurementStore>,
}

impl RowwiseLoad {
    pub fn new(clock: Clock, entity: i64, store: Rc<MeasurementStore>) -> Self {
        Self { clock, entity, store }
    }
}

impl Component for RowwiseLoad {
    fn id(&self) -> String {
        format!("load/replay-rowwise/{}", self.entity)
    }

    fn specification(&self) -> serde_json::Value {
        json!({ "model": "replay-rowwise", "entity": self.entity })
    }
}

impl Load for RowwiseLoad {
    fn step(&mut self, step_ticks: i64) -> SimResult<LoadStep> {
        let ts = self.clock.to_seconds();
        self.clock = self.clock.advance(step_ticks);

        let row = row_at(&self.store, self.entity, ts)?;
        Ok(LoadStep {
            current_a: row.number(channels::OUT_CURRENT)?,
            voltage_v: row.number(channels::OUT_VOLTAGE)?,
            power_apparent_va: row.number(channels::OUT_APPARENT)?,
            power_active_w: row.number(channels::OUT_ACTIVE)?,
        })
    }
}

impl Reanchor for RowwiseLoad {
    fn reanchor(&self, clock: Clock) -> SimResult<Self> {
        Ok(Self::new(clock, self.entity, Rc::clone(&self.store)))
    }
}

/// Grid-line telemetry replay with per-tick reads.
pub struct RowwiseGrid {
    clock: Clock,
    entity: i64,
    store: Rc<MeasurementStore>,
}

impl RowwiseGrid {
    pub fn new(clock: Clock, entity: i64, store: Rc<MeasurementStore>) -> Self {
        Self { clock, entity, store }
    }
}

impl Component for RowwiseGrid {
    fn id(&self) -> String {
        format!("grid/replay-rowwise/{}", self.entity)
    }

    fn specification(&self) -> serde_json::Value {
        json!({ "model": "replay-rowwise", "entity": self.entity })
    }
}

impl Grid for RowwiseGrid {
    fn step(&mut self, step_ticks: i64, _demand: Option<&GridDemand>) -> SimResult<GridStep> {
        let ts = self.clock.to_seconds();
        self.clock = self.clock.advance(step_ticks);

        let row = row_at(&self.store, self.entity, ts)?;
        Ok(GridStep {
            power_delivered_apparent_va: row.number(channels::LINE_APPARENT)?,
            power_delivered_active_w: row.number(channels::LINE_ACTIVE)?,
            cost: 0.0,
            limit_violated: false,
        })
    }
}

impl Reanchor for RowwiseGrid {
    fn reanchor(&self, clock: Clock) -> SimResult<Self> {
        Ok(Self::new(clock, self.entity, Rc::clone(&self.store)))
    }
}

/// Inverter telemetry replay with per-tick reads.
pub struct RowwiseInverter {
    clock: Clock,
    entity: i64,
    store: Rc<MeasurementStore>,
}

impl RowwiseInverter {
    pub fn new(clock: Clock, entity: i64, store: Rc<MeasurementStore>) -> Self {
        Self { clock, entity, store }
    }
}

impl Component for RowwiseInverter {
    fn id(&self) -> String {
        format!("inverter/replay-rowwise/{}", self.entity)
    }

    fn specification(&self) -> serde_json::Value {
        json!({ "model": "replay-rowwise", "entity": self.entity })
    }
}

impl Inverter for RowwiseInverter {
    fn step(
        &mut self,
        step_ticks: i64,
        _observation: &InverterObservation,
    ) -> SimResult<InverterStep> {
        let ts = self.clock.to_seconds();
        self.clock = self.clock.advance(step_ticks);

        let row = row_at(&self.store, self.entity, ts)?;
        let batt_current = row.number(channels::BATT_CURRENT)?;
        let mode = if batt_current < 0.0 {
            BatteryMode::Charge
        } else if batt_current > 0.0 {
            BatteryMode::Discharge
        } else {
            BatteryMode::Idle
        };

        Ok(InverterStep {
            next_battery_command: BatteryCommand {
                mode,
                current_a: batt_current.abs(),
            },
            next_grid_demand: GridDemand {
                power_apparent_va: row.number(channels::LINE_APPARENT)?,
                power_active_w: row.number(channels::LINE_ACTIVE)?,
            },
            generator_power_drawn_w: row.number(channels::PV_POWER)?,
        })
    }
}

impl Reanchor for RowwiseInverter {
    fn reanchor(&self, clock: Clock) -> SimResult<Self> {
        Ok(Self::new(clock, self.entity, Rc::clone(&self.store)))
    }
}
