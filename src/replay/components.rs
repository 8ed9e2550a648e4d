//! Replay adapters that preload their channels into immutable series.
//!
//! Each adapter loads everything it needs at construction, interpolates at
//! the pre-advance clock on every step, then advances its clock. The store
//! is only touched again when a block resampler reanchors the adapter.

use std::rc::Rc;

use serde_json::json;
use tracing::warn;

use crate::devices::types::{Battery, Component, Grid, Inverter, Load, PowerSource};
use crate::error::SimResult;
use crate::replay::channels;
use crate::replay::resampler::Reanchor;
use crate::replay::series::Series;
use crate::replay::store::MeasurementStore;
use crate::sim::clock::Clock;
use crate::sim::types::{
    BatteryCommand, BatteryMode, BatteryStep, GridDemand, GridStep, InverterObservation,
    InverterStep, LoadStep, PowerSourceStep,
};

/// Battery telemetry replay.
///
/// Replayed physics ignore the commanded setpoint; what the pack actually
/// did is already in the trace.
pub struct ReplayBattery {
    clock: Clock,
    entity: i64,
    store: Rc<MeasurementStore>,
    /// Used for coulomb counting and as the dropout fallback voltage.
    nominal_voltage_v: f64,
    voltage: Series,
    current: Series,
    soc: Series,
}

impl ReplayBattery {
    pub fn new(
        clock: Clock,
        entity: i64,
        nominal_voltage_v: f64,
        store: Rc<MeasurementStore>,
    ) -> SimResult<Self> {
        let at = clock.to_seconds();
        Ok(Self {
            voltage: store.channel_series(channels::BATT_VOLTAGE, entity, at)?,
            current: store.channel_series(channels::BATT_CURRENT, entity, at)?,
            soc: store.channel_series(channels::BATT_SOC, entity, at)?,
            clock,
            entity,
            store,
            nominal_voltage_v,
        })
    }
}

impl Component for ReplayBattery {
    fn id(&self) -> String {
        format!("battery/replay/{}", self.entity)
    }

    fn specification(&self) -> serde_json::Value {
        json!({
            "model": "replay",
            "entity": self.entity,
            "nominal_voltage_v": self.nominal_voltage_v,
            "samples": self.voltage.len(),
        })
    }
}

impl Battery for ReplayBattery {
    fn step(
        &mut self,
        step_ticks: i64,
        _command: Option<&BatteryCommand>,
    ) -> SimResult<BatteryStep> {
        let next_clock = self.clock.advance(step_ticks);
        let hours = Clock::difference_hours(self.clock, next_clock)?;
        let ts = self.clock.to_seconds();
        self.clock = next_clock;

        let raw_voltage = self.voltage.value_at(ts)?;
        let current = self.current.value_at(ts)?;
        let soc_pct = self.soc.value_at(ts)?;

        // Energy integrates the raw sample; a dropout contributes nothing.
        let discharge_energy_j = raw_voltage * current * hours * 3600.0;

        // A 0 V pack reading is a dropped sample, not a measurement.
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

impl Reanchor for ReplayBattery {
    fn reanchor(&self, clock: Clock) -> SimResult<Self> {
        Self::new(clock, self.entity, self.nominal_voltage_v, Rc::clone(&self.store))
    }
}

/// PV generator telemetry replay.
pub struct ReplayPowerSource {
    clock: Clock,
    entity: i64,
    store: Rc<MeasurementStore>,
    voltage: Series,
    current: Series,
    power: Series,
}

impl ReplayPowerSource {
    pub fn new(clock: Clock, entity: i64, store: Rc<MeasurementStore>) -> SimResult<Self> {
        let at = clock.to_seconds();
        Ok(Self {
            voltage: store.channel_series(channels::PV_VOLTAGE, entity, at)?,
            current: store.channel_series(channels::PV_CURRENT, entity, at)?,
            power: store.channel_series(channels::PV_POWER, entity, at)?,
            clock,
            entity,
            store,
        })
    }
}

impl Component for ReplayPowerSource {
    fn id(&self) -> String {
        format!("power-source/replay/{}", self.entity)
    }

    fn specification(&self) -> serde_json::Value {
        json!({ "model": "replay", "entity": self.entity, "samples": self.power.len() })
    }
}

impl PowerSource for ReplayPowerSource {
    fn step(&mut self, step_ticks: i64) -> SimResult<PowerSourceStep> {
        let ts = self.clock.to_seconds();
        self.clock = self.clock.advance(step_ticks);
        Ok(PowerSourceStep {
            voltage_v: self.voltage.value_at(ts)?,
            current_a: self.current.value_at(ts)?,
            power_w: self.power.value_at(ts)?,
        })
    }
}

impl Reanchor for ReplayPowerSource {
    fn reanchor(&self, clock: Clock) -> SimResult<Self> {
        Self::new(clock, self.entity, Rc::clone(&self.store))
    }
}

/// AC load telemetry replay.
pub struct ReplayLoad {
    clock: Clock,
    entity: i64,
    store: Rc<MeasurementStore>,
    current: Series,
    voltage: Series,
    apparent: Series,
    active: Series,
}

impl ReplayLoad {
    pub fn new(clock: Clock, entity: i64, store: Rc<MeasurementStore>) -> SimResult<Self> {
        let at = clock.to_seconds();
        Ok(Self {
            current: store.channel_series(channels::OUT_CURRENT, entity, at)?,
            voltage: store.channel_series(channels::OUT_VOLTAGE, entity, at)?,
            apparent: store.channel_series(channels::OUT_APPARENT, entity, at)?,
            active: store.channel_series(channels::OUT_ACTIVE, entity, at)?,
            clock,
            entity,
            store,
        })
    }
}

impl Component for ReplayLoad {
    fn id(&self) -> String {
        format!("load/replay/{}", self.entity)
    }

    fn specification(&self) -> serde_json::Value {
        json!({ "model": "replay", "entity": self.entity, "samples": self.active.len() })
    }
}

impl Load for ReplayLoad {
    fn step(&mut self, step_ticks: i64) -> SimResult<LoadStep> {
        let ts = self.clock.to_seconds();
        self.clock = self.clock.advance(step_ticks);
        Ok(LoadStep {
            current_a: self.current.value_at(ts)?,
            voltage_v: self.voltage.value_at(ts)?,
            power_apparent_va: self.apparent.value_at(ts)?,
            power_active_w: self.active.value_at(ts)?,
        })
    }
}

impl Reanchor for ReplayLoad {
    fn reanchor(&self, clock: Clock) -> SimResult<Self> {
        Self::new(clock, self.entity, Rc::clone(&self.store))
    }
}

/// Grid-line telemetry replay. Delivery is whatever the line carried;
/// there is no tariff in the trace, so cost stays zero.
pub struct ReplayGrid {
    clock: Clock,
    entity: i64,
    store: Rc<MeasurementStore>,
    apparent: Series,
    active: Series,
}

impl ReplayGrid {
    pub fn new(clock: Clock, entity: i64, store: Rc<MeasurementStore>) -> SimResult<Self> {
        let at = clock.to_seconds();
        Ok(Self {
            apparent: store.channel_series(channels::LINE_APPARENT, entity, at)?,
            active: store.channel_series(channels::LINE_ACTIVE, entity, at)?,
            clock,
            entity,
            store,
        })
    }
}

impl Component for ReplayGrid {
    fn id(&self) -> String {
        format!("grid/replay/{}", self.entity)
    }

    fn specification(&self) -> serde_json::Value {
        json!({ "model": "replay", "entity": self.entity, "samples": self.active.len() })
    }
}

impl Grid for ReplayGrid {
    fn step(&mut self, step_ticks: i64, _demand: Option<&GridDemand>) -> SimResult<GridStep> {
        let ts = self.clock.to_seconds();
        self.clock = self.clock.advance(step_ticks);
        Ok(GridStep {
            power_delivered_apparent_va: self.apparent.value_at(ts)?,
            power_delivered_active_w: self.active.value_at(ts)?,
            cost: 0.0,
            limit_violated: false,
        })
    }
}

impl Reanchor for ReplayGrid {
    fn reanchor(&self, clock: Clock) -> SimResult<Self> {
        Self::new(clock, self.entity, Rc::clone(&self.store))
    }
}

/// Inverter telemetry replay.
///
/// The trace has no explicit dispatch decisions, only outcomes; battery
/// current is reclassified by sign (negative means the pack was charging)
/// into next-tick commands.
pub struct ReplayInverter {
    clock: Clock,
    entity: i64,
    store: Rc<MeasurementStore>,
    batt_current: Series,
    line_apparent: Series,
    line_active: Series,
    pv_power: Series,
}

impl ReplayInverter {
    pub fn new(clock: Clock, entity: i64, store: Rc<MeasurementStore>) -> SimResult<Self> {
        let at = clock.to_seconds();
        Ok(Self {
            batt_current: store.channel_series(channels::BATT_CURRENT, entity, at)?,
            line_apparent: store.channel_series(channels::LINE_APPARENT, entity, at)?,
            line_active: store.channel_series(channels::LINE_ACTIVE, entity, at)?,
            pv_power: store.channel_series(channels::PV_POWER, entity, at)?,
            clock,
            entity,
            store,
        })
    }
}

impl Component for ReplayInverter {
    fn id(&self) -> String {
        format!("inverter/replay/{}", self.entity)
    }

    fn specification(&self) -> serde_json::Value {
        json!({ "model": "replay", "entity": self.entity, "samples": self.pv_power.len() })
    }
}

impl Inverter for ReplayInverter {
    fn step(
        &mut self,
        step_ticks: i64,
        _observation: &InverterObservation,
    ) -> SimResult<InverterStep> {
        let ts = self.clock.to_seconds();
        self.clock = self.clock.advance(step_ticks);

        let batt_current = self.batt_current.value_at(ts)?;
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
                power_apparent_va: self.line_apparent.value_at(ts)?,
                power_active_w: self.line_active.value_at(ts)?,
            },
            generator_power_drawn_w: self.pv_power.value_at(ts)?,
        })
    }
}

impl Reanchor for ReplayInverter {
    fn reanchor(&self, clock: Clock) -> SimResult<Self> {
        Self::new(clock, self.entity, Rc::clone(&self.store))
    }
}
