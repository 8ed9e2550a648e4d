//! Simulation engine threading dispatch setpoints between components.

use crate::devices::types::{Battery, Grid, Inverter, Load, PowerSource};
use crate::error::SimResult;

use super::clock::Clock;
use super::types::{
    BatteryCommand, ContextRecord, CumulativeAggregates, GridDemand, InverterObservation,
    SimulatorStep, StepAggregates,
};

/// Orchestrates one hybrid system: generator, battery, load, grid, and
/// inverter advanced in lockstep.
///
/// Generic over the five role traits for static dispatch; analytic,
/// replay-backed, and block-resampled implementations compose freely. The
/// engine owns the master clock and the two pending-setpoint slots: the
/// inverter's decision from tick N is applied to the battery and grid at
/// tick N+1, a one-tick control delay by design. Tick 0 applies no
/// setpoints.
///
/// Components own their internal clocks; the engine only ever calls their
/// `step`. Every component must be constructed on the same clock the
/// engine starts from.
pub struct Simulator<P, B, L, G, I>
where
    P: PowerSource,
    B: Battery,
    L: Load,
    G: Grid,
    I: Inverter,
{
    power_source: P,
    battery: B,
    load: L,
    grid: G,
    inverter: I,
    clock: Clock,
    pending_battery_command: Option<BatteryCommand>,
    pending_grid_demand: Option<GridDemand>,
    last_cumulative: CumulativeAggregates,
}

impl<P, B, L, G, I> Simulator<P, B, L, G, I>
where
    P: PowerSource,
    B: Battery,
    L: Load,
    G: Grid,
    I: Inverter,
{
    pub fn new(clock: Clock, power_source: P, battery: B, load: L, grid: G, inverter: I) -> Self {
        Self {
            power_source,
            battery,
            load,
            grid,
            inverter,
            clock,
            pending_battery_command: None,
            pending_grid_demand: None,
            last_cumulative: CumulativeAggregates::default(),
        }
    }

    /// The engine's current clock.
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Running aggregates as of the last completed tick.
    pub fn cumulative(&self) -> &CumulativeAggregates {
        &self.last_cumulative
    }

    /// Delivers context records to every component's context hook.
    pub fn broadcast_context(&mut self, records: &[ContextRecord]) {
        self.battery.context(records);
        self.power_source.context(records);
        self.load.context(records);
        self.grid.context(records);
        self.inverter.context(records);
    }

    /// Advances the whole system by one tick of `step_ticks`.
    ///
    /// Components step in a fixed order: battery, generator, load, grid,
    /// then the inverter over the four fresh results. A failing component
    /// aborts the tick and leaves the pending setpoints untouched; there
    /// is no retry.
    pub fn step(&mut self, step_ticks: i64) -> SimResult<SimulatorStep> {
        // 1. Physics under last tick's setpoints.
        let battery_step = self
            .battery
            .step(step_ticks, self.pending_battery_command.as_ref())?;
        let power_source_step = self.power_source.step(step_ticks)?;
        let load_step = self.load.step(step_ticks)?;
        let grid_step = self.grid.step(step_ticks, self.pending_grid_demand.as_ref())?;

        // 2. Dispatch; the decision applies on the next tick.
        let observation = InverterObservation {
            battery: battery_step,
            power_source: power_source_step,
            load: load_step,
        };
        let inverter_step = self.inverter.step(step_ticks, &observation)?;
        self.pending_battery_command = Some(inverter_step.next_battery_command);
        self.pending_grid_demand = Some(inverter_step.next_grid_demand);

        // 3. Aggregates.
        let next_clock = self.clock.advance(step_ticks);
        let hours = Clock::difference_hours(self.clock, next_clock)?;
        let step_aggregates = StepAggregates::from_step(
            &power_source_step,
            &battery_step,
            &load_step,
            &inverter_step,
            hours,
        );
        let cumulative_aggregates = self.last_cumulative.accumulate(
            &step_aggregates,
            &battery_step,
            &power_source_step,
            &load_step,
            &inverter_step.next_grid_demand,
        );
        self.last_cumulative = cumulative_aggregates;
        self.clock = next_clock;

        Ok(SimulatorStep {
            battery: battery_step,
            power_source: power_source_step,
            load: load_step,
            grid: grid_step,
            inverter: inverter_step,
            step_aggregates,
            cumulative_aggregates,
        })
    }

    /// Runs `count` ticks of `step_ticks` each, stopping at the first
    /// error.
    pub fn run(&mut self, count: usize, step_ticks: i64) -> SimResult<Vec<SimulatorStep>> {
        let mut results = Vec::with_capacity(count);
        for _ in 0..count {
            results.push(self.step(step_ticks)?);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::types::Component;
    use crate::sim::types::{
        BatteryCommand, BatteryMode, BatteryStep, GridDemand, GridStep, InverterStep, LoadStep,
        PowerSourceStep,
    };
    use serde_json::json;

    /// Battery stub that records every command it receives.
    struct RecordingBattery {
        received: Vec<Option<BatteryCommand>>,
    }

    impl Component for RecordingBattery {
        fn id(&self) -> String {
            "battery/stub".to_string()
        }
        fn specification(&self) -> serde_json::Value {
            json!({})
        }
    }

    impl Battery for RecordingBattery {
        fn step(
            &mut self,
            _step_ticks: i64,
            command: Option<&BatteryCommand>,
        ) -> SimResult<BatteryStep> {
            self.received.push(command.copied());
            Ok(BatteryStep {
                voltage_v: 50.0,
                current_a: command.map_or(0.0, |c| c.current_a),
                soc: 0.5,
                discharge_capacity_c: 0.0,
                discharge_energy_j: 0.0,
            })
        }
    }

    struct ConstSource(f64);

    impl Component for ConstSource {
        fn id(&self) -> String {
            "power-source/stub".to_string()
        }
        fn specification(&self) -> serde_json::Value {
            json!({})
        }
    }

    impl PowerSource for ConstSource {
        fn step(&mut self, _step_ticks: i64) -> SimResult<PowerSourceStep> {
            Ok(PowerSourceStep {
                voltage_v: 400.0,
                current_a: self.0 / 400.0,
                power_w: self.0,
            })
        }
    }

    struct ConstLoad(f64);

    impl Component for ConstLoad {
        fn id(&self) -> String {
            "load/stub".to_string()
        }
        fn specification(&self) -> serde_json::Value {
            json!({})
        }
    }

    impl Load for ConstLoad {
        fn step(&mut self, _step_ticks: i64) -> SimResult<LoadStep> {
            Ok(LoadStep {
                current_a: self.0 / 230.0,
                voltage_v: 230.0,
                power_apparent_va: self.0,
                power_active_w: self.0,
            })
        }
    }

    /// Grid stub that records every demand it receives.
    struct RecordingGrid {
        received: Vec<Option<GridDemand>>,
    }

    impl Component for RecordingGrid {
        fn id(&self) -> String {
            "grid/stub".to_string()
        }
        fn specification(&self) -> serde_json::Value {
            json!({})
        }
    }

    impl Grid for RecordingGrid {
        fn step(&mut self, _step_ticks: i64, demand: Option<&GridDemand>) -> SimResult<GridStep> {
            self.received.push(demand.copied());
            Ok(GridStep {
                power_delivered_apparent_va: demand.map_or(0.0, |d| d.power_apparent_va),
                power_delivered_active_w: demand.map_or(0.0, |d| d.power_active_w),
                cost: 0.0,
                limit_violated: false,
            })
        }
    }

    /// Inverter stub issuing a distinct setpoint per tick.
    struct CountingInverter {
        tick: i64,
    }

    impl Component for CountingInverter {
        fn id(&self) -> String {
            "inverter/stub".to_string()
        }
        fn specification(&self) -> serde_json::Value {
            json!({})
        }
    }

    impl Inverter for CountingInverter {
        fn step(
            &mut self,
            _step_ticks: i64,
            observation: &InverterObservation,
        ) -> SimResult<InverterStep> {
            self.tick += 1;
            Ok(InverterStep {
                next_battery_command: BatteryCommand {
                    mode: BatteryMode::Discharge,
                    current_a: self.tick as f64,
                },
                next_grid_demand: GridDemand {
                    power_apparent_va: 10.0 * self.tick as f64,
                    power_active_w: 10.0 * self.tick as f64,
                },
                generator_power_drawn_w: observation.power_source.power_w,
            })
        }
    }

    fn simulator() -> Simulator<ConstSource, RecordingBattery, ConstLoad, RecordingGrid, CountingInverter>
    {
        Simulator::new(
            Clock::new(0, 1),
            ConstSource(1_000.0),
            RecordingBattery { received: vec![] },
            ConstLoad(400.0),
            RecordingGrid { received: vec![] },
            CountingInverter { tick: 0 },
        )
    }

    const HOUR_TICKS: i64 = 3_600;

    #[test]
    fn tick_zero_applies_no_setpoints() {
        let mut sim = simulator();
        sim.step(HOUR_TICKS).unwrap();
        assert_eq!(sim.battery.received, vec![None]);
        assert_eq!(sim.grid.received, vec![None]);
    }

    #[test]
    fn setpoints_arrive_one_tick_late() {
        let mut sim = simulator();
        let first = sim.step(HOUR_TICKS).unwrap();
        sim.step(HOUR_TICKS).unwrap();
        sim.step(HOUR_TICKS).unwrap();

        // The command applied at tick N is the inverter output of tick N-1.
        assert_eq!(sim.battery.received[1], Some(first.inverter.next_battery_command));
        assert_eq!(sim.battery.received[2].unwrap().current_a, 2.0);
        assert_eq!(sim.grid.received[1], Some(first.inverter.next_grid_demand));
        assert_eq!(sim.grid.received[2].unwrap().power_active_w, 20.0);
    }

    #[test]
    fn cumulative_equals_the_sum_of_step_aggregates() {
        let mut sim = simulator();
        let results = sim.run(24, HOUR_TICKS).unwrap();

        let summed: f64 = results.iter().map(|r| r.step_aggregates.generated_energy_wh).sum();
        let last = &results.last().unwrap().cumulative_aggregates;
        assert_eq!(last.total_generated_energy_wh, summed);

        let load_summed: f64 = results.iter().map(|r| r.step_aggregates.load_energy_wh).sum();
        assert_eq!(last.total_load_energy_wh, load_summed);
    }

    #[test]
    fn peak_demand_tracks_the_freshly_issued_setpoint() {
        let mut sim = simulator();
        let results = sim.run(3, HOUR_TICKS).unwrap();
        // Demands issued: 10, 20, 30; the max sees the newest one.
        assert_eq!(
            results[2].cumulative_aggregates.max_grid_power_demand_active_w,
            30.0
        );
    }

    #[test]
    fn engine_clock_advances_per_tick() {
        let mut sim = simulator();
        sim.run(5, HOUR_TICKS).unwrap();
        assert_eq!(sim.clock(), Clock::new(5 * HOUR_TICKS, 1));
    }

    #[test]
    fn unused_generator_energy_is_the_undrawn_share() {
        let mut sim = simulator();
        let first = sim.step(HOUR_TICKS).unwrap();
        // The stub inverter draws the full PV output.
        assert_eq!(first.step_aggregates.generator_energy_unused_wh, 0.0);
        assert_eq!(first.step_aggregates.generated_energy_wh, 1_000.0);
    }
}
