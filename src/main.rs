//! Simulator entry point: CLI wiring and config-driven engine construction.

use std::path::Path;
use std::process;
use std::rc::Rc;

use tracing::info;

use microgrid_sim::config::{ReplayConfig, ScenarioConfig};
use microgrid_sim::devices::types::{Battery, Grid, Inverter, Load, PowerSource};
use microgrid_sim::devices::{HouseLoad, LinearBattery, PricedGrid, PvFirstInverter, SolarArray};
use microgrid_sim::error::{SimError, SimResult};
use microgrid_sim::io::export::export_csv;
use microgrid_sim::replay::{
    BlockResampler, MeasurementStore, ReplayBattery, ReplayGrid, ReplayInverter, ReplayLoad,
    ReplayPowerSource,
};
use microgrid_sim::sim::clock::Clock;
use microgrid_sim::sim::engine::Simulator;

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    seed_override: Option<u64>,
    steps_override: Option<usize>,
    telemetry_out: Option<String>,
}

fn print_help() {
    eprintln!("microgrid-sim — hybrid PV/battery/grid system simulator");
    eprintln!();
    eprintln!("Usage: microgrid-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!("  --seed <u64>             Override random seed");
    eprintln!("  --steps <n>              Override tick count");
    eprintln!("  --telemetry-out <path>   Export step results to CSV");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("Without --scenario the baseline analytic scenario runs.");
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        seed_override: None,
        steps_override: None,
        telemetry_out: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => {
                i += 1;
                cli.scenario_path = args.get(i).cloned();
            }
            "--seed" => {
                i += 1;
                cli.seed_override = args.get(i).and_then(|v| v.parse().ok());
            }
            "--steps" => {
                i += 1;
                cli.steps_override = args.get(i).and_then(|v| v.parse().ok());
            }
            "--telemetry-out" => {
                i += 1;
                cli.telemetry_out = args.get(i).cloned();
            }
            other => {
                eprintln!("Unknown option: {other}");
                print_help();
                process::exit(2);
            }
        }
        i += 1;
    }
    cli
}

/// Runs the engine, exports telemetry if requested, prints the summary.
fn run_and_report<P, B, L, G, I>(
    mut sim: Simulator<P, B, L, G, I>,
    steps: usize,
    step_ticks: i64,
    start: Clock,
    telemetry_out: Option<&str>,
) -> SimResult<()>
where
    P: PowerSource,
    B: Battery,
    L: Load,
    G: Grid,
    I: Inverter,
{
    let results = sim.run(steps, step_ticks)?;

    if let Some(path) = telemetry_out {
        export_csv(&results, start, step_ticks, Path::new(path))?;
        info!(path, rows = results.len(), "telemetry exported");
    }

    let total_cost: f64 = results.iter().map(|r| r.grid.cost).sum();
    let violations = results.iter().filter(|r| r.grid.limit_violated).count();

    println!("{}", sim.cumulative());
    println!("Grid energy cost:      {total_cost:.2}");
    println!("Grid limit violations: {violations}");
    Ok(())
}

fn run_analytic(config: &ScenarioConfig, steps: usize, step_ticks: i64, cli: &CliArgs) -> SimResult<()> {
    let s = &config.simulation;
    let start = Clock::from_calendar_str(&s.start, s.resolution)?;
    let seed = cli.seed_override.unwrap_or(s.seed);

    let sol = &config.solar;
    let solar = SolarArray::new(
        start,
        sol.peak_power_w,
        sol.sunrise_hour,
        sol.sunset_hour,
        sol.noise_std,
        sol.bus_voltage_v,
        seed,
    );

    let b = &config.battery;
    let battery = LinearBattery::new(
        start,
        b.initial_soc,
        b.capacity_j(),
        b.nominal_voltage_v,
        b.charge_efficiency,
        b.discharge_efficiency,
    );

    let h = &config.house;
    let house = HouseLoad::new(
        start,
        h.base_power_w,
        h.amp_power_w,
        h.phase_rad,
        h.noise_std_w,
        h.power_factor,
        h.voltage_v,
        seed.wrapping_add(1),
    );

    let g = &config.grid;
    let grid = PricedGrid::new(
        start,
        g.price_schedule.clone(),
        g.max_power_apparent_va,
        g.max_power_active_w,
    );

    let inv = &config.inverter;
    let inverter = PvFirstInverter::new(
        start,
        inv.pv_to_ac_efficiency,
        inv.battery_to_ac_efficiency,
        inv.pv_to_battery_efficiency,
        inv.min_soc,
        inv.max_soc,
        inv.own_load_w,
    );

    let sim = Simulator::new(start, solar, battery, house, grid, inverter);
    run_and_report(sim, steps, step_ticks, start, cli.telemetry_out.as_deref())
}

fn run_replay(
    config: &ScenarioConfig,
    replay: &ReplayConfig,
    steps: usize,
    step_ticks: i64,
    cli: &CliArgs,
) -> SimResult<()> {
    let s = &config.simulation;
    let seed = cli.seed_override.unwrap_or(s.seed);

    let store = Rc::new(MeasurementStore::open(
        Path::new(&replay.database),
        &replay.table,
    )?);
    let entity = replay.entity;

    let (first_ts, last_ts) = store
        .time_bounds(entity)?
        .ok_or_else(|| SimError::NoData(format!("entity {entity}")))?;
    let trace_start = Clock::from_seconds(first_ts, s.resolution);
    let trace_end = Clock::from_seconds(last_ts, s.resolution);
    info!(entity, %trace_start, %trace_end, "replaying telemetry");

    let nominal_v = config.battery.nominal_voltage_v;
    let battery = ReplayBattery::new(trace_start, entity, nominal_v, Rc::clone(&store))?;
    let solar = ReplayPowerSource::new(trace_start, entity, Rc::clone(&store))?;
    let load = ReplayLoad::new(trace_start, entity, Rc::clone(&store))?;
    let grid = ReplayGrid::new(trace_start, entity, Rc::clone(&store))?;
    let inverter = ReplayInverter::new(trace_start, entity, Rc::clone(&store))?;

    if replay.resample {
        let window = replay.window_hours;
        // One seed for every role keeps all five components jumping to the
        // same window.
        let sim = Simulator::new(
            trace_start,
            BlockResampler::new(solar, trace_start, trace_end, window, seed)?,
            BlockResampler::new(battery, trace_start, trace_end, window, seed)?,
            BlockResampler::new(load, trace_start, trace_end, window, seed)?,
            BlockResampler::new(grid, trace_start, trace_end, window, seed)?,
            BlockResampler::new(inverter, trace_start, trace_end, window, seed)?,
        );
        run_and_report(sim, steps, step_ticks, trace_start, cli.telemetry_out.as_deref())
    } else {
        let sim = Simulator::new(trace_start, solar, battery, load, grid, inverter);
        run_and_report(sim, steps, step_ticks, trace_start, cli.telemetry_out.as_deref())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = parse_args();

    let config = match &cli.scenario_path {
        Some(path) => match ScenarioConfig::from_toml_file(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load scenario: {e}");
                process::exit(1);
            }
        },
        None => ScenarioConfig::default(),
    };

    let errors = config.validate();
    if !errors.is_empty() {
        eprintln!("Invalid scenario configuration:");
        for e in &errors {
            eprintln!("  {e}");
        }
        process::exit(1);
    }

    let steps = cli.steps_override.unwrap_or(config.simulation.steps);
    let step_ticks = (config.simulation.step_seconds * config.simulation.resolution as f64).round()
        as i64;

    let outcome = match &config.replay {
        Some(replay) => run_replay(&config, replay, steps, step_ticks, &cli),
        None => run_analytic(&config, steps, step_ticks, &cli),
    };

    if let Err(e) = outcome {
        eprintln!("Simulation failed: {e}");
        process::exit(1);
    }
}
