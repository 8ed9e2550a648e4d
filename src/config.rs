//! TOML-based scenario configuration.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::sim::clock::NANOS_PER_SECOND;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline analytic scenario. Load
/// from TOML with [`ScenarioConfig::from_toml_file`] or start from
/// [`ScenarioConfig::default`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Timing and global parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Analytic PV array parameters.
    #[serde(default)]
    pub solar: SolarConfig,
    /// Analytic household load parameters.
    #[serde(default)]
    pub house: HouseConfig,
    /// Battery parameters.
    #[serde(default)]
    pub battery: BatteryConfig,
    /// Grid tariff and limits.
    #[serde(default)]
    pub grid: GridConfig,
    /// Inverter dispatch parameters.
    #[serde(default)]
    pub inverter: InverterConfig,
    /// Telemetry replay parameters; `None` runs the analytic models.
    #[serde(default)]
    pub replay: Option<ReplayConfig>,
}

/// Timing and global parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Simulation start, `YYYY-MM-DD HH:MM:SS` UTC.
    pub start: String,
    /// Clock resolution in ticks per second.
    pub resolution: i64,
    /// Length of one tick in seconds.
    pub step_seconds: f64,
    /// Number of ticks to run.
    pub steps: usize,
    /// Master random seed.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start: "2024-06-01 00:00:00".to_string(),
            resolution: NANOS_PER_SECOND,
            step_seconds: 60.0,
            steps: 1_440,
            seed: 42,
        }
    }
}

/// Analytic PV array parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolarConfig {
    /// Peak output (W).
    pub peak_power_w: f64,
    /// Sunrise hour of day.
    pub sunrise_hour: f64,
    /// Sunset hour of day.
    pub sunset_hour: f64,
    /// Weather noise standard deviation as a fraction of output.
    pub noise_std: f64,
    /// DC bus voltage (V).
    pub bus_voltage_v: f64,
}

impl Default for SolarConfig {
    fn default() -> Self {
        Self {
            peak_power_w: 5_000.0,
            sunrise_hour: 6.0,
            sunset_hour: 18.0,
            noise_std: 0.05,
            bus_voltage_v: 400.0,
        }
    }
}

/// Analytic household load parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HouseConfig {
    /// Baseline demand (W).
    pub base_power_w: f64,
    /// Sinusoidal amplitude (W).
    pub amp_power_w: f64,
    /// Phase offset (radians).
    pub phase_rad: f64,
    /// Gaussian noise standard deviation (W).
    pub noise_std_w: f64,
    /// Power factor in (0, 1].
    pub power_factor: f64,
    /// Supply voltage (V).
    pub voltage_v: f64,
}

impl Default for HouseConfig {
    fn default() -> Self {
        Self {
            base_power_w: 800.0,
            amp_power_w: 400.0,
            phase_rad: 1.2,
            noise_std_w: 50.0,
            power_factor: 0.95,
            voltage_v: 230.0,
        }
    }
}

/// Battery parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Usable capacity (kWh).
    pub capacity_kwh: f64,
    /// Starting state of charge in [0, 1].
    pub initial_soc: f64,
    /// Nominal pack voltage (V).
    pub nominal_voltage_v: f64,
    /// Charge efficiency in (0, 1].
    pub charge_efficiency: f64,
    /// Discharge efficiency in (0, 1].
    pub discharge_efficiency: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        // A 51.2 V, 200 Ah pack.
        Self {
            capacity_kwh: 10.24,
            initial_soc: 1.0,
            nominal_voltage_v: 51.2,
            charge_efficiency: 1.0,
            discharge_efficiency: 1.0,
        }
    }
}

impl BatteryConfig {
    /// Capacity in joules.
    pub fn capacity_j(&self) -> f64 {
        self.capacity_kwh * 3_600_000.0
    }
}

/// Grid tariff and limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    /// Tariff as `[[epoch_seconds, price_per_kwh], ...]`, ascending.
    pub price_schedule: Vec<(f64, f64)>,
    /// Demand limit on active power (W); omit for unlimited.
    pub max_power_active_w: f64,
    /// Demand limit on apparent power (VA); omit for unlimited.
    pub max_power_apparent_va: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            price_schedule: vec![(0.0, 0.0)],
            max_power_active_w: f64::INFINITY,
            max_power_apparent_va: f64::INFINITY,
        }
    }
}

/// Inverter dispatch parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InverterConfig {
    /// PV to AC conversion efficiency in (0, 1].
    pub pv_to_ac_efficiency: f64,
    /// Battery to AC conversion efficiency in (0, 1].
    pub battery_to_ac_efficiency: f64,
    /// PV to battery conversion efficiency in (0, 1].
    pub pv_to_battery_efficiency: f64,
    /// SOC floor below which the battery is not discharged.
    pub min_soc: f64,
    /// SOC ceiling above which surplus PV is wasted.
    pub max_soc: f64,
    /// The inverter's own parasitic draw (W).
    pub own_load_w: f64,
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            pv_to_ac_efficiency: 1.0,
            battery_to_ac_efficiency: 1.0,
            pv_to_battery_efficiency: 1.0,
            min_soc: 0.0,
            max_soc: 1.0,
            own_load_w: 30.0,
        }
    }
}

/// Telemetry replay parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayConfig {
    /// Path to the telemetry SQLite database.
    pub database: String,
    /// Measurement table name.
    #[serde(default = "default_table")]
    pub table: String,
    /// Entity (inverter) identifier to replay.
    #[serde(default = "default_entity")]
    pub entity: i64,
    /// Draw random historical windows instead of replaying linearly.
    #[serde(default)]
    pub resample: bool,
    /// Resampling window length in hours.
    #[serde(default = "default_window_hours")]
    pub window_hours: f64,
}

fn default_table() -> String {
    "measurements".to_string()
}

fn default_entity() -> i64 {
    1
}

fn default_window_hours() -> f64 {
    crate::replay::DEFAULT_WINDOW_HOURS
}

/// A configuration validation failure: the offending field and why.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl ScenarioConfig {
    /// Loads a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is
    /// invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError {
            field: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses a scenario from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let push = |errors: &mut Vec<ConfigError>, field: &str, message: &str| {
            errors.push(ConfigError {
                field: field.to_string(),
                message: message.to_string(),
            });
        };

        let s = &self.simulation;
        if s.steps == 0 {
            push(&mut errors, "simulation.steps", "must be > 0");
        }
        if s.step_seconds <= 0.0 {
            push(&mut errors, "simulation.step_seconds", "must be > 0");
        }
        if s.resolution <= 0 {
            push(&mut errors, "simulation.resolution", "must be > 0");
        }
        if crate::sim::clock::Clock::from_calendar_str(&s.start, 1).is_err() {
            push(&mut errors, "simulation.start", "not a calendar timestamp");
        }

        let sol = &self.solar;
        if sol.sunrise_hour >= sol.sunset_hour || sol.sunset_hour > 24.0 {
            push(
                &mut errors,
                "solar.sunrise_hour",
                "daylight window must satisfy sunrise < sunset <= 24",
            );
        }
        if sol.bus_voltage_v <= 0.0 {
            push(&mut errors, "solar.bus_voltage_v", "must be > 0");
        }

        let h = &self.house;
        if h.power_factor <= 0.0 || h.power_factor > 1.0 {
            push(&mut errors, "house.power_factor", "must be in (0, 1]");
        }
        if h.voltage_v <= 0.0 {
            push(&mut errors, "house.voltage_v", "must be > 0");
        }

        let b = &self.battery;
        if b.capacity_kwh <= 0.0 {
            push(&mut errors, "battery.capacity_kwh", "must be > 0");
        }
        if !(0.0..=1.0).contains(&b.initial_soc) {
            push(&mut errors, "battery.initial_soc", "must be in [0.0, 1.0]");
        }
        for (field, eff) in [
            ("battery.charge_efficiency", b.charge_efficiency),
            ("battery.discharge_efficiency", b.discharge_efficiency),
            ("inverter.pv_to_ac_efficiency", self.inverter.pv_to_ac_efficiency),
            (
                "inverter.battery_to_ac_efficiency",
                self.inverter.battery_to_ac_efficiency,
            ),
            (
                "inverter.pv_to_battery_efficiency",
                self.inverter.pv_to_battery_efficiency,
            ),
        ] {
            if eff <= 0.0 || eff > 1.0 {
                push(&mut errors, field, "must be in (0.0, 1.0]");
            }
        }

        if !self
            .grid
            .price_schedule
            .windows(2)
            .all(|pair| pair[0].0 <= pair[1].0)
        {
            push(&mut errors, "grid.price_schedule", "must be ascending by time");
        }

        let inv = &self.inverter;
        if inv.min_soc >= inv.max_soc {
            push(&mut errors, "inverter.min_soc", "must be < inverter.max_soc");
        }

        if let Some(replay) = &self.replay {
            if replay.window_hours <= 0.0 {
                push(&mut errors, "replay.window_hours", "must be > 0");
            }
            if crate::replay::validate_identifier(&replay.table).is_err() {
                push(&mut errors, "replay.table", "not a safe identifier");
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scenario_is_valid() {
        let cfg = ScenarioConfig::default();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "default should be valid: {errors:?}");
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[simulation]
start = "2024-01-15 06:00:00"
step_seconds = 300.0
steps = 288
seed = 99

[battery]
capacity_kwh = 20.0
initial_soc = 0.5

[grid]
price_schedule = [[0.0, 0.12], [1705302000.0, 0.31]]

[inverter]
min_soc = 0.1
max_soc = 0.95
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.simulation.steps, 288);
        assert_eq!(cfg.battery.capacity_kwh, 20.0);
        assert_eq!(cfg.grid.price_schedule.len(), 2);
        assert!(cfg.replay.is_none());
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let toml = r#"
[simulation]
steps = 10
typo_field = 1
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn replay_section_defaults() {
        let toml = r#"
[replay]
database = "telemetry.db"
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).unwrap();
        let replay = cfg.replay.unwrap();
        assert_eq!(replay.table, "measurements");
        assert_eq!(replay.entity, 1);
        assert!(!replay.resample);
        assert_eq!(replay.window_hours, 6.0);
    }

    #[test]
    fn validation_flags_bad_fields() {
        let mut cfg = ScenarioConfig::default();
        cfg.simulation.steps = 0;
        cfg.battery.initial_soc = 1.5;
        cfg.inverter.min_soc = 0.9;
        cfg.inverter.max_soc = 0.2;
        cfg.grid.price_schedule = vec![(100.0, 0.2), (0.0, 0.1)];

        let errors = cfg.validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"simulation.steps"));
        assert!(fields.contains(&"battery.initial_soc"));
        assert!(fields.contains(&"inverter.min_soc"));
        assert!(fields.contains(&"grid.price_schedule"));
    }

    #[test]
    fn unsafe_replay_table_is_flagged() {
        let toml = r#"
[replay]
database = "telemetry.db"
table = "measurements; DROP TABLE measurements"
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).unwrap();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "replay.table"));
    }

    #[test]
    fn capacity_converts_to_joules() {
        let b = BatteryConfig::default();
        assert_eq!(b.capacity_j(), 10.24 * 3_600_000.0);
    }
}
