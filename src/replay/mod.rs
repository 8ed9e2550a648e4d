//! Time-series replay: historical telemetry driving the component contract.

/// Preloaded replay adapters for the five component roles.
pub mod components;
/// Replayed context annotations.
pub mod context;
/// Randomized block resampling.
pub mod resampler;
/// Whole-row interpolation.
pub mod row;
/// Per-tick row-interpolating replay adapters.
pub mod rowwise;
/// Immutable sample tables and point interpolation.
pub mod series;
/// SQLite-backed historical query layer.
pub mod store;

/// Measurement channel column names shared by both adapter variants.
pub mod channels {
    pub const BATT_VOLTAGE: &str = "batt_voltage";
    pub const BATT_CURRENT: &str = "batt_current";
    pub const BATT_SOC: &str = "batt_soc";
    pub const OUT_CURRENT: &str = "out_current";
    pub const OUT_VOLTAGE: &str = "out_voltage";
    pub const OUT_APPARENT: &str = "out_apparent";
    pub const OUT_ACTIVE: &str = "out_active";
    pub const LINE_APPARENT: &str = "line_apparent";
    pub const LINE_ACTIVE: &str = "line_active";
    pub const PV_VOLTAGE: &str = "pv_voltage";
    pub const PV_CURRENT: &str = "pv_current";
    pub const PV_POWER: &str = "pv_power";
}

pub use components::{ReplayBattery, ReplayGrid, ReplayInverter, ReplayLoad, ReplayPowerSource};
pub use context::ContextReplay;
pub use resampler::{BlockResampler, DEFAULT_WINDOW_HOURS, Reanchor};
pub use series::{Sample, Series};
pub use store::{MeasurementStore, validate_identifier};
