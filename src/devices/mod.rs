//! Analytic component models and the stepped-component contract.

/// Energy-integrator battery model.
pub mod battery;
/// Time-of-use priced grid connection.
pub mod grid;
/// Sinusoidal household load.
pub mod house;
/// PV-first dispatch policy.
pub mod inverter;
/// PV array with a half-sine daylight profile.
pub mod solar;
pub mod types;

// Re-export the main types for convenience
pub use battery::LinearBattery;
pub use grid::PricedGrid;
pub use house::HouseLoad;
pub use inverter::PvFirstInverter;
pub use solar::SolarArray;
pub use types::{Battery, Component, ContextFeed, Grid, Inverter, Load, PowerSource};
