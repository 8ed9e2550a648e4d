//! Discrete-time simulator for a hybrid PV / battery / grid power system.
//!
//! Components implement one stepped contract and advance in lockstep each
//! tick; the inverter's dispatch decision feeds the battery and grid one
//! tick later. Analytic models and replayed historical telemetry are
//! interchangeable behind the same traits.

pub mod config;
/// Analytic component models and the stepped-component contract.
pub mod devices;
pub mod error;
pub mod io;
/// Historical telemetry replay, rowwise reads, and block resampling.
pub mod replay;
pub mod sim;
