//! Input/output helpers.

/// CSV export for simulation step results.
pub mod export;
