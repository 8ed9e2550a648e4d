//! Crate-wide error taxonomy and the [`SimResult`] alias.
//!
//! The taxonomy follows the specification's three groups (§7):
//!
//! 1. *Configuration errors* — mismatched clock resolutions in time
//!    arithmetic ([`SimError::ResolutionMismatch`]) and unsafe identifiers
//!    passed to the query layer ([`SimError::UnsafeIdentifier`]). Fail fast
//!    and non-recoverable.
//! 2. *Data errors* — empty sample sets ([`SimError::NoData`]), queries past
//!    the last available sample ([`SimError::PastEndOfData`]), missing or
//!    non-numeric columns ([`SimError::BadColumn`]), and traces too short to
//!    yield a resampling window ([`SimError::TraceTooShort`]). Fail the
//!    offending `step` call; the core never silently substitutes defaults.
//! 3. Errors surfaced from the ambient stack — calendar parsing
//!    ([`SimError::Timestamp`]), the relational store
//!    ([`SimError::Database`]), and CSV/file I/O ([`SimError::Io`]).
//!
//! Domain-invariant violations (e.g. a grid limit exceeded) are *not* errors;
//! they are reported as boolean flags in the relevant step record.

use thiserror::Error;

/// The crate's unified error type.
#[derive(Debug, Error)]
pub enum SimError {
    /// Time arithmetic was attempted across clocks of differing resolutions.
    #[error("clock resolution mismatch: {left} vs {right} ticks/s")]
    ResolutionMismatch {
        /// Resolution of the left-hand clock, in ticks per second.
        left: i64,
        /// Resolution of the right-hand clock, in ticks per second.
        right: i64,
    },

    /// An identifier failed validation before being interpolated into SQL.
    #[error("unsafe identifier: {0}")]
    UnsafeIdentifier(String),

    /// The requested series or row set held no samples.
    #[error("no data: {0}")]
    NoData(String),

    /// The query timestamp lies past the last available sample; replay does
    /// not extrapolate forward.
    #[error("query time {ts} past end of data (last sample at {last})")]
    PastEndOfData {
        /// The queried timestamp.
        ts: f64,
        /// The timestamp of the last available sample.
        last: f64,
    },

    /// A column was absent or held a non-numeric value where a number was
    /// required.
    #[error("bad column: {0}")]
    BadColumn(String),

    /// The trace does not contain a single complete resampling window.
    #[error("trace too short for a {window_hours}h window")]
    TraceTooShort {
        /// The configured window duration, in hours.
        window_hours: f64,
    },

    /// A calendar string could not be parsed into a timestamp.
    #[error("timestamp parse error: {0}")]
    Timestamp(#[from] chrono::format::ParseError),

    /// An error surfaced from the relational store.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A filesystem or CSV I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for results carrying a [`SimError`].
pub type SimResult<T> = Result<T, SimError>;
