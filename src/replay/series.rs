//! Immutable sample tables and linear point interpolation.

use crate::error::{SimError, SimResult};

/// One timestamped measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Epoch seconds.
    pub ts: f64,
    pub value: f64,
}

/// An immutable, time-ordered sample table for one channel.
///
/// Loaded once at component construction; only the querying clock moves
/// afterwards. Queries past the last sample fail rather than extrapolate;
/// queries before the first sample clamp to it.
#[derive(Debug, Clone)]
pub struct Series {
    channel: String,
    samples: Vec<Sample>,
}

impl Series {
    /// Builds a series, sorting samples by timestamp.
    pub fn new(channel: impl Into<String>, mut samples: Vec<Sample>) -> Self {
        samples.sort_by(|a, b| a.ts.total_cmp(&b.ts));
        Self {
            channel: channel.into(),
            samples,
        }
    }

    /// The channel this series was loaded from.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// First and last sample timestamps, if any samples exist.
    pub fn time_bounds(&self) -> Option<(f64, f64)> {
        Some((self.samples.first()?.ts, self.samples.last()?.ts))
    }

    /// Linearly interpolated value at `ts` epoch seconds.
    ///
    /// An exact timestamp match returns that sample's value; otherwise the
    /// bracketing pair is located by binary search and interpolated.
    ///
    /// # Errors
    ///
    /// [`SimError::NoData`] when the series is empty and
    /// [`SimError::PastEndOfData`] when `ts` lies past the last sample.
    pub fn value_at(&self, ts: f64) -> SimResult<f64> {
        let Some(last) = self.samples.last() else {
            return Err(SimError::NoData(self.channel.clone()));
        };
        if ts > last.ts {
            return Err(SimError::PastEndOfData { ts, last: last.ts });
        }

        // First sample at or after ts; in range because ts <= last.ts.
        let idx = self.samples.partition_point(|s| s.ts < ts);
        let upper = self.samples[idx];
        if upper.ts == ts {
            return Ok(upper.value);
        }
        if idx == 0 {
            // Before the first sample: clamp rather than extrapolate back.
            return Ok(upper.value);
        }

        let lower = self.samples[idx - 1];
        let frac = (ts - lower.ts) / (upper.ts - lower.ts);
        Ok(lower.value + frac * (upper.value - lower.value))
    }
}
