//! Fixed-point simulation clock.

use std::cmp::Ordering;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{SimError, SimResult};

/// Nanosecond tick resolution, the default for wall-clock anchored runs.
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// An immutable fixed-point instant.
///
/// A `Clock` is a signed tick count at a fixed resolution in ticks per
/// second. Every operation returns a new value; instants of different
/// resolutions never compare, and subtracting them is an error.
///
/// Seconds-to-ticks conversions round half away from zero.
///
/// # Examples
///
/// ```
/// use microgrid_sim::sim::clock::Clock;
///
/// let t0 = Clock::from_seconds(10.0, 1_000);
/// let t1 = t0.advance_seconds(3600.0);
/// assert_eq!(Clock::difference_hours(t0, t1).unwrap(), 1.0);
/// assert_eq!(t1.advance(-3_600_000), t0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Clock {
    ticks: i64,
    res: i64,
}

impl Clock {
    /// Creates a clock from a raw tick count at `res` ticks per second.
    ///
    /// # Panics
    ///
    /// Panics if `res` is not positive.
    pub fn new(ticks: i64, res: i64) -> Self {
        assert!(res > 0, "resolution must be > 0 ticks/s");
        Self { ticks, res }
    }

    /// The current wall-clock time at `res` ticks per second.
    pub fn now(res: i64) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as i128;
        let ticks = nanos * res as i128 / NANOS_PER_SECOND as i128;
        Self::new(ticks as i64, res)
    }

    /// Parses a UTC calendar timestamp.
    ///
    /// Accepts `YYYY-MM-DD HH:MM:SS`, the `T`-separated form, and a bare
    /// `YYYY-MM-DD` (midnight).
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Timestamp`] if none of the forms match.
    pub fn from_calendar_str(s: &str, res: i64) -> SimResult<Self> {
        let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d").map(NaiveDateTime::from))?;
        Ok(Self::from_seconds(naive.and_utc().timestamp() as f64, res))
    }

    /// Creates a clock from epoch seconds, rounding half away from zero.
    pub fn from_seconds(seconds: f64, res: i64) -> Self {
        Self::new((seconds * res as f64).round() as i64, res)
    }

    /// Raw tick count.
    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    /// Resolution in ticks per second.
    pub fn resolution(&self) -> i64 {
        self.res
    }

    /// This instant as epoch seconds.
    pub fn to_seconds(&self) -> f64 {
        self.ticks as f64 / self.res as f64
    }

    /// This instant as epoch microseconds.
    pub fn to_microseconds(&self) -> f64 {
        self.ticks as f64 * 1e6 / self.res as f64
    }

    /// A new clock advanced by `step_ticks` (negative steps move back).
    pub fn advance(&self, step_ticks: i64) -> Self {
        Self {
            ticks: self.ticks + step_ticks,
            res: self.res,
        }
    }

    /// A new clock advanced by `seconds`, rounded half away from zero.
    pub fn advance_seconds(&self, seconds: f64) -> Self {
        self.advance((seconds * self.res as f64).round() as i64)
    }

    /// A new clock rounded to the nearest multiple of `ticks_per_step`,
    /// ties rounding up.
    ///
    /// # Panics
    ///
    /// Panics if `ticks_per_step` is not positive.
    pub fn align(&self, ticks_per_step: i64) -> Self {
        assert!(ticks_per_step > 0, "ticks_per_step must be > 0");
        let rem = self.ticks.rem_euclid(ticks_per_step);
        let down = self.ticks - rem;
        let ticks = if rem * 2 >= ticks_per_step {
            down + ticks_per_step
        } else {
            down
        };
        Self {
            ticks,
            res: self.res,
        }
    }

    /// Signed hours elapsed from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ResolutionMismatch`] when the two clocks do not
    /// share a resolution.
    pub fn difference_hours(from: Clock, to: Clock) -> SimResult<f64> {
        if from.res != to.res {
            return Err(SimError::ResolutionMismatch {
                left: from.res,
                right: to.res,
            });
        }
        Ok((to.ticks - from.ticks) as f64 / to.res as f64 / 3600.0)
    }

    /// This instant as a UTC datetime, if representable.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let secs = self.ticks.div_euclid(self.res);
        let subsec = self.ticks.rem_euclid(self.res);
        let nanos = (subsec as i128 * NANOS_PER_SECOND as i128 / self.res as i128) as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}

impl PartialOrd for Clock {
    /// Ordering is defined only between clocks of equal resolution.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (self.res == other.res).then(|| self.ticks.cmp(&other.ticks))
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.3f UTC")),
            None => write!(f, "{} ticks @ {} ticks/s", self.ticks, self.res),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_round_trips() {
        let clock = Clock::new(1_000, 10);
        assert_eq!(clock.advance(37).advance(-37), clock);
    }

    #[test]
    fn from_seconds_rounds_half_away_from_zero() {
        assert_eq!(Clock::from_seconds(0.5, 1).ticks(), 1);
        assert_eq!(Clock::from_seconds(1.5, 1).ticks(), 2);
        assert_eq!(Clock::from_seconds(2.5, 1).ticks(), 3);
        assert_eq!(Clock::from_seconds(-1.5, 1).ticks(), -2);
    }

    #[test]
    fn advance_seconds_matches_from_seconds_rounding() {
        let clock = Clock::new(0, 10);
        assert_eq!(clock.advance_seconds(0.05).ticks(), 1);
        assert_eq!(clock.advance_seconds(-0.05).ticks(), -1);
    }

    #[test]
    fn align_rounds_to_nearest_multiple_ties_up() {
        assert_eq!(Clock::new(14, 1).align(10).ticks(), 10);
        assert_eq!(Clock::new(15, 1).align(10).ticks(), 20);
        assert_eq!(Clock::new(16, 1).align(10).ticks(), 20);
        assert_eq!(Clock::new(-14, 1).align(10).ticks(), -10);
    }

    #[test]
    fn align_is_idempotent() {
        let aligned = Clock::new(12_345, 100).align(60);
        assert_eq!(aligned.align(60), aligned);
    }

    #[test]
    fn difference_hours_requires_equal_resolution() {
        let a = Clock::new(0, 10);
        let b = Clock::new(36_000, 10);
        assert_eq!(Clock::difference_hours(a, b).unwrap(), 1.0);

        let c = Clock::new(0, 100);
        assert!(matches!(
            Clock::difference_hours(a, c),
            Err(SimError::ResolutionMismatch { left: 10, right: 100 })
        ));
    }

    #[test]
    fn ordering_is_undefined_across_resolutions() {
        let a = Clock::new(5, 10);
        let b = Clock::new(7, 10);
        assert!(a < b);
        assert_eq!(a.partial_cmp(&Clock::new(7, 100)), None);
    }

    #[test]
    fn calendar_parsing_hits_known_epochs() {
        let epoch = Clock::from_calendar_str("1970-01-01 00:00:00", 1).unwrap();
        assert_eq!(epoch.ticks(), 0);

        let midnight = Clock::from_calendar_str("2024-06-01", 1_000).unwrap();
        assert_eq!(midnight.ticks(), 1_717_200_000_000);

        let t_form = Clock::from_calendar_str("2024-06-01T00:00:00", 1_000).unwrap();
        assert_eq!(t_form, midnight);

        assert!(Clock::from_calendar_str("not a date", 1).is_err());
    }

    #[test]
    fn second_conversions() {
        let clock = Clock::from_seconds(12.25, 1_000);
        assert_eq!(clock.to_seconds(), 12.25);
        assert_eq!(clock.to_microseconds(), 12_250_000.0);
    }

    #[test]
    fn display_formats_as_utc_calendar() {
        let clock = Clock::from_calendar_str("2024-06-01 12:30:00", 1_000).unwrap();
        assert_eq!(format!("{clock}"), "2024-06-01 12:30:00.000 UTC");
    }
}
