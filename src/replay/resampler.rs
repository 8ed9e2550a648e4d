//! Randomized block resampling over replay components.

use std::cmp::Ordering;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::json;
use tracing::debug;

use crate::devices::types::{Battery, Component, Grid, Inverter, Load, PowerSource};
use crate::error::{SimError, SimResult};
use crate::sim::clock::Clock;
use crate::sim::types::{
    BatteryCommand, BatteryStep, ContextRecord, GridDemand, GridStep, InverterObservation,
    InverterStep, LoadStep, PowerSourceStep,
};

/// Default resampling window length.
pub const DEFAULT_WINDOW_HOURS: f64 = 6.0;

/// Rebuilds a replay component anchored at a new clock.
///
/// Reanchoring reloads whatever the component preloads, so a resampled
/// episode never sees data from outside its window's forward range.
pub trait Reanchor: Sized {
    fn reanchor(&self, clock: Clock) -> SimResult<Self>;
}

/// Wraps a replay component and re-draws its position in the historical
/// trace whenever the current window is exhausted.
///
/// The trace `[trace_start, trace_end]` is divided into non-overlapping
/// windows of `window_hours`. At construction, and again whenever a step
/// would run past the current window's end, a window index is drawn from a
/// seeded uniform RNG and the inner component is rebuilt at that window's
/// start. Same seed, same sequence of windows.
pub struct BlockResampler<T> {
    inner: T,
    trace_start: Clock,
    window_ticks: i64,
    window_count: i64,
    clock: Clock,
    window_end: Clock,
    rng: StdRng,
    resamples: u64,
}

impl<T: Reanchor> BlockResampler<T> {
    /// Wraps `inner`, drawing the first window immediately.
    ///
    /// # Errors
    ///
    /// [`SimError::TraceTooShort`] when the trace holds no complete
    /// window, and [`SimError::ResolutionMismatch`] when the bound clocks
    /// disagree on resolution.
    pub fn new(
        inner: T,
        trace_start: Clock,
        trace_end: Clock,
        window_hours: f64,
        seed: u64,
    ) -> SimResult<Self> {
        let total_hours = Clock::difference_hours(trace_start, trace_end)?;
        let window_count = (total_hours / window_hours).floor() as i64;
        if window_count < 1 {
            return Err(SimError::TraceTooShort { window_hours });
        }
        let window_ticks = (window_hours * 3600.0 * trace_start.resolution() as f64).round() as i64;

        let mut resampler = Self {
            inner,
            trace_start,
            window_ticks,
            window_count,
            clock: trace_start,
            window_end: trace_start,
            rng: StdRng::seed_from_u64(seed),
            resamples: 0,
        };
        resampler.resample()?;
        Ok(resampler)
    }

    fn resample(&mut self) -> SimResult<()> {
        let index = self.rng.random_range(0..self.window_count);
        let start = self.trace_start.advance(index * self.window_ticks);
        debug!(window = index, start = %start, "resampling replay window");

        self.inner = self.inner.reanchor(start)?;
        self.clock = start;
        self.window_end = start.advance(self.window_ticks);
        self.resamples += 1;
        Ok(())
    }

    /// Jumps to a fresh window if this step would cross the current one,
    /// then advances the episode clock.
    fn prepare(&mut self, step_ticks: i64) -> SimResult<()> {
        let landing = self.clock.advance(step_ticks);
        if landing.partial_cmp(&self.window_end) == Some(Ordering::Greater) {
            self.resample()?;
        }
        self.clock = self.clock.advance(step_ticks);
        Ok(())
    }

    /// The replay clock inside the current window.
    pub fn episode_clock(&self) -> Clock {
        self.clock
    }

    /// End of the current window.
    pub fn window_end(&self) -> Clock {
        self.window_end
    }

    /// How many windows have been drawn, the initial draw included.
    pub fn resample_count(&self) -> u64 {
        self.resamples
    }

    /// Number of windows available in the trace.
    pub fn window_count(&self) -> i64 {
        self.window_count
    }

    /// The wrapped component.
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Reanchor + Component> Component for BlockResampler<T> {
    fn id(&self) -> String {
        format!("{}+resampled", self.inner.id())
    }

    fn specification(&self) -> serde_json::Value {
        json!({
            "resampler": {
                "window_ticks": self.window_ticks,
                "windows": self.window_count,
            },
            "inner": self.inner.specification(),
        })
    }

    fn context(&mut self, records: &[ContextRecord]) {
        self.inner.context(records);
    }
}

impl<T: Reanchor + Battery> Battery for BlockResampler<T> {
    fn step(
        &mut self,
        step_ticks: i64,
        command: Option<&BatteryCommand>,
    ) -> SimResult<BatteryStep> {
        self.prepare(step_ticks)?;
        self.inner.step(step_ticks, command)
    }
}

impl<T: Reanchor + PowerSource> PowerSource for BlockResampler<T> {
    fn step(&mut self, step_ticks: i64) -> SimResult<PowerSourceStep> {
        self.prepare(step_ticks)?;
        self.inner.step(step_ticks)
    }
}

impl<T: Reanchor + Load> Load for BlockResampler<T> {
    fn step(&mut self, step_ticks: i64) -> SimResult<LoadStep> {
        self.prepare(step_ticks)?;
        self.inner.step(step_ticks)
    }
}

impl<T: Reanchor + Grid> Grid for BlockResampler<T> {
    fn step(&mut self, step_ticks: i64, demand: Option<&GridDemand>) -> SimResult<GridStep> {
        self.prepare(step_ticks)?;
        self.inner.step(step_ticks, demand)
    }
}

impl<T: Reanchor + Inverter> Inverter for BlockResampler<T> {
    fn step(
        &mut self,
        step_ticks: i64,
        observation: &InverterObservation,
    ) -> SimResult<InverterStep> {
        self.prepare(step_ticks)?;
        self.inner.step(step_ticks, observation)
    }
}
