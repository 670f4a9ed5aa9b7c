//! Simulation clock and pacing.
//!
//! `SimClock` owns virtual time: the tick counter and the timestamp each
//! tick maps to. `SpeedControl` owns wall-clock pacing: the shared speed
//! multiplier every driver reads before each wait.

use crate::{
    config::PacingConfig,
    error::{SimError, SimResult},
    types::Tick,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct SimClock {
    pub current_tick: Tick,
    pub tick_secs:    f64,
    pub epoch:        DateTime<Utc>,
}

impl SimClock {
    pub fn new(epoch: DateTime<Utc>, tick_secs: f64) -> Self {
        Self { current_tick: 0, tick_secs, epoch }
    }

    /// Advance one tick. Returns the new tick number.
    pub fn advance(&mut self) -> Tick {
        self.current_tick += 1;
        self.current_tick
    }

    /// Virtual timestamp of the current tick.
    pub fn now(&self) -> DateTime<Utc> {
        self.time_of(self.current_tick)
    }

    pub fn time_of(&self, tick: Tick) -> DateTime<Utc> {
        let millis = (tick as f64 * self.tick_secs * 1000.0).round() as i64;
        self.epoch + ChronoDuration::milliseconds(millis)
    }
}

/// Midnight UTC of the current day: the default virtual start time.
pub fn default_epoch() -> DateTime<Utc> {
    let now = Utc::now();
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or(now)
}

/// Shared speed multiplier. Writes are clamped; readers see the new value
/// on their next wait.
#[derive(Debug)]
pub struct SpeedControl {
    bits:          AtomicU64,
    min:           f64,
    max:           f64,
    base_interval: Duration,
}

impl SpeedControl {
    pub fn new(config: &PacingConfig) -> Self {
        Self {
            bits:          AtomicU64::new(1.0f64.clamp(config.min_multiplier, config.max_multiplier).to_bits()),
            min:           config.min_multiplier,
            max:           config.max_multiplier,
            base_interval: Duration::from_millis(config.base_interval_ms),
        }
    }

    pub fn multiplier(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Set the multiplier, clamped to the configured bounds.
    /// Returns the effective value. Only non-finite input is rejected.
    pub fn set(&self, requested: f64) -> SimResult<f64> {
        if !requested.is_finite() {
            return Err(SimError::InvalidSpeedMultiplier(requested));
        }
        let effective = requested.clamp(self.min, self.max);
        if effective != requested {
            log::warn!(
                "speed multiplier {requested} outside [{}, {}], clamped to {effective}",
                self.min, self.max
            );
        }
        self.bits.store(effective.to_bits(), Ordering::Release);
        Ok(effective)
    }

    /// Wall-clock wait between batches at the current multiplier.
    pub fn interval(&self) -> Duration {
        self.base_interval.div_f64(self.multiplier())
    }
}
