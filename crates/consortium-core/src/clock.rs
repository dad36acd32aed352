//! Simulation clock.
//!
//! The tick counter is the only stored temporal state. Simulation time is
//! derived from it as `tick * interval`, so repeated advances never
//! accumulate rounding error.

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// The tick interval is zero, negative, or not finite.
    #[error("invalid tick interval: {0}")]
    InvalidInterval(f64),
}

/// Tick counter plus the simulation time step.
#[derive(Debug, Clone, PartialEq)]
pub struct SimClock {
    /// Next tick to run (0-indexed).
    tick: u64,
    /// Simulation time per tick.
    interval: f64,
}

impl SimClock {
    /// Create a clock at tick 0.
    pub fn new(interval: f64) -> Result<Self, ClockError> {
        if !interval.is_finite() || interval <= 0.0 {
            return Err(ClockError::InvalidInterval(interval));
        }
        Ok(Self { tick: 0, interval })
    }

    /// The tick about to run.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulation time per tick.
    pub const fn interval(&self) -> f64 {
        self.interval
    }

    /// Simulation time at the start of the current tick.
    pub fn global_time(&self) -> f64 {
        time_at(self.tick, self.interval)
    }

    /// Move to the next tick.
    pub fn advance(&mut self) -> Result<(), ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(())
    }
}

/// Simulation time at the start of `tick`.
#[allow(clippy::cast_precision_loss)]
pub fn time_at(tick: u64, interval: f64) -> f64 {
    // Exact for any tick count below 2^53.
    tick as f64 * interval
}
