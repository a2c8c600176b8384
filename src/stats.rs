//! Online signal statistics
//!
//! [`StatAccumulator`] keeps count, mean, population standard deviation and
//! extrema of a stream of values in O(1) space, using Welford's update so the
//! variance does not degrade the way a naive sum-of-squares does when the
//! values are large relative to their spread.

use serde::{Deserialize, Serialize};

use crate::error::StatsError;

/// Point-in-time view of an accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatSnapshot {
    /// Number of values appended
    pub count: u64,
    /// Arithmetic mean
    pub mean: f64,
    /// Population standard deviation
    pub stddev: f64,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
}

/// Running aggregate for one device. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct StatAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl StatAccumulator {
    /// Start a new accumulator from its first value.
    ///
    /// Callers are expected to pass finite values; see [`Self::try_new`].
    pub fn new(initial: f64) -> Self {
        Self {
            count: 1,
            mean: initial,
            m2: 0.0,
            min: initial,
            max: initial,
        }
    }

    /// Like [`Self::new`], rejecting NaN and infinities.
    pub fn try_new(initial: f64) -> Result<Self, StatsError> {
        check_finite(initial)?;
        Ok(Self::new(initial))
    }

    /// Fold one more value in.
    pub fn append(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    /// Like [`Self::append`], rejecting NaN and infinities.
    pub fn try_append(&mut self, value: f64) -> Result<(), StatsError> {
        check_finite(value)?;
        self.append(value);
        Ok(())
    }

    /// Number of values appended
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Running mean
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance (0.0 for a single value)
    pub fn variance(&self) -> f64 {
        // m2 can dip a hair below zero from rounding
        (self.m2 / self.count as f64).max(0.0)
    }

    /// Population standard deviation
    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Current state as a copyable tuple
    pub fn snapshot(&self) -> StatSnapshot {
        StatSnapshot {
            count: self.count,
            mean: self.mean,
            stddev: self.stddev(),
            min: self.min,
            max: self.max,
        }
    }
}

fn check_finite(value: f64) -> Result<(), StatsError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StatsError::NonFinite(value))
    }
}
