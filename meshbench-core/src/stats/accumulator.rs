//! Online latency statistics
//!
//! Running moments are kept with Welford's algorithm so that every update is
//! O(1) and allocation-free, safe to call from the message-delivery path.

use serde::{Deserialize, Serialize};

/// Immutable point-in-time copy of an accumulator's state
///
/// When `count` is zero the moments are NaN sentinels; renderers print them
/// as text instead of failing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatSnapshot {
    pub count: u64,
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
}

/// Running count/mean/variance/min/max for a stream of scalar samples
#[derive(Debug, Clone)]
pub struct StatAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl StatAccumulator {
    pub fn new() -> Self {
        Self { count: 0, mean: 0.0, m2: 0.0, min: f64::NAN, max: f64::NAN }
    }

    /// Fold one sample into the running moments
    pub fn update(&mut self, sample: f64) {
        self.count += 1;
        if self.count == 1 {
            self.mean = sample;
            self.min = sample;
            self.max = sample;
            return;
        }

        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (sample - self.mean);

        if sample < self.min {
            self.min = sample;
        }
        if sample > self.max {
            self.max = sample;
        }
    }

    /// Number of samples folded in so far
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of the samples seen so far (NaN before the first sample)
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.mean
        }
    }

    /// Population standard deviation (zero for a single sample)
    pub fn stddev(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }

    /// Smallest sample seen so far (NaN before the first sample)
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Largest sample seen so far (NaN before the first sample)
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Discard all accumulated state
    ///
    /// Resetting mid-run is the caller's responsibility; `update` never
    /// resets implicitly.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Take an immutable snapshot without mutating state
    pub fn snapshot(&self) -> StatSnapshot {
        StatSnapshot {
            count: self.count,
            mean: self.mean(),
            stddev: self.stddev(),
            min: self.min,
            max: self.max,
        }
    }
}

impl Default for StatAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
