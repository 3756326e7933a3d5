//! Window statistics for the analysis task.
//!
//! Provides the accumulator that folds a drained window of raw samples into
//! summary statistics, and the per-run record that gets reported. All values
//! are converted to volts before they are accumulated.

use daq_common::adc::{FULL_SCALE_COUNT, REFERENCE_VOLTS};
use daq_core::clock::Timestamp;
use std::fmt;

/// Volts per raw converter count.
pub const VOLTS_PER_COUNT: f64 = REFERENCE_VOLTS / FULL_SCALE_COUNT as f64;

/// Converts a raw converter count to volts.
pub fn to_volts(count: u32) -> f64 {
    count as f64 * VOLTS_PER_COUNT
}

/// Running summary of one window.
///
/// Tracks min, max, mean and the sum of squared deviations from the running
/// mean (Welford's method), so the variance is available in one pass without
/// keeping the samples. Starts empty for every window; nothing carries over
/// between runs.
#[derive(Debug, Clone, Copy)]
pub struct WindowStats {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    mean: f64,
    m2: f64,
}

impl Default for WindowStats {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowStats {
    /// Creates an empty accumulator.
    ///
    /// Min starts at +inf and max at -inf so the first value sets both.
    pub fn new() -> Self {
        Self {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Folds one value into the summary.
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Mean of the values seen so far, or 0.0 if none.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance: the mean squared deviation from the final mean.
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Report for one analysed window.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsRecord {
    /// 1-based run index.
    pub run: u32,
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub window_start: Timestamp,
    pub window_end: Timestamp,
}

impl StatisticsRecord {
    /// Builds the record for run `run` from a finished accumulator.
    ///
    /// An empty window reports zeros rather than the accumulator's infinite
    /// sentinels.
    pub fn new(run: u32, stats: &WindowStats, window_start: Timestamp, window_end: Timestamp) -> Self {
        let (min, max) = if stats.count == 0 {
            (0.0, 0.0)
        } else {
            (stats.min, stats.max)
        };
        Self {
            run,
            count: stats.count,
            min,
            max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
            window_start,
            window_end,
        }
    }
}

impl fmt::Display for StatisticsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run {} [{} -> {}] n={} min={:.4} V max={:.4} V mean={:.4} V sd={:.4} V",
            self.run,
            self.window_start,
            self.window_end,
            self.count,
            self.min,
            self.max,
            self.mean,
            self.std_dev
        )
    }
}
