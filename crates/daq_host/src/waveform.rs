//! Synthetic signal tables for the output channel.
//!
//! The producer timer walks a lookup table one entry per period and wraps
//! back to the start after the last entry. Tables hold raw converter counts.

use daq_common::adc::{FULL_SCALE_COUNT, MAX_COUNT, REFERENCE_VOLTS};
use std::f64::consts::PI;
use tracing::warn;

/// Volts added to the unit sine so the whole wave sits inside the
/// converter range, between 1 V and 3 V.
const SINE_OFFSET_VOLTS: f64 = 2.0;

/// Builds a sine table of `len` points, one full period, offset to 1-3 V.
///
/// Each entry is `(sin(2*pi*x/len) + 2) * FULL_SCALE / REFERENCE`, truncated
/// to a count. Entries above the converter maximum saturate.
pub fn sine_table(len: usize) -> Vec<u32> {
    let counts_per_volt = FULL_SCALE_COUNT as f64 / REFERENCE_VOLTS;
    (0..len)
        .map(|x| {
            let phase = 2.0 * PI * (x as f64 / len as f64);
            let count = ((phase.sin() + SINE_OFFSET_VOLTS) * counts_per_volt) as u32;
            if count > MAX_COUNT {
                warn!(index = x, count, "sine sample out of range, saturating");
                MAX_COUNT
            } else {
                count
            }
        })
        .collect()
}

/// Builds the ramp `0, 1, .., len - 1`.
pub fn ramp_table(len: usize) -> Vec<u32> {
    (0..len as u32).collect()
}

/// Cursor over a table that wraps at the end.
pub struct Waveform {
    table: Vec<u32>,
    next: usize,
}

impl Waveform {
    /// Returns `None` for an empty table.
    pub fn new(table: Vec<u32>) -> Option<Self> {
        if table.is_empty() {
            None
        } else {
            Some(Self { table, next: 0 })
        }
    }

    pub fn next_sample(&mut self) -> u32 {
        let sample = self.table[self.next];
        self.next += 1;
        if self.next == self.table.len() {
            self.next = 0;
        }
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_spans_one_to_three_volts() {
        let table = sine_table(50);
        assert_eq!(table.len(), 50);

        let volts = |count: u32| count as f64 * REFERENCE_VOLTS / FULL_SCALE_COUNT as f64;
        // sin(0) + 2 = 2 V
        assert!((volts(table[0]) - 2.0).abs() < 0.001);
        // Quarter period peaks near 3 V, three quarters troughs near 1 V.
        assert!((volts(table[12]) - 3.0).abs() < 0.01);
        assert!((volts(table[37]) - 1.0).abs() < 0.01);
        assert!(table.iter().all(|&count| count <= MAX_COUNT));
    }

    #[test]
    fn ramp_counts_up() {
        assert_eq!(ramp_table(4), vec![0, 1, 2, 3]);
        assert!(ramp_table(0).is_empty());
    }

    #[test]
    fn cursor_wraps() {
        let mut wave = Waveform::new(vec![7, 8, 9]).unwrap();
        let samples: Vec<u32> = (0..7).map(|_| wave.next_sample()).collect();
        assert_eq!(samples, vec![7, 8, 9, 7, 8, 9, 7]);
        assert!(Waveform::new(Vec::new()).is_none());
    }
}
