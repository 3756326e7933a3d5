//! Simulated board peripherals for running the pipeline on a workstation.
//!
//! The reference board wires the DAC output pin straight into an ADC input
//! and carries one tri-colour LED. [`LoopbackChannel`] stands in for the
//! converter pair and [`ConsoleIndicator`] for the LED.

use daq_common::Channel;
use daq_common::adc::MAX_COUNT;
use daq_core::peripheral::{Indicator, SampleSource};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::debug;

/// DAC-to-ADC loopback.
///
/// Writes are clamped to the 12-bit range; reads return the last write.
#[derive(Default)]
pub struct LoopbackChannel {
    level: AtomicU32,
}

impl LoopbackChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SampleSource for LoopbackChannel {
    fn write(&self, value: u32) {
        self.level.store(value.min(MAX_COUNT), Ordering::Relaxed);
    }

    fn read(&self) -> u32 {
        self.level.load(Ordering::Relaxed)
    }
}

/// LED model that remembers channel states and logs transitions.
#[derive(Default)]
pub struct ConsoleIndicator {
    lit: [AtomicBool; 3],
}

impl ConsoleIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(channel: Channel) -> usize {
        match channel {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }

    pub fn is_on(&self, channel: Channel) -> bool {
        self.lit[Self::slot(channel)].load(Ordering::Relaxed)
    }
}

impl Indicator for ConsoleIndicator {
    fn set(&self, channel: Channel, on: bool) {
        let was = self.lit[Self::slot(channel)].swap(on, Ordering::Relaxed);
        if was != on {
            debug!(channel = channel.name(), on, "indicator");
        }
    }
}
