//! Common definitions and constants shared across the acquisition pipeline.
//!
//! This crate provides the timing contract of the tick-driven scheduler, the
//! converter scaling used to turn raw samples into volts, the default window
//! geometry, and the indicator channel enumeration. Firmware glue, the host
//! simulator, and the table tooling all read from here so the numbers agree.

#![no_std]

// Timing contract of the software timer service.
//
// All scheduling in the pipeline is expressed in ticks of the monotonic clock.
// The tick driver, the periodic producer and consumer, and the one-shot busy
// indicator timer all derive their periods from these values.
pub mod timing {
    /// Nominal period of one clock tick in milliseconds.
    ///
    /// One tick is a tenth of a second. Timestamps are rendered with tenths
    /// resolution, so changing this value changes the meaning of the `.d`
    /// field in every rendered timestamp.
    pub const TICK_PERIOD_MS: u64 = 100;

    /// Number of ticks in one second.
    pub const TICKS_PER_SECOND: u64 = 1000 / TICK_PERIOD_MS;

    /// Period of the producer (signal write) timer, in ticks.
    pub const PRODUCER_PERIOD_TICKS: u64 = 1;

    /// Period of the consumer (sample read) timer, in ticks.
    pub const CONSUMER_PERIOD_TICKS: u64 = 1;

    /// How long the busy indicator stays asserted after a transfer starts.
    ///
    /// Cleared by an independent one-shot timer so the busy display is
    /// bounded even if the transfer completion is late or never arrives.
    pub const BUSY_INDICATOR_TICKS: u64 = 5;
}

// Converter scaling shared by the output and input channels.
//
// Both channels are 12-bit. Raw counts are converted to volts with a fixed
// linear scale: `count * (REFERENCE_VOLTS / FULL_SCALE_COUNT)`.
pub mod adc {
    /// Reference voltage of the converters.
    pub const REFERENCE_VOLTS: f64 = 3.3;

    /// Number of distinct codes of a 12-bit converter.
    pub const FULL_SCALE_COUNT: u32 = 4096;

    /// Largest code a 12-bit converter can represent.
    pub const MAX_COUNT: u32 = FULL_SCALE_COUNT - 1;
}

// Window geometry and run control for the acquisition pipeline.
pub mod pipeline {
    /// Default capacity of each of the two sample buffers.
    pub const BUFFER_CAPACITY: usize = 64;

    /// Number of completed windows after which the analysis task stops both
    /// periodic timers. This is the only termination path in analysis mode.
    pub const RUN_LIMIT: u32 = 5;

    /// Depth of the handoff queue between the completion handler and the
    /// analysis task. Must be a power of two.
    pub const EVENT_QUEUE_DEPTH: usize = 4;

    /// Number of points in the generated sine table.
    pub const SINE_TABLE_LEN: usize = 50;
}

/// Visual indicator channels.
///
/// The board carries one tri-colour LED with independently driven channels.
/// Each channel carries one meaning for the pipeline: red for errors, green
/// for the analysis-mode heartbeat, blue for transfers in flight and the
/// sampling-only heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Error state: a transfer failed or a window was dropped.
    Red,

    /// Heartbeat in analysis mode.
    Green,

    /// Busy: a bulk transfer is in flight. Also the heartbeat in
    /// sampling-only mode.
    Blue,
}

impl Channel {
    /// All channels, in driver order.
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    /// Short upper-case name used in log output.
    pub fn name(self) -> &'static str {
        match self {
            Channel::Red => "RED",
            Channel::Green => "GREEN",
            Channel::Blue => "BLUE",
        }
    }
}
