//! Board-level collaborators the pipeline drives but does not own.
//!
//! Register programming for the output and input channels and the LED driver
//! live outside this crate. Both are assumed to always succeed, so neither
//! trait returns a result.

use daq_common::Channel;

/// A physical sample channel pair: one output, one input.
///
/// On the reference board the output is a DAC whose pin is wired back to an
/// ADC input, so `read` returns whatever was last written, quantized.
pub trait SampleSource: Send + Sync {
    /// Drives the output channel with a raw count.
    fn write(&self, value: u32);

    /// Samples the input channel and returns a raw count.
    fn read(&self) -> u32;
}

/// Tri-channel visual indicator.
///
/// Blue marks a transfer in progress, red an error, green the analysis
/// heartbeat. Implementations may be called from interrupt context and must
/// not block.
pub trait Indicator: Send + Sync {
    fn set(&self, channel: Channel, on: bool);
}

/// Indicator that discards every request.
pub struct NullIndicator;

impl Indicator for NullIndicator {
    fn set(&self, _channel: Channel, _on: bool) {}
}
