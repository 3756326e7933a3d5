//! Core buffering, timekeeping and handoff logic for the acquisition pipeline.
//!
//! This crate provides the bounded ring buffers that hold raw samples, the
//! monotonic tick clock, the bulk-transfer abstraction with its at-most-once
//! completion token, and the swap coordinator that ties a periodic sampler to
//! an asynchronous transfer engine. All modules are `no_std` with `alloc` so
//! the same code runs in firmware and in the host-side simulator.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use core::fmt;

/// Monotonic tick counter with wrap-safe elapsed-time arithmetic.
///
/// The clock is advanced by an external tick driver at a fixed period and is
/// read from any context. Timestamps rendered from it are for reporting only;
/// all protocol timing is expressed in raw ticks.
pub mod clock;

/// Lock-free bounded queue for handing events out of interrupt context.
///
/// Carries window events from the transfer completion handler to the
/// analysis task without blocking either side. Capacity is fixed at compile
/// time so pushing never allocates.
pub mod mailbox;

/// Collaborator contracts consumed by the pipeline core.
///
/// The physical sample channels and the visual indicator are supplied by the
/// board support code (or by the host simulator) through these traits.
pub mod peripheral;

/// Bounded FIFO ring buffers and the handle table that owns them.
///
/// Buffers are created and destroyed through a pool that hands out checked
/// handles. Every operation validates its handle first, so stale or foreign
/// handles are rejected instead of touching freed memory.
pub mod ring_buffer;

/// Double-buffer swap protocol between the sampler and the transfer engine.
///
/// Detects a full active buffer, starts a bulk transfer to the standby
/// buffer, and on completion exchanges the two roles in constant time before
/// handing the finished window to the analysis task.
pub mod swap;

/// Spin lock used as the critical section around the buffer roles.
pub mod sync;

/// Bulk-copy engine abstraction with at-most-once completion signalling.
///
/// Engines may finish synchronously or signal completion later from an
/// interrupt context. The completion token is consumed when fired, and an
/// engine that drops it unfired reports a failed transfer.
pub mod transfer;

/// Error types returned by ring buffer operations.
///
/// All buffer failures are reported as values so that hardware-adjacent
/// callers can pick a policy per call: drop the sample, grow the buffer, or
/// hand the window off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// The handle does not name a live buffer.
    ///
    /// Either the buffer was already freed, the handle came from another
    /// pool, or the slot has since been reused by a newer buffer.
    InvalidHandle,

    /// The buffer holds `capacity` elements and the push was refused.
    ///
    /// Nothing was evicted. The caller decides whether to drop the element,
    /// grow the buffer, or trigger a swap.
    Full,

    /// There is no element to pop.
    Empty,

    /// A capacity argument was zero, overflowed, or was smaller than the
    /// number of elements currently stored.
    InvalidArgument,
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::InvalidHandle => f.write_str("invalid buffer handle"),
            BufferError::Full => f.write_str("buffer is full"),
            BufferError::Empty => f.write_str("buffer is empty"),
            BufferError::InvalidArgument => f.write_str("invalid buffer capacity"),
        }
    }
}

impl core::error::Error for BufferError {}
