//! Bulk-copy engines and their completion tokens.
//!
//! A [`TransferEngine`] copies a region and reports the result through a
//! [`Completion`] it is handed with the request. The token is consumed by
//! [`Completion::fire`], so it cannot signal twice, and it signals
//! [`TransferOutcome::Failed`] from its destructor if the engine drops it
//! unfired. Every accepted request therefore produces exactly one signal.

use alloc::sync::Arc;
use core::fmt;

/// Identifier of one transfer request. Never zero.
pub type TransferId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The whole region was copied.
    Completed,

    /// Nothing usable was copied. There is no partial completion.
    Failed,
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOutcome::Completed => f.write_str("completed"),
            TransferOutcome::Failed => f.write_str("failed"),
        }
    }
}

/// Receiver of completion signals.
///
/// `complete` may run in interrupt context. Implementations must do bounded
/// work and must not block on a lock the interrupted context could hold.
pub trait CompletionSink: Send + Sync {
    fn complete(&self, transfer: TransferId, outcome: TransferOutcome);
}

/// Move-only token that delivers one completion signal.
pub struct Completion {
    transfer: TransferId,
    sink: Option<Arc<dyn CompletionSink>>,
}

impl Completion {
    pub fn new(transfer: TransferId, sink: Arc<dyn CompletionSink>) -> Self {
        Self {
            transfer,
            sink: Some(sink),
        }
    }

    pub fn transfer(&self) -> TransferId {
        self.transfer
    }

    /// Delivers `outcome` to the sink, consuming the token.
    pub fn fire(mut self, outcome: TransferOutcome) {
        if let Some(sink) = self.sink.take() {
            sink.complete(self.transfer, outcome);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.complete(self.transfer, TransferOutcome::Failed);
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("transfer", &self.transfer)
            .field("armed", &self.sink.is_some())
            .finish()
    }
}

/// Bulk copy from one store to another.
///
/// `copy` must not block waiting for completion. It may fire `done`
/// synchronously before returning, or hand it to another context that fires
/// it later. The caller keeps `src` untouched until the signal arrives.
pub trait TransferEngine<T>: Send {
    fn copy(&mut self, src: &[T], dst: &mut [T], length: usize, done: Completion);
}

/// Copies the first `length` elements of `src` into `dst`.
///
/// A length beyond either region fails without touching `dst`.
pub fn copy_region<T: Copy>(src: &[T], dst: &mut [T], length: usize) -> TransferOutcome {
    match (src.get(..length), dst.get_mut(..length)) {
        (Some(from), Some(to)) => {
            to.copy_from_slice(from);
            TransferOutcome::Completed
        }
        _ => TransferOutcome::Failed,
    }
}

/// Engine that copies on the caller's stack and completes before returning.
#[derive(Debug, Default)]
pub struct BlockingCopy {
    transfers: u64,
}

impl BlockingCopy {
    pub const fn new() -> Self {
        Self { transfers: 0 }
    }

    /// Number of requests served.
    pub fn transfers(&self) -> u64 {
        self.transfers
    }
}

impl<T: Copy> TransferEngine<T> for BlockingCopy {
    fn copy(&mut self, src: &[T], dst: &mut [T], length: usize, done: Completion) {
        self.transfers += 1;
        done.fire(copy_region(src, dst, length));
    }
}
