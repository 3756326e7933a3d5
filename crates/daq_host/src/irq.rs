//! Interrupt-driven transfer backend.
//!
//! [`IrqEngine`] models a DMA controller: the copy itself happens when the
//! request is issued, and the completion interrupt is raised later from a
//! dedicated "irq" thread after a configurable latency. The irq thread then
//! rings the analysis task's [`Doorbell`], which is the task-spawn half of
//! the completion handler.

use daq_core::transfer::{Completion, TransferEngine, TransferOutcome, copy_region};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Wake-up signal for the analysis task.
///
/// Rings are latched, so a ring that lands before the task waits is not
/// lost.
#[derive(Default)]
pub struct Doorbell {
    rung: Mutex<bool>,
    cv: Condvar,
}

impl Doorbell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ring(&self) {
        let mut rung = self.rung.lock().unwrap_or_else(|e| e.into_inner());
        *rung = true;
        self.cv.notify_one();
    }

    /// Waits until rung or until `timeout` passes. Returns whether it was
    /// rung, and clears the latch.
    pub fn wait(&self, timeout: Duration) -> bool {
        let rung = self.rung.lock().unwrap_or_else(|e| e.into_inner());
        let (mut rung, _) = self
            .cv
            .wait_timeout_while(rung, timeout, |rung| !*rung)
            .unwrap_or_else(|e| e.into_inner());
        let was = *rung;
        *rung = false;
        was
    }
}

struct Raised {
    done: Completion,
    outcome: TransferOutcome,
}

/// DMA-style engine whose completions arrive on another thread.
pub struct IrqEngine {
    irq: Sender<Raised>,
    fail_every: Option<u32>,
    requests: u32,
}

impl IrqEngine {
    /// Starts the irq thread.
    ///
    /// With `fail_every = Some(n)` every n-th request reports
    /// [`TransferOutcome::Failed`] without copying.
    pub fn spawn(latency: Duration, doorbell: Arc<Doorbell>, fail_every: Option<u32>) -> Self {
        let (irq, pending) = mpsc::channel::<Raised>();

        thread::Builder::new()
            .name("irq".into())
            .spawn(move || {
                for raised in pending {
                    thread::sleep(latency);
                    let transfer = raised.done.transfer();
                    raised.done.fire(raised.outcome);
                    debug!(transfer, outcome = %raised.outcome, "transfer interrupt");
                    doorbell.ring();
                }
            })
            .map(|_| ())
            .unwrap_or_else(|err| warn!(error = %err, "failed to start irq thread"));

        Self {
            irq,
            fail_every,
            requests: 0,
        }
    }
}

impl TransferEngine<u32> for IrqEngine {
    fn copy(&mut self, src: &[u32], dst: &mut [u32], length: usize, done: Completion) {
        self.requests = self.requests.wrapping_add(1);
        let inject = self
            .fail_every
            .is_some_and(|n| n > 0 && self.requests % n == 0);

        let outcome = if inject {
            TransferOutcome::Failed
        } else {
            copy_region(src, dst, length)
        };

        // If the irq thread is gone the token comes back inside the error
        // and its destructor reports the failure.
        let _ = self.irq.send(Raised { done, outcome });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daq_core::transfer::{CompletionSink, TransferId};

    struct Relay(Mutex<Sender<(TransferId, TransferOutcome)>>);

    impl CompletionSink for Relay {
        fn complete(&self, transfer: TransferId, outcome: TransferOutcome) {
            let _ = self.0.lock().unwrap().send((transfer, outcome));
        }
    }

    #[test]
    fn completes_on_irq_thread_and_rings() {
        let doorbell = Arc::new(Doorbell::new());
        let mut engine = IrqEngine::spawn(Duration::from_millis(5), doorbell.clone(), Some(2));
        let (tx, rx) = mpsc::channel();
        let sink = Arc::new(Relay(Mutex::new(tx)));

        let src = [1, 2, 3];
        let mut dst = [0; 3];
        engine.copy(&src, &mut dst, 3, Completion::new(1, sink.clone()));
        assert_eq!(dst, src);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            (1, TransferOutcome::Completed)
        );
        assert!(doorbell.wait(Duration::from_secs(5)));

        let mut second = [0; 3];
        engine.copy(&src, &mut second, 3, Completion::new(2, sink));
        assert_eq!(second, [0, 0, 0]);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            (2, TransferOutcome::Failed)
        );
    }

    #[test]
    fn doorbell_latches_and_times_out() {
        let doorbell = Doorbell::new();
        assert!(!doorbell.wait(Duration::from_millis(1)));
        doorbell.ring();
        assert!(doorbell.wait(Duration::from_millis(1)));
        assert!(!doorbell.wait(Duration::from_millis(1)));
    }
}
