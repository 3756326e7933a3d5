//! Double-buffer swap protocol.
//!
//! The coordinator owns two ring buffers of equal capacity. The active buffer
//! receives samples from the periodic consumer. The push that fills it starts
//! a bulk transfer of its store into the standby buffer and moves the
//! protocol to `TransferPending`. The transfer engine later signals
//! completion, possibly from interrupt context. The completion handler
//! exchanges the two roles in constant time, empties the new active buffer
//! and posts a [`WindowEvent`] for the analysis task, which drains the
//! standby buffer and releases it.
//!
//! All role state sits behind one [`SpinLock`]. Task-side calls take it with
//! `lock`. The completion path never spins: it parks the signal in a pending
//! slot and services it only if the lock is free. Otherwise the current
//! holder services it right after unlocking, which is how a masked interrupt
//! source behaves once the critical section ends.
//!
//! At most one transfer is outstanding. A buffer that fills while the
//! standby still holds an unanalysed window is dropped, and samples refused
//! while a transfer is in flight are counted as an overrun. Completions with
//! an unknown or stale transfer id are rejected and counted.

use crate::BufferError;
use crate::clock::{Clock, ticks_between};
use crate::mailbox::Mailbox;
use crate::peripheral::Indicator;
use crate::ring_buffer::{BufferHandle, BufferPool};
use crate::sync::SpinLock;
use crate::transfer::{Completion, CompletionSink, TransferEngine, TransferId, TransferOutcome};
use alloc::sync::Arc;
use core::mem;
use core::sync::atomic::{AtomicU64, Ordering, fence};
use daq_common::Channel;
use daq_common::pipeline::EVENT_QUEUE_DEPTH;
use tracing::{debug, warn};

/// Protocol state of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapState {
    /// Not accepting samples. The initial state, and the state after `halt`.
    Idle,

    /// The active buffer accepts pushes.
    Sampling,

    /// The active buffer is full and its transfer is outstanding.
    TransferPending,

    /// Completion observed; the role exchange is in progress. Only visible
    /// inside the completion handler.
    Draining,
}

/// What happened to one sample handed to [`SwapCoordinator::on_sample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Stored,

    /// The sample filled the active buffer and a transfer was requested.
    TransferStarted { transfer: TransferId, window: u32 },

    /// The sample filled the active buffer but the standby still holds an
    /// unanalysed window. The active buffer was emptied.
    WindowDropped,

    /// A transfer is in flight and the active buffer is full. The sample was
    /// discarded.
    Overrun,

    /// The coordinator is halted. Nothing was stored.
    Halted,

    /// The buffer table rejected the operation.
    Fault(BufferError),
}

/// Message from the completion handler to the analysis task.
///
/// `start` and `end` are clock ticks: when the transfer was requested and
/// when its completion was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// The standby buffer holds `samples` values ready to be drained.
    Ready {
        window: u32,
        start: u64,
        end: u64,
        samples: usize,
    },

    /// The transfer failed or timed out. The window's samples are gone.
    Failed { window: u32, start: u64, end: u64 },
}

/// Snapshot of the coordinator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapStats {
    pub completed_windows: u64,
    pub dropped_windows: u64,
    pub dropped_samples: u64,
    pub failed_transfers: u64,
    pub spurious_completions: u64,
}

#[derive(Default)]
struct Counters {
    completed_windows: AtomicU64,
    dropped_windows: AtomicU64,
    dropped_samples: AtomicU64,
    failed_transfers: AtomicU64,
    spurious_completions: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    transfer: TransferId,
    window: u32,
    started: u64,
    overrun: bool,
}

struct Window<T, E> {
    pool: BufferPool<T>,
    active: BufferHandle,
    standby: BufferHandle,
    state: SwapState,
    standby_busy: bool,
    in_flight: Option<InFlight>,
    next_transfer: TransferId,
    next_window: u32,
    halted: bool,
    engine: E,
}

struct Shared<T, E> {
    window: SpinLock<Window<T, E>>,

    /// Parked completion signal: `transfer << 1 | failed`, zero when empty.
    /// Transfer ids are never zero, so neither is a parked word.
    pending: AtomicU64,

    events: Mailbox<WindowEvent, EVENT_QUEUE_DEPTH>,
    clock: Arc<Clock>,
    indicator: Arc<dyn Indicator>,
    counters: Counters,
}

fn encode(transfer: TransferId, outcome: TransferOutcome) -> u64 {
    ((transfer as u64) << 1) | (outcome == TransferOutcome::Failed) as u64
}

fn decode(word: u64) -> (TransferId, TransferOutcome) {
    let outcome = if word & 1 == 1 {
        TransferOutcome::Failed
    } else {
        TransferOutcome::Completed
    };
    ((word >> 1) as TransferId, outcome)
}

impl<T: Copy + Default + Send, E: Send> Shared<T, E> {
    /// Handles the parked completion if the window lock is free.
    ///
    /// Loops while signals keep arriving during the service window, so a
    /// completion parked just before the unlock is never stranded.
    fn service(&self) {
        loop {
            let Some(mut window) = self.window.try_lock() else {
                return;
            };
            let word = self.pending.swap(0, Ordering::AcqRel);
            if word != 0 {
                self.handle_completion(&mut window, word);
            }
            drop(window);
            fence(Ordering::SeqCst);
            if self.pending.load(Ordering::Acquire) == 0 {
                return;
            }
        }
    }

    /// Constant-time completion bookkeeping. Never logs or computes.
    fn handle_completion(&self, w: &mut Window<T, E>, word: u64) {
        let (transfer, outcome) = decode(word);
        let Some(flight) = w.in_flight.take_if(|f| f.transfer == transfer) else {
            bump(&self.counters.spurious_completions);
            return;
        };
        let end = self.clock.now();

        match outcome {
            TransferOutcome::Completed => {
                w.state = SwapState::Draining;
                mem::swap(&mut w.active, &mut w.standby);
                let _ = w.pool.reset(w.active);
                w.standby_busy = true;

                let samples = w.pool.len(w.standby).unwrap_or(0);
                let event = WindowEvent::Ready {
                    window: flight.window,
                    start: flight.started,
                    end,
                    samples,
                };
                if self.events.push(event).is_ok() {
                    bump(&self.counters.completed_windows);
                } else {
                    let _ = w.pool.reset(w.standby);
                    w.standby_busy = false;
                    bump(&self.counters.dropped_windows);
                }
            }
            TransferOutcome::Failed => {
                let _ = w.pool.reset(w.active);
                bump(&self.counters.failed_transfers);
                let _ = self.events.push(WindowEvent::Failed {
                    window: flight.window,
                    start: flight.started,
                    end,
                });
            }
        }

        w.state = if w.halted {
            SwapState::Idle
        } else {
            SwapState::Sampling
        };
    }
}

impl<T: Copy + Default + Send, E: Send> CompletionSink for Shared<T, E> {
    fn complete(&self, transfer: TransferId, outcome: TransferOutcome) {
        let word = encode(transfer, outcome);
        if self
            .pending
            .compare_exchange(0, word, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            bump(&self.counters.spurious_completions);
            return;
        }
        fence(Ordering::SeqCst);
        self.service();
    }
}

/// Coordinates the active and standby buffers with a transfer engine.
///
/// Cheap to clone; clones share the same state. The sampler, the analysis
/// task and the engine's completion tokens all hold one.
pub struct SwapCoordinator<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for SwapCoordinator<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, E> SwapCoordinator<T, E>
where
    T: Copy + Default + Send + 'static,
    E: TransferEngine<T> + 'static,
{
    /// Allocates both buffers with `capacity` slots each. Starts `Idle`.
    pub fn new(
        capacity: usize,
        engine: E,
        clock: Arc<Clock>,
        indicator: Arc<dyn Indicator>,
    ) -> Result<Self, BufferError> {
        let mut pool = BufferPool::new();
        let active = pool.init(capacity)?;
        let standby = pool.init(capacity)?;

        let window = Window {
            pool,
            active,
            standby,
            state: SwapState::Idle,
            standby_busy: false,
            in_flight: None,
            next_transfer: 1,
            next_window: 1,
            halted: true,
            engine,
        };

        Ok(Self {
            shared: Arc::new(Shared {
                window: SpinLock::new(window),
                pending: AtomicU64::new(0),
                events: Mailbox::new(),
                clock,
                indicator,
                counters: Counters::default(),
            }),
        })
    }

    /// Runs `f` inside the critical section, then services any completion
    /// that was parked while the lock was held.
    fn with_window<R>(&self, f: impl FnOnce(&mut Window<T, E>) -> R) -> R {
        let result = {
            let mut window = self.shared.window.lock();
            f(&mut window)
        };
        fence(Ordering::SeqCst);
        self.shared.service();
        result
    }

    /// Begins accepting samples.
    pub fn start(&self) {
        self.with_window(|w| {
            w.halted = false;
            if w.state == SwapState::Idle {
                w.state = SwapState::Sampling;
            }
        });
    }

    /// Stops accepting samples. An outstanding transfer still completes and
    /// its window is still delivered.
    pub fn halt(&self) {
        self.with_window(|w| {
            w.halted = true;
            if w.state == SwapState::Sampling {
                w.state = SwapState::Idle;
            }
        });
    }

    pub fn state(&self) -> SwapState {
        self.with_window(|w| w.state)
    }

    /// Pushes one sample into the active buffer and starts a transfer if
    /// that push filled it.
    pub fn on_sample(&self, sample: T) -> SampleOutcome {
        let outcome = self.with_window(|w| {
            if w.halted {
                return SampleOutcome::Halted;
            }
            let active = w.active;
            match w.pool.push(active, sample) {
                Ok(()) => match w.pool.is_full(active) {
                    Ok(true) => self.begin_transfer(w),
                    Ok(false) => SampleOutcome::Stored,
                    Err(err) => SampleOutcome::Fault(err),
                },
                Err(BufferError::Full) => {
                    bump(&self.shared.counters.dropped_samples);
                    match w.in_flight.as_mut() {
                        Some(flight) => {
                            if !flight.overrun {
                                flight.overrun = true;
                                bump(&self.shared.counters.dropped_windows);
                            }
                            SampleOutcome::Overrun
                        }
                        None => self.begin_transfer(w),
                    }
                }
                Err(err) => SampleOutcome::Fault(err),
            }
        });

        match outcome {
            SampleOutcome::TransferStarted { transfer, window } => {
                debug!(transfer, window, "transfer requested");
            }
            SampleOutcome::WindowDropped => {
                warn!("standby buffer still holds an unanalysed window, window dropped");
            }
            SampleOutcome::Overrun => {
                debug!("sample refused while transfer in flight");
            }
            SampleOutcome::Fault(err) => {
                warn!(error = %err, "buffer fault on sample");
            }
            SampleOutcome::Stored | SampleOutcome::Halted => {}
        }
        outcome
    }

    fn begin_transfer(&self, w: &mut Window<T, E>) -> SampleOutcome {
        let shared = &self.shared;
        if w.standby_busy {
            let _ = w.pool.reset(w.active);
            bump(&shared.counters.dropped_windows);
            return SampleOutcome::WindowDropped;
        }
        let capacity = match w.pool.capacity(w.active) {
            Ok(capacity) => capacity,
            Err(err) => return SampleOutcome::Fault(err),
        };

        let transfer = w.next_transfer;
        let window = w.next_window;
        w.next_transfer = transfer.wrapping_add(1).max(1);
        w.next_window = window.wrapping_add(1);
        w.in_flight = Some(InFlight {
            transfer,
            window,
            started: shared.clock.now(),
            overrun: false,
        });
        w.state = SwapState::TransferPending;
        shared.indicator.set(Channel::Blue, true);

        let sink: Arc<dyn CompletionSink> = shared.clone();
        let done = Completion::new(transfer, sink);
        match w.pool.pair_mut(w.active, w.standby) {
            Ok((src, dst)) => w.engine.copy(src.as_raw(), dst.as_raw_mut(), capacity, done),
            Err(err) => {
                // The unfired token reports a failed transfer, which resets
                // the active buffer once the lock is released.
                drop(done);
                return SampleOutcome::Fault(err);
            }
        }
        SampleOutcome::TransferStarted { transfer, window }
    }

    /// Interrupt-context entry point for engines that do not hold a
    /// [`Completion`], and for test harnesses injecting signals.
    pub fn signal_completion(&self, transfer: TransferId, outcome: TransferOutcome) {
        self.shared.complete(transfer, outcome);
    }

    /// Force-drops a transfer that has been outstanding for more than
    /// `timeout_ticks`. Returns whether one was dropped.
    ///
    /// A completion arriving for it afterwards is rejected as stale.
    pub fn check_watchdog(&self, timeout_ticks: u64) -> bool {
        let clock = &self.shared.clock;
        let expired = self.with_window(|w| {
            let flight = w.in_flight?;
            let now = clock.now();
            if ticks_between(now, flight.started) <= timeout_ticks {
                return None;
            }
            w.in_flight = None;
            let _ = w.pool.reset(w.active);
            bump(&self.shared.counters.dropped_windows);
            let _ = self.shared.events.push(WindowEvent::Failed {
                window: flight.window,
                start: flight.started,
                end: now,
            });
            w.state = if w.halted {
                SwapState::Idle
            } else {
                SwapState::Sampling
            };
            Some(flight)
        });

        match expired {
            Some(flight) => {
                warn!(
                    transfer = flight.transfer,
                    window = flight.window,
                    timeout_ticks,
                    "transfer timed out, window dropped"
                );
                true
            }
            None => false,
        }
    }

    /// Next message from the completion handler, if any.
    ///
    /// Must only be called from the analysis task.
    pub fn next_event(&self) -> Option<WindowEvent> {
        self.shared.events.pop()
    }

    /// Pops the oldest sample of the completed window.
    ///
    /// Returns `None` once the window is drained, or if no window is waiting.
    pub fn pop_standby(&self) -> Option<T> {
        self.with_window(|w| {
            if !w.standby_busy {
                return None;
            }
            w.pool.pop(w.standby).ok()
        })
    }

    /// Empties the standby buffer and makes it available for the next
    /// transfer.
    pub fn release_standby(&self) {
        self.with_window(|w| {
            let _ = w.pool.reset(w.standby);
            w.standby_busy = false;
        });
    }

    /// Current `(active, standby)` handles.
    pub fn roles(&self) -> (BufferHandle, BufferHandle) {
        self.with_window(|w| (w.active, w.standby))
    }

    /// Samples stored in the active buffer.
    pub fn active_len(&self) -> usize {
        self.with_window(|w| w.pool.len(w.active).unwrap_or(0))
    }

    pub fn capacity(&self) -> usize {
        self.with_window(|w| w.pool.capacity(w.active).unwrap_or(0))
    }

    pub fn stats(&self) -> SwapStats {
        let c = &self.shared.counters;
        SwapStats {
            completed_windows: c.completed_windows.load(Ordering::Relaxed),
            dropped_windows: c.dropped_windows.load(Ordering::Relaxed),
            dropped_samples: c.dropped_samples.load(Ordering::Relaxed),
            failed_transfers: c.failed_transfers.load(Ordering::Relaxed),
            spurious_completions: c.spurious_completions.load(Ordering::Relaxed),
        }
    }

    pub fn clock(&self) -> &Arc<Clock> {
        &self.shared.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::NullIndicator;
    use crate::transfer::{BlockingCopy, copy_region};
    use std::sync::Mutex;

    /// Copies immediately but holds the token until the test fires it.
    #[derive(Clone, Default)]
    struct DeferredEngine {
        parked: Arc<Mutex<Vec<Completion>>>,
    }

    impl DeferredEngine {
        fn take(&self) -> Completion {
            self.parked.lock().unwrap().remove(0)
        }
    }

    impl TransferEngine<u32> for DeferredEngine {
        fn copy(&mut self, src: &[u32], dst: &mut [u32], length: usize, done: Completion) {
            copy_region(src, dst, length);
            self.parked.lock().unwrap().push(done);
        }
    }

    /// Loses every token it is handed.
    struct LossyEngine;

    impl TransferEngine<u32> for LossyEngine {
        fn copy(&mut self, _src: &[u32], _dst: &mut [u32], _length: usize, _done: Completion) {}
    }

    #[derive(Default)]
    struct RecordingIndicator {
        calls: Mutex<Vec<(Channel, bool)>>,
    }

    impl Indicator for RecordingIndicator {
        fn set(&self, channel: Channel, on: bool) {
            self.calls.lock().unwrap().push((channel, on));
        }
    }

    fn running<E: TransferEngine<u32> + 'static>(
        capacity: usize,
        engine: E,
    ) -> SwapCoordinator<u32, E> {
        let coordinator = SwapCoordinator::new(
            capacity,
            engine,
            Arc::new(Clock::new()),
            Arc::new(NullIndicator),
        )
        .unwrap();
        coordinator.start();
        coordinator
    }

    fn fill<E: TransferEngine<u32> + 'static>(
        coordinator: &SwapCoordinator<u32, E>,
        n: u32,
    ) -> SampleOutcome {
        let mut last = SampleOutcome::Stored;
        for sample in 0..n {
            last = coordinator.on_sample(sample);
        }
        last
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = SwapCoordinator::<u32, _>::new(
            0,
            BlockingCopy::new(),
            Arc::new(Clock::new()),
            Arc::new(NullIndicator),
        );
        assert!(matches!(result, Err(BufferError::InvalidArgument)));
    }

    #[test]
    fn starts_idle_and_refuses_samples() {
        let coordinator = SwapCoordinator::new(
            4,
            BlockingCopy::new(),
            Arc::new(Clock::new()),
            Arc::new(NullIndicator),
        )
        .unwrap();
        assert_eq!(coordinator.state(), SwapState::Idle);
        assert_eq!(coordinator.on_sample(1), SampleOutcome::Halted);
        assert_eq!(coordinator.active_len(), 0);
    }

    #[test]
    fn filling_push_starts_exactly_one_transfer() {
        let coordinator = running(4, BlockingCopy::new());
        for sample in 0..3 {
            assert_eq!(coordinator.on_sample(sample), SampleOutcome::Stored);
        }
        assert_eq!(
            coordinator.on_sample(3),
            SampleOutcome::TransferStarted {
                transfer: 1,
                window: 1
            }
        );

        // Synchronous completion is serviced once the lock is released.
        assert_eq!(coordinator.state(), SwapState::Sampling);
        assert_eq!(coordinator.active_len(), 0);
        assert!(matches!(
            coordinator.next_event(),
            Some(WindowEvent::Ready {
                window: 1,
                samples: 4,
                ..
            })
        ));
        assert_eq!(coordinator.next_event(), None);

        let drained: Vec<u32> = std::iter::from_fn(|| coordinator.pop_standby()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3]);
        coordinator.release_standby();
        assert_eq!(coordinator.stats().completed_windows, 1);
    }

    #[test]
    fn transfer_asserts_busy_indicator() {
        let indicator = Arc::new(RecordingIndicator::default());
        let coordinator = SwapCoordinator::new(
            2,
            BlockingCopy::new(),
            Arc::new(Clock::new()),
            indicator.clone(),
        )
        .unwrap();
        coordinator.start();
        fill(&coordinator, 2);

        assert_eq!(*indicator.calls.lock().unwrap(), vec![(Channel::Blue, true)]);
    }

    #[test]
    fn roles_exchange_on_completion() {
        let engine = DeferredEngine::default();
        let coordinator = running(4, engine.clone());
        let (active, standby) = coordinator.roles();

        fill(&coordinator, 4);
        assert_eq!(coordinator.state(), SwapState::TransferPending);
        assert_eq!(coordinator.roles(), (active, standby));

        engine.take().fire(TransferOutcome::Completed);
        assert_eq!(coordinator.roles(), (standby, active));
        assert_eq!(coordinator.state(), SwapState::Sampling);
    }

    #[test]
    fn samples_during_pending_transfer_are_an_overrun() {
        let engine = DeferredEngine::default();
        let coordinator = running(4, engine.clone());
        fill(&coordinator, 4);

        assert_eq!(coordinator.on_sample(100), SampleOutcome::Overrun);
        assert_eq!(coordinator.on_sample(101), SampleOutcome::Overrun);
        let stats = coordinator.stats();
        assert_eq!(stats.dropped_samples, 2);
        assert_eq!(stats.dropped_windows, 1);

        engine.take().fire(TransferOutcome::Completed);
        assert_eq!(coordinator.on_sample(5), SampleOutcome::Stored);
        assert_eq!(coordinator.active_len(), 1);
    }

    #[test]
    fn back_to_back_completions_are_rejected() {
        let engine = DeferredEngine::default();
        let coordinator = running(4, engine.clone());
        fill(&coordinator, 4);

        engine.take().fire(TransferOutcome::Completed);
        let roles = coordinator.roles();
        coordinator.signal_completion(1, TransferOutcome::Completed);

        assert_eq!(coordinator.roles(), roles);
        assert_ne!(roles.0, roles.1);
        assert_eq!(coordinator.stats().spurious_completions, 1);
        assert!(matches!(coordinator.next_event(), Some(WindowEvent::Ready { .. })));
        assert_eq!(coordinator.next_event(), None);
        assert_eq!(coordinator.pop_standby(), Some(0));
    }

    #[test]
    fn unknown_transfer_id_is_rejected() {
        let engine = DeferredEngine::default();
        let coordinator = running(4, engine.clone());
        fill(&coordinator, 4);

        coordinator.signal_completion(42, TransferOutcome::Completed);
        assert_eq!(coordinator.state(), SwapState::TransferPending);
        assert_eq!(coordinator.stats().spurious_completions, 1);

        engine.take().fire(TransferOutcome::Completed);
        assert_eq!(coordinator.state(), SwapState::Sampling);
    }

    #[test]
    fn failed_transfer_drops_window() {
        let coordinator = running(4, LossyEngine);
        fill(&coordinator, 4);

        assert_eq!(coordinator.state(), SwapState::Sampling);
        assert_eq!(coordinator.active_len(), 0);
        assert!(matches!(
            coordinator.next_event(),
            Some(WindowEvent::Failed { window: 1, .. })
        ));
        assert_eq!(coordinator.pop_standby(), None);
        assert_eq!(coordinator.stats().failed_transfers, 1);
        assert_eq!(coordinator.stats().completed_windows, 0);
    }

    #[test]
    fn busy_standby_drops_next_window() {
        let coordinator = running(4, BlockingCopy::new());
        fill(&coordinator, 4);
        assert!(coordinator.next_event().is_some());

        // Standby not released: the next full buffer has nowhere to go.
        assert_eq!(fill(&coordinator, 4), SampleOutcome::WindowDropped);
        assert_eq!(coordinator.active_len(), 0);
        assert_eq!(coordinator.stats().dropped_windows, 1);
        assert_eq!(coordinator.pop_standby(), Some(0));

        coordinator.release_standby();
        assert!(matches!(
            fill(&coordinator, 4),
            SampleOutcome::TransferStarted { transfer: 2, window: 2 }
        ));
    }

    #[test]
    fn watchdog_drops_stuck_transfer_and_rejects_late_completion() {
        let engine = DeferredEngine::default();
        let coordinator = running(4, engine.clone());
        fill(&coordinator, 4);

        for _ in 0..3 {
            coordinator.clock().tick();
        }
        assert!(!coordinator.check_watchdog(5));
        for _ in 0..3 {
            coordinator.clock().tick();
        }
        assert!(coordinator.check_watchdog(5));
        assert_eq!(coordinator.state(), SwapState::Sampling);
        assert!(matches!(
            coordinator.next_event(),
            Some(WindowEvent::Failed { start: 0, end: 6, .. })
        ));

        engine.take().fire(TransferOutcome::Completed);
        let stats = coordinator.stats();
        assert_eq!(stats.spurious_completions, 1);
        assert_eq!(stats.dropped_windows, 1);
        assert_eq!(stats.completed_windows, 0);
        assert_eq!(coordinator.next_event(), None);
    }

    #[test]
    fn halt_during_transfer_still_delivers_window() {
        let engine = DeferredEngine::default();
        let coordinator = running(4, engine.clone());
        fill(&coordinator, 4);
        coordinator.halt();

        assert_eq!(coordinator.on_sample(9), SampleOutcome::Halted);
        engine.take().fire(TransferOutcome::Completed);
        assert_eq!(coordinator.state(), SwapState::Idle);
        assert!(matches!(coordinator.next_event(), Some(WindowEvent::Ready { .. })));
    }

    #[test]
    fn completion_from_another_thread() {
        let engine = DeferredEngine::default();
        let coordinator = running(8, engine.clone());
        fill(&coordinator, 8);

        let done = engine.take();
        std::thread::spawn(move || done.fire(TransferOutcome::Completed))
            .join()
            .unwrap();

        assert_eq!(coordinator.state(), SwapState::Sampling);
        assert!(matches!(
            coordinator.next_event(),
            Some(WindowEvent::Ready { samples: 8, .. })
        ));
    }
}
