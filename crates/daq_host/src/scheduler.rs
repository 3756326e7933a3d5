//! Software timer service.
//!
//! Modelled on an RTOS timer daemon. Each call to [`TimerService::step`]
//! advances the shared clock by one tick and then runs every due timer
//! callback in registration order, on the service's own thread. Periodic
//! timers reload themselves; one-shot timers go dormant after firing until
//! re-armed. Timers are controlled from any thread through a
//! [`TimerHandle`], which only touches atomics, so callbacks may stop or arm
//! other timers without re-entering the service.

use daq_core::clock::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};

pub type TimerCallback = Box<dyn FnMut() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reload {
    Periodic,
    OneShot,
}

struct TimerControl {
    active: AtomicBool,
    /// Tick at which the timer fires next.
    due: AtomicU64,
    period: u64,
}

/// Shared control of one registered timer.
#[derive(Clone)]
pub struct TimerHandle {
    control: Arc<TimerControl>,
}

impl TimerHandle {
    /// Stops the timer. A stopped periodic timer never fires again unless
    /// re-armed.
    pub fn stop(&self) {
        self.control.active.store(false, Ordering::Release);
    }

    /// (Re)starts the timer so it fires `period` ticks after `now`.
    pub fn arm(&self, now: u64) {
        self.control
            .due
            .store(now.wrapping_add(self.control.period), Ordering::Relaxed);
        self.control.active.store(true, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.control.active.load(Ordering::Acquire)
    }
}

struct Timer {
    name: &'static str,
    reload: Reload,
    control: Arc<TimerControl>,
    callback: TimerCallback,
}

/// Tick driver and timer daemon.
pub struct TimerService {
    clock: Arc<Clock>,
    timers: Vec<Timer>,
}

impl TimerService {
    pub fn new(clock: Arc<Clock>) -> Self {
        Self {
            clock,
            timers: Vec::new(),
        }
    }

    fn register(
        &mut self,
        name: &'static str,
        reload: Reload,
        period: u64,
        active: bool,
        callback: TimerCallback,
    ) -> TimerHandle {
        let control = Arc::new(TimerControl {
            active: AtomicBool::new(false),
            due: AtomicU64::new(0),
            period: period.max(1),
        });
        let handle = TimerHandle {
            control: control.clone(),
        };
        if active {
            handle.arm(self.clock.now());
        }
        self.timers.push(Timer {
            name,
            reload,
            control,
            callback,
        });
        debug!(timer = name, period, ?reload, "timer registered");
        handle
    }

    /// Registers an auto-reloading timer, started immediately.
    pub fn periodic(
        &mut self,
        name: &'static str,
        period_ticks: u64,
        callback: impl FnMut() + Send + 'static,
    ) -> TimerHandle {
        self.register(name, Reload::Periodic, period_ticks, true, Box::new(callback))
    }

    /// Registers a one-shot timer, dormant until armed through its handle.
    pub fn one_shot(
        &mut self,
        name: &'static str,
        delay_ticks: u64,
        callback: impl FnMut() + Send + 'static,
    ) -> TimerHandle {
        self.register(name, Reload::OneShot, delay_ticks, false, Box::new(callback))
    }

    /// Advances the clock one tick and fires every due timer.
    ///
    /// Returns the new tick count.
    pub fn step(&mut self) -> u64 {
        let now = self.clock.tick();
        for timer in &mut self.timers {
            let control = &timer.control;
            if !control.active.load(Ordering::Acquire) {
                continue;
            }
            if now < control.due.load(Ordering::Relaxed) {
                continue;
            }
            match timer.reload {
                Reload::Periodic => control.due.store(now + control.period, Ordering::Relaxed),
                Reload::OneShot => control.active.store(false, Ordering::Release),
            }
            trace!(timer = timer.name, tick = now, "timer fired");
            (timer.callback)();
        }
        now
    }

    /// True while at least one periodic timer is running.
    pub fn has_periodic_work(&self) -> bool {
        self.timers.iter().any(|timer| {
            timer.reload == Reload::Periodic && timer.control.active.load(Ordering::Acquire)
        })
    }

    /// Drives the service on its own thread, one step per `tick`.
    ///
    /// The thread exits once every periodic timer has been stopped or after
    /// `max_ticks` steps, and returns the number of steps taken.
    pub fn spawn(mut self, tick: Duration, max_ticks: u64) -> std::io::Result<JoinHandle<u64>> {
        thread::Builder::new()
            .name("timer-service".into())
            .spawn(move || {
                let mut steps = 0;
                while steps < max_ticks && self.has_periodic_work() {
                    thread::sleep(tick);
                    self.step();
                    steps += 1;
                }
                debug!(steps, "timer service stopped");
                steps
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn log() -> Arc<Mutex<Vec<(&'static str, u64)>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn periodic_timers_fire_in_registration_order() {
        let clock = Arc::new(Clock::new());
        let mut service = TimerService::new(clock.clone());
        let fired = log();

        let (f, c) = (fired.clone(), clock.clone());
        service.periodic("a", 1, move || f.lock().unwrap().push(("a", c.now())));
        let (f, c) = (fired.clone(), clock.clone());
        service.periodic("b", 2, move || f.lock().unwrap().push(("b", c.now())));

        for _ in 0..4 {
            service.step();
        }
        assert_eq!(
            *fired.lock().unwrap(),
            vec![("a", 1), ("a", 2), ("b", 2), ("a", 3), ("a", 4), ("b", 4)]
        );
    }

    #[test]
    fn one_shot_fires_once_after_arming() {
        let clock = Arc::new(Clock::new());
        let mut service = TimerService::new(clock.clone());
        let fired = log();

        let (f, c) = (fired.clone(), clock.clone());
        let busy = service.one_shot("busy", 3, move || f.lock().unwrap().push(("busy", c.now())));
        service.step();
        assert!(!busy.is_active());

        busy.arm(clock.now());
        for _ in 0..6 {
            service.step();
        }
        assert_eq!(*fired.lock().unwrap(), vec![("busy", 4)]);
        assert!(!busy.is_active());
    }

    #[test]
    fn stopping_every_periodic_timer_ends_the_thread() {
        let clock = Arc::new(Clock::new());
        let mut service = TimerService::new(clock.clone());
        let slot: Arc<Mutex<Option<TimerHandle>>> = Arc::new(Mutex::new(None));

        let s = slot.clone();
        let c = clock.clone();
        let handle = service.periodic("self-stop", 1, move || {
            if c.now() == 3 {
                if let Some(handle) = s.lock().unwrap().as_ref() {
                    handle.stop();
                }
            }
        });
        *slot.lock().unwrap() = Some(handle);

        let steps = service
            .spawn(Duration::from_millis(1), 1_000)
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(steps, 3);
        assert_eq!(clock.now(), 3);
    }

    #[test]
    fn max_ticks_bounds_the_thread() {
        let clock = Arc::new(Clock::new());
        let mut service = TimerService::new(clock.clone());
        service.periodic("forever", 1, || {});

        let steps = service
            .spawn(Duration::from_millis(1), 5)
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(steps, 5);
        assert_eq!(clock.now(), 5);
    }
}
