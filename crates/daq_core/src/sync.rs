//! Spin lock for the critical section around the buffer roles.
//!
//! Task-side code takes the lock with [`SpinLock::lock`]. Code that may run in
//! interrupt context must never spin on a lock held by the context it
//! preempted, so it uses [`SpinLock::try_lock`] and defers its work to the
//! holder when the lock is taken.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

/// Spinlock for mutual exclusion in no_std environments.
///
/// Provides lock-based synchronization using an atomic boolean flag and
/// busy-waiting. The lock is released automatically when the guard is
/// dropped.
pub struct SpinLock<T> {
    /// False means unlocked, true means locked.
    lock: AtomicBool,

    /// Protected data wrapped in UnsafeCell for interior mutability.
    data: UnsafeCell<T>,
}

/// SpinLock is safe to share between threads when T is Send.
///
/// The atomic lock flag ensures that only one context can hold the lock at a
/// time, making access to the protected data exclusive.
unsafe impl<T: Send> Sync for SpinLock<T> {}
unsafe impl<T: Send> Send for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            lock: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquires the lock, spinning until it is free.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        while self
            .lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        SpinLockGuard { lock: self }
    }

    /// Acquires the lock only if nobody holds it.
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        self.lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinLockGuard { lock: self })
    }
}

/// Guard that holds a spinlock and releases it on drop.
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<'a, T> core::ops::Deref for SpinLockGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: the guard proves exclusive ownership of the lock.
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> core::ops::DerefMut for SpinLockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: the guard proves exclusive ownership of the lock.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for SpinLockGuard<'a, T> {
    /// Uses release ordering so writes made under the lock are visible to
    /// the next holder.
    fn drop(&mut self) {
        self.lock.lock.store(false, Ordering::Release);
    }
}
