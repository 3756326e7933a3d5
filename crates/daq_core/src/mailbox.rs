use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

/// A statically allocated, lock-free single-producer single-consumer queue.
///
/// The producer side is the transfer completion handler, which may run in
/// interrupt context; the consumer side is the analysis task. Neither side
/// blocks or allocates. `N` must be a power of two.
pub struct Mailbox<T, const N: usize> {
    buffer: [UnsafeCell<MaybeUninit<T>>; N],
    head: AtomicUsize,
    tail: AtomicUsize,
}

unsafe impl<T: Send, const N: usize> Sync for Mailbox<T, N> {}
unsafe impl<T: Send, const N: usize> Send for Mailbox<T, N> {}

impl<T: Copy, const N: usize> Default for Mailbox<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy, const N: usize> Mailbox<T, N> {
    pub const fn new() -> Self {
        const { assert!(N.is_power_of_two()) };
        Self {
            buffer: [const { UnsafeCell::new(MaybeUninit::uninit()) }; N],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Enqueues `item`, handing it back if the queue is full.
    ///
    /// Must only be called from the single producer context.
    #[inline(always)]
    pub fn push(&self, item: T) -> Result<(), T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        if head.wrapping_sub(tail) >= N {
            return Err(item);
        }

        unsafe {
            // Safety: only the producer writes, and the slot at head is not
            // visible to the consumer until head is published below.
            let slot = self.buffer[head & (N - 1)].get();
            (*slot).write(item);
        }

        self.head.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Dequeues the oldest item.
    ///
    /// Must only be called from the single consumer context.
    #[inline(always)]
    pub fn pop(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        if tail == head {
            return None;
        }

        let item = unsafe {
            // Safety: head > tail, so the slot was initialized by the producer
            // and published with release ordering.
            let slot = self.buffer[tail & (N - 1)].get();
            (*slot).assume_init()
        };

        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(item)
    }

    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn rejects_push_when_full() {
        let mailbox: Mailbox<u32, 4> = Mailbox::new();
        for i in 0..4 {
            mailbox.push(i).unwrap();
        }
        assert_eq!(mailbox.push(99), Err(99));
        assert_eq!(mailbox.len(), 4);
        assert_eq!(mailbox.pop(), Some(0));
        assert!(mailbox.push(4).is_ok());
    }

    #[test]
    fn preserves_order_across_wrap() {
        let mailbox: Mailbox<u32, 2> = Mailbox::new();
        for i in 0..10 {
            mailbox.push(i).unwrap();
            assert_eq!(mailbox.pop(), Some(i));
        }
        assert!(mailbox.is_empty());
        assert_eq!(mailbox.pop(), None);
    }

    #[test]
    fn hands_items_across_threads() {
        let mailbox: Arc<Mailbox<u64, 8>> = Arc::new(Mailbox::new());
        let producer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || {
                for i in 0..1_000u64 {
                    while mailbox.push(i).is_err() {
                        std::hint::spin_loop();
                    }
                }
            })
        };

        let mut expected = 0;
        while expected < 1_000 {
            if let Some(item) = mailbox.pop() {
                assert_eq!(item, expected);
                expected += 1;
            }
        }
        producer.join().unwrap();
    }
}
