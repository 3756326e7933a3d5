//! Bounded FIFO ring buffers with a checked handle table.
//!
//! A [`RingBuffer`] owns a contiguous backing store and tracks a write index,
//! a read index and a full flag. The flag disambiguates the `write == read`
//! case, so the whole store is usable. Pushing into a full buffer never
//! evicts: it reports [`BufferError::Full`] and leaves the contents alone.
//!
//! A [`BufferPool`] is the registry of live buffers. Handles are
//! `(index, generation)` pairs; freeing a buffer bumps the slot generation so
//! every outstanding handle to it is rejected from then on, even after the
//! slot is reused.

use crate::BufferError;
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use tracing::debug;

/// A fixed-capacity FIFO over a contiguous backing store.
///
/// Not internally synchronized; callers serialize access per buffer.
pub struct RingBuffer<T> {
    storage: Box<[T]>,
    write: usize,
    read: usize,
    full: bool,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Allocates an empty buffer holding up to `capacity` elements.
    pub fn new(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::InvalidArgument);
        }
        Ok(Self {
            storage: vec![T::default(); capacity].into_boxed_slice(),
            write: 0,
            read: 0,
            full: false,
        })
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        !self.full && self.write == self.read
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Number of elements currently stored.
    pub fn len(&self) -> usize {
        if self.full {
            self.capacity()
        } else if self.write >= self.read {
            self.write - self.read
        } else {
            self.capacity() + self.write - self.read
        }
    }

    /// Appends `item`, or reports [`BufferError::Full`] without modifying
    /// the buffer.
    pub fn push(&mut self, item: T) -> Result<(), BufferError> {
        if self.full {
            return Err(BufferError::Full);
        }
        self.storage[self.write] = item;
        self.write = (self.write + 1) % self.capacity();
        self.full = self.write == self.read;
        Ok(())
    }

    /// Removes the oldest element.
    pub fn pop(&mut self) -> Result<T, BufferError> {
        if self.is_empty() {
            return Err(BufferError::Empty);
        }
        let item = self.storage[self.read];
        self.read = (self.read + 1) % self.capacity();
        self.full = false;
        Ok(item)
    }

    /// Discards all elements without releasing the backing store.
    pub fn reset(&mut self) {
        self.write = 0;
        self.read = 0;
        self.full = false;
    }

    /// Moves the contents into a new store of `new_capacity`, oldest first.
    ///
    /// Fails with [`BufferError::InvalidArgument`] if `new_capacity` is zero
    /// or smaller than the current length; the buffer is left untouched.
    pub fn resize(&mut self, new_capacity: usize) -> Result<(), BufferError> {
        if new_capacity < self.len() {
            return Err(BufferError::InvalidArgument);
        }
        let mut next = RingBuffer::new(new_capacity)?;
        while let Ok(item) = self.pop() {
            next.push(item)?;
        }
        debug!(
            from = self.capacity(),
            to = new_capacity,
            len = next.len(),
            "ring buffer resized"
        );
        *self = next;
        Ok(())
    }

    /// Appends `item`, doubling the capacity first if the buffer is full.
    ///
    /// Never reports [`BufferError::Full`]; the only failure is a capacity
    /// that cannot be doubled.
    pub fn push_with_growth(&mut self, item: T) -> Result<(), BufferError> {
        if self.full {
            let doubled = self
                .capacity()
                .checked_mul(2)
                .ok_or(BufferError::InvalidArgument)?;
            self.resize(doubled)?;
        }
        self.push(item)
    }

    /// The whole backing store in physical order, for bulk transfers.
    pub fn as_raw(&self) -> &[T] {
        &self.storage
    }

    /// Mutable access to the backing store, for bulk transfers.
    ///
    /// Writing through this slice does not move the indices.
    pub fn as_raw_mut(&mut self) -> &mut [T] {
        &mut self.storage
    }
}

/// Checked reference to a buffer registered in a [`BufferPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    index: u32,
    generation: u32,
}

struct Slot<T> {
    generation: u32,
    buffer: Option<RingBuffer<T>>,
}

impl<T> Slot<T> {
    fn owns(&self, handle: BufferHandle) -> bool {
        self.generation == handle.generation && self.buffer.is_some()
    }
}

/// Registry of live ring buffers.
///
/// Owns every buffer it creates. Operations on unknown or freed handles fail
/// with [`BufferError::InvalidHandle`]; none of them panic.
pub struct BufferPool<T> {
    slots: Vec<Slot<T>>,
    live: usize,
}

impl<T: Copy + Default> Default for BufferPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default> BufferPool<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
        }
    }

    /// Creates a buffer of `capacity` and registers it.
    pub fn init(&mut self, capacity: usize) -> Result<BufferHandle, BufferError> {
        let buffer = RingBuffer::new(capacity)?;
        let index = match self.slots.iter().position(|slot| slot.buffer.is_none()) {
            Some(index) => {
                self.slots[index].buffer = Some(buffer);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    buffer: Some(buffer),
                });
                self.slots.len() - 1
            }
        };
        self.live += 1;
        Ok(BufferHandle {
            index: index as u32,
            generation: self.slots[index].generation,
        })
    }

    /// Releases the buffer behind `handle`.
    ///
    /// Returns `false` without doing anything if the handle is unknown or
    /// was already freed.
    pub fn free(&mut self, handle: BufferHandle) -> bool {
        match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.owns(handle) => {
                slot.buffer = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    /// Number of buffers currently registered.
    pub fn live(&self) -> usize {
        self.live
    }

    pub fn get(&self, handle: BufferHandle) -> Result<&RingBuffer<T>, BufferError> {
        match self.slots.get(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation => {
                slot.buffer.as_ref().ok_or(BufferError::InvalidHandle)
            }
            _ => Err(BufferError::InvalidHandle),
        }
    }

    pub fn get_mut(&mut self, handle: BufferHandle) -> Result<&mut RingBuffer<T>, BufferError> {
        match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation => {
                slot.buffer.as_mut().ok_or(BufferError::InvalidHandle)
            }
            _ => Err(BufferError::InvalidHandle),
        }
    }

    /// Borrows two distinct buffers at once, the first shared and the
    /// second mutable. Used to feed a bulk transfer.
    pub fn pair_mut(
        &mut self,
        src: BufferHandle,
        dst: BufferHandle,
    ) -> Result<(&RingBuffer<T>, &mut RingBuffer<T>), BufferError> {
        let (a, b) = (src.index as usize, dst.index as usize);
        if a == b {
            return Err(BufferError::InvalidArgument);
        }
        if a.max(b) >= self.slots.len() {
            return Err(BufferError::InvalidHandle);
        }

        let (low, high) = self.slots.split_at_mut(a.max(b));
        let (src_slot, dst_slot) = if a < b {
            (&low[a], &mut high[0])
        } else {
            (&high[0], &mut low[b])
        };

        if !src_slot.owns(src) || !dst_slot.owns(dst) {
            return Err(BufferError::InvalidHandle);
        }
        match (src_slot.buffer.as_ref(), dst_slot.buffer.as_mut()) {
            (Some(src), Some(dst)) => Ok((src, dst)),
            _ => Err(BufferError::InvalidHandle),
        }
    }

    pub fn push(&mut self, handle: BufferHandle, item: T) -> Result<(), BufferError> {
        self.get_mut(handle)?.push(item)
    }

    pub fn pop(&mut self, handle: BufferHandle) -> Result<T, BufferError> {
        self.get_mut(handle)?.pop()
    }

    /// Grows or shrinks the buffer in place. The handle stays valid.
    pub fn resize(&mut self, handle: BufferHandle, new_capacity: usize) -> Result<(), BufferError> {
        self.get_mut(handle)?.resize(new_capacity)
    }

    pub fn push_with_growth(&mut self, handle: BufferHandle, item: T) -> Result<(), BufferError> {
        self.get_mut(handle)?.push_with_growth(item)
    }

    pub fn reset(&mut self, handle: BufferHandle) -> Result<(), BufferError> {
        self.get_mut(handle)?.reset();
        Ok(())
    }

    pub fn is_empty(&self, handle: BufferHandle) -> Result<bool, BufferError> {
        Ok(self.get(handle)?.is_empty())
    }

    pub fn is_full(&self, handle: BufferHandle) -> Result<bool, BufferError> {
        Ok(self.get(handle)?.is_full())
    }

    pub fn capacity(&self, handle: BufferHandle) -> Result<usize, BufferError> {
        Ok(self.get(handle)?.capacity())
    }

    pub fn len(&self, handle: BufferHandle) -> Result<usize, BufferError> {
        Ok(self.get(handle)?.len())
    }
}
