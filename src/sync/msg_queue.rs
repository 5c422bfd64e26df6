//! Bounded message queue
//!
//! Fixed-size items in a statically allocated ring buffer, FIFO order.
//! Full queues apply backpressure to senders and empty queues to
//! receivers, each side with its own wait queue.
//!
//! The non-blocking paths (`TASK_NO_WAIT`) may be used from an ISR.

use core::cell::UnsafeCell;

use crate::critical::{critical_section, is_isr_context, CriticalSection};
use crate::error::{KernelError, KernelResult};
use crate::kernel;
use crate::queue::WaitQueue;
use crate::task;
use crate::types::{BlockReason, TickCount, WakeupReason, TASK_NO_WAIT};

/// Ring buffer bookkeeping for fixed-size items.
///
/// Indices are byte offsets into a buffer of `queue_length × item_size`
/// bytes and advance by whole items, wrapping at the buffer end.
pub struct MsgRing {
    buffer: *mut u8,
    buffer_len: usize,
    item_size: usize,
    queue_length: usize,
    read_index: usize,
    write_index: usize,
    item_count: usize,
}

impl MsgRing {
    /// Create an empty, unbound ring
    pub const fn new() -> Self {
        MsgRing {
            buffer: core::ptr::null_mut(),
            buffer_len: 0,
            item_size: 0,
            queue_length: 0,
            read_index: 0,
            write_index: 0,
            item_count: 0,
        }
    }

    /// Bind the ring to its backing storage
    pub fn init(&mut self, buffer: *mut u8, buffer_len: usize, item_size: usize) {
        self.buffer = buffer;
        self.buffer_len = buffer_len;
        self.item_size = item_size;
        self.queue_length = buffer_len / item_size;
        self.read_index = 0;
        self.write_index = 0;
        self.item_count = 0;
    }

    /// Item slot size in bytes
    #[inline(always)]
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Number of items currently queued
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.item_count
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.item_count == self.queue_length
    }

    /// Copy one item into the ring at the write index.
    ///
    /// # Safety
    /// The ring must not be full; `item` must be readable for
    /// `item_size` bytes.
    pub unsafe fn write(&mut self, item: *const u8) {
        debug_assert!(!self.is_full());

        unsafe {
            core::ptr::copy_nonoverlapping(item, self.buffer.add(self.write_index), self.item_size);
        }
        self.write_index = (self.write_index + self.item_size) % self.buffer_len;
        self.item_count += 1;
    }

    /// Copy one item out of the ring at the read index.
    ///
    /// # Safety
    /// The ring must not be empty; `out` must be writable for
    /// `item_size` bytes.
    pub unsafe fn read(&mut self, out: *mut u8) {
        debug_assert!(!self.is_empty());

        unsafe {
            core::ptr::copy_nonoverlapping(self.buffer.add(self.read_index), out, self.item_size);
        }
        self.read_index = (self.read_index + self.item_size) % self.buffer_len;
        self.item_count -= 1;
    }
}

unsafe impl Send for MsgRing {}
unsafe impl Sync for MsgRing {}

struct MsgQueueState {
    ring: MsgRing,
    /// Senders waiting for space
    producer_wait: WaitQueue,
    /// Receivers waiting for data
    consumer_wait: WaitQueue,
}

/// Bounded FIFO message queue of fixed-size items
pub struct MsgQueue {
    inner: UnsafeCell<MsgQueueState>,
}

unsafe impl Sync for MsgQueue {}
unsafe impl Send for MsgQueue {}

impl MsgQueue {
    /// Create an empty message queue; bind storage with [`MsgQueue::create`]
    pub const fn new() -> Self {
        MsgQueue {
            inner: UnsafeCell::new(MsgQueueState {
                ring: MsgRing::new(),
                producer_wait: WaitQueue::new(),
                consumer_wait: WaitQueue::new(),
            }),
        }
    }

    /// Bind the queue to its backing buffer.
    ///
    /// The queue holds `buffer.len() / item_size` items; the buffer
    /// length must be a non-zero multiple of `item_size`.
    pub fn create(&self, buffer: &'static mut [u8], item_size: usize) -> KernelResult {
        if item_size == 0 || buffer.is_empty() || buffer.len() % item_size != 0 {
            return Err(KernelError::Inval);
        }

        critical_section(|_cs| {
            let q = unsafe { &mut *self.inner.get() };
            q.ring.init(buffer.as_mut_ptr(), buffer.len(), item_size);
            q.producer_wait.init();
            q.consumer_wait.init();
            Ok(())
        })
    }

    /// Send one item, waiting up to `wait_ticks` ticks for space.
    ///
    /// # Errors
    /// * `Inval` - `item` length differs from the configured item size
    /// * `Full` - queue is full and `wait_ticks` is `TASK_NO_WAIT`
    /// * `Timeout` - no space became available within the wait
    pub fn send(&self, item: &[u8], wait_ticks: TickCount) -> KernelResult {
        let cs = CriticalSection::enter();
        let q = unsafe { &mut *self.inner.get() };

        if item.len() != q.ring.item_size() {
            return Err(KernelError::Inval);
        }

        if !q.ring.is_full() {
            Self::write_and_wake(q, &cs, item);
            return Ok(());
        }

        if wait_ticks == TASK_NO_WAIT {
            return Err(KernelError::Full);
        }

        debug_assert!(!is_isr_context());

        let pool = kernel::TASK_POOL.get(&cs);
        let cur_ptr = pool.current_task.ok_or(KernelError::NoTask)?;

        q.producer_wait.insert_by_prio(cur_ptr);
        drop(cs);

        task::task_block(cur_ptr, BlockReason::WaitMsgQueueSpace, wait_ticks);

        critical_section(|cs| {
            let q = unsafe { &mut *self.inner.get() };
            let woken_for_space =
                unsafe { cur_ptr.as_ref() }.wakeup_reason == WakeupReason::MsgQueueSpaceAvailable;

            if woken_for_space && !q.ring.is_full() {
                Self::write_and_wake(q, cs, item);
                Ok(())
            } else {
                unsafe { WaitQueue::detach(cur_ptr) };
                Err(KernelError::Timeout)
            }
        })
    }

    /// Receive one item, waiting up to `wait_ticks` ticks for data.
    ///
    /// # Errors
    /// * `Inval` - `out` length differs from the configured item size
    /// * `Empty` - queue is empty and `wait_ticks` is `TASK_NO_WAIT`
    /// * `Timeout` - no data arrived within the wait
    pub fn receive(&self, out: &mut [u8], wait_ticks: TickCount) -> KernelResult {
        let cs = CriticalSection::enter();
        let q = unsafe { &mut *self.inner.get() };

        if out.len() != q.ring.item_size() {
            return Err(KernelError::Inval);
        }

        if !q.ring.is_empty() {
            Self::read_and_wake(q, &cs, out);
            return Ok(());
        }

        if wait_ticks == TASK_NO_WAIT {
            return Err(KernelError::Empty);
        }

        debug_assert!(!is_isr_context());

        let pool = kernel::TASK_POOL.get(&cs);
        let cur_ptr = pool.current_task.ok_or(KernelError::NoTask)?;

        q.consumer_wait.insert_by_prio(cur_ptr);
        drop(cs);

        task::task_block(cur_ptr, BlockReason::WaitMsgQueueData, wait_ticks);

        critical_section(|cs| {
            let q = unsafe { &mut *self.inner.get() };
            let woken_for_data =
                unsafe { cur_ptr.as_ref() }.wakeup_reason == WakeupReason::MsgQueueDataAvailable;

            if woken_for_data && !q.ring.is_empty() {
                Self::read_and_wake(q, cs, out);
                Ok(())
            } else {
                unsafe { WaitQueue::detach(cur_ptr) };
                Err(KernelError::Timeout)
            }
        })
    }

    /// Check if the queue is full
    pub fn is_full(&self) -> bool {
        critical_section(|_cs| unsafe { &*self.inner.get() }.ring.is_full())
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        critical_section(|_cs| unsafe { &*self.inner.get() }.ring.is_empty())
    }

    /// Write an item, then hand the new data to one waiting receiver
    fn write_and_wake(q: &mut MsgQueueState, cs: &CriticalSection, item: &[u8]) {
        unsafe { q.ring.write(item.as_ptr()) };

        if let Some(consumer) = q.consumer_wait.pop() {
            let pool = kernel::TASK_POOL.get(cs);
            unsafe { task::task_set_ready(pool, consumer, WakeupReason::MsgQueueDataAvailable) };
        }
    }

    /// Read an item, then tell one waiting sender about the free slot
    fn read_and_wake(q: &mut MsgQueueState, cs: &CriticalSection, out: &mut [u8]) {
        unsafe { q.ring.read(out.as_mut_ptr()) };

        if let Some(producer) = q.producer_wait.pop() {
            let pool = kernel::TASK_POOL.get(cs);
            unsafe { task::task_set_ready(pool, producer, WakeupReason::MsgQueueSpaceAvailable) };
        }
    }
}

impl Default for MsgQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_wraps_and_counts() {
        let mut storage = [0u8; 8];
        let mut ring = MsgRing::new();
        ring.init(storage.as_mut_ptr(), storage.len(), 4);

        assert!(ring.is_empty());
        assert!(!ring.is_full());

        unsafe { ring.write([1u8, 2, 3, 4].as_ptr()) };
        unsafe { ring.write([5u8, 6, 7, 8].as_ptr()) };
        assert!(ring.is_full());
        assert_eq!(ring.len(), 2);

        let mut out = [0u8; 4];
        unsafe { ring.read(out.as_mut_ptr()) };
        assert_eq!(out, [1, 2, 3, 4]);

        // Third write lands where the first item was read out
        unsafe { ring.write([9u8, 10, 11, 12].as_ptr()) };
        assert!(ring.is_full());

        unsafe { ring.read(out.as_mut_ptr()) };
        assert_eq!(out, [5, 6, 7, 8]);
        unsafe { ring.read(out.as_mut_ptr()) };
        assert_eq!(out, [9, 10, 11, 12]);
        assert!(ring.is_empty());
    }

    #[test]
    fn ring_is_fifo_across_many_items() {
        let mut storage = [0u8; 6];
        let mut ring = MsgRing::new();
        ring.init(storage.as_mut_ptr(), storage.len(), 2);

        for round in 0u8..10 {
            unsafe { ring.write([round, round + 1].as_ptr()) };
            let mut out = [0u8; 2];
            unsafe { ring.read(out.as_mut_ptr()) };
            assert_eq!(out, [round, round + 1]);
        }
        assert!(ring.is_empty());
    }
}
