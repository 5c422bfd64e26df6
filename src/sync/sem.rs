//! Counting semaphore
//!
//! Semaphores hand a give directly to the highest-priority waiter when
//! one exists: the count is not incremented, so a binary semaphore keeps
//! mutual exclusion even when give and take race.
//!
//! `give` may be called from an ISR; `take` may be called from an ISR
//! only with `TASK_NO_WAIT`.

use core::cell::UnsafeCell;

use crate::critical::{critical_section, is_isr_context, CriticalSection};
use crate::error::{KernelError, KernelResult};
use crate::kernel;
use crate::queue::WaitQueue;
use crate::task;
use crate::types::{BlockReason, TickCount, WakeupReason, TASK_NO_WAIT};

struct SemState {
    count: u32,
    max_count: u32,
    wait_queue: WaitQueue,
}

/// Counting semaphore
pub struct Semaphore {
    inner: UnsafeCell<SemState>,
}

unsafe impl Sync for Semaphore {}
unsafe impl Send for Semaphore {}

impl Semaphore {
    /// Create a new semaphore with the given initial and maximum counts
    pub const fn new(initial_count: u32, max_count: u32) -> Self {
        Semaphore {
            inner: UnsafeCell::new(SemState {
                count: initial_count,
                max_count,
                wait_queue: WaitQueue::new(),
            }),
        }
    }

    /// Take the semaphore, waiting up to `wait_ticks` ticks.
    ///
    /// # Errors
    /// * `Busy` - count is zero and `wait_ticks` is `TASK_NO_WAIT`
    /// * `Timeout` - the wait expired before the semaphore was given
    pub fn take(&self, wait_ticks: TickCount) -> KernelResult {
        let cs = CriticalSection::enter();
        let s = unsafe { &mut *self.inner.get() };

        if s.count > 0 {
            s.count -= 1;
            return Ok(());
        }

        if wait_ticks == TASK_NO_WAIT {
            return Err(KernelError::Busy);
        }

        debug_assert!(!is_isr_context());

        let pool = kernel::TASK_POOL.get(&cs);
        let cur_ptr = pool.current_task.ok_or(KernelError::NoTask)?;

        s.wait_queue.insert_by_prio(cur_ptr);
        drop(cs);

        task::task_block(cur_ptr, BlockReason::WaitSemaphore, wait_ticks);

        critical_section(|_cs| {
            if unsafe { cur_ptr.as_ref() }.wakeup_reason == WakeupReason::SemaphoreTaken {
                Ok(())
            } else {
                unsafe { WaitQueue::detach(cur_ptr) };
                Err(KernelError::Timeout)
            }
        })
    }

    /// Give the semaphore.
    ///
    /// A waiting task receives the give directly and the count stays
    /// unchanged; with no waiter the count is incremented.
    ///
    /// # Errors
    /// * `NoSem` - the count is already at its maximum
    pub fn give(&self) -> KernelResult {
        critical_section(|cs| {
            let s = unsafe { &mut *self.inner.get() };

            if s.count == s.max_count {
                return Err(KernelError::NoSem);
            }

            match s.wait_queue.pop() {
                Some(waiter) => {
                    let pool = kernel::TASK_POOL.get(cs);
                    unsafe { task::task_set_ready(pool, waiter, WakeupReason::SemaphoreTaken) };
                }
                None => s.count += 1,
            }

            Ok(())
        })
    }

    /// Current semaphore count
    #[inline]
    pub fn count(&self) -> u32 {
        critical_section(|_cs| unsafe { &*self.inner.get() }.count)
    }
}
