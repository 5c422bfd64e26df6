//! Condition variable
//!
//! Waiters atomically release the associated mutex, block until signalled
//! or timed out, and re-acquire the mutex before returning. The mutex is
//! supplied at construction and must be held by every caller of `wait`.
//!
//! Must not be used from an ISR.

use core::cell::UnsafeCell;

use crate::critical::{critical_section, is_isr_context, CriticalSection};
use crate::kernel;
use crate::queue::WaitQueue;
use crate::sync::mutex::Mutex;
use crate::task;
use crate::types::{BlockReason, TaskStatus, TickCount, WakeupReason, TASK_MAX_WAIT};

/// Condition variable bound to a mutex
pub struct CondVar {
    mutex: &'static Mutex,
    wait_queue: UnsafeCell<WaitQueue>,
}

unsafe impl Sync for CondVar {}
unsafe impl Send for CondVar {}

impl CondVar {
    /// Create a condition variable over the given mutex
    pub const fn new(mutex: &'static Mutex) -> Self {
        CondVar {
            mutex,
            wait_queue: UnsafeCell::new(WaitQueue::new()),
        }
    }

    /// Release the mutex and wait to be signalled.
    ///
    /// The caller must hold the associated mutex. On wakeup the mutex is
    /// re-acquired (waiting as long as necessary) before returning.
    ///
    /// Returns `true` if the task was signalled, `false` on timeout or
    /// when the caller did not hold the mutex.
    pub fn wait(&self, wait_ticks: TickCount) -> bool {
        debug_assert!(!is_isr_context());

        if self.mutex.unlock().is_err() {
            return false;
        }

        let cs = CriticalSection::enter();
        let pool = kernel::TASK_POOL.get(&cs);

        let cur_ptr = match pool.current_task {
            Some(cur) => cur,
            None => return false,
        };

        unsafe { &mut *self.wait_queue.get() }.insert_by_prio(cur_ptr);
        drop(cs);

        task::task_block(cur_ptr, BlockReason::WaitCondVar, wait_ticks);

        // Signalled or timed out; either way, reclaim the mutex first
        let _ = self.mutex.lock(TASK_MAX_WAIT);

        critical_section(|_cs| {
            let cur = unsafe { cur_ptr.as_ref() };
            if cur.wakeup_reason == WakeupReason::WaitTimeout {
                unsafe { WaitQueue::detach(cur_ptr) };
                false
            } else {
                true
            }
        })
    }

    /// Wake the highest-priority waiter.
    ///
    /// Returns `true` if a task was signalled, `false` if no task was
    /// waiting.
    pub fn signal(&self) -> bool {
        critical_section(|cs| {
            let queue = unsafe { &mut *self.wait_queue.get() };

            match queue.pop() {
                Some(waiter) => {
                    let pool = kernel::TASK_POOL.get(cs);
                    unsafe { task::task_set_ready(pool, waiter, WakeupReason::CondVarSignalled) };
                    true
                }
                None => false,
            }
        })
    }

    /// Wake every waiter. Suspended tasks are drained but not made ready.
    ///
    /// Returns `true` if the wait queue was non-empty.
    pub fn broadcast(&self) -> bool {
        critical_section(|cs| {
            let queue = unsafe { &mut *self.wait_queue.get() };
            let pool = kernel::TASK_POOL.get(cs);

            let mut signalled = false;
            while let Some(waiter) = queue.pop() {
                signalled = true;
                if unsafe { waiter.as_ref() }.status != TaskStatus::Suspended {
                    unsafe { task::task_set_ready(pool, waiter, WakeupReason::CondVarSignalled) };
                }
            }

            signalled
        })
    }
}
