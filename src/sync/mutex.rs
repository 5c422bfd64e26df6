//! Mutex with priority inheritance
//!
//! Ownership-tracked mutual exclusion. While a high-priority task waits,
//! the owner borrows the waiter's priority so an unrelated
//! middle-priority task cannot keep the lock holder off the CPU.
//!
//! Because mutexes track the identity of the current task, none of these
//! operations may be called from an ISR.

use core::cell::UnsafeCell;
use core::ptr::NonNull;

use crate::config::CFG_MUTEX_PRIO_INHERIT;
use crate::critical::{critical_section, is_isr_context, CriticalSection};
use crate::error::{KernelError, KernelResult};
use crate::kernel;
use crate::queue::WaitQueue;
use crate::sched;
use crate::task::{self, Tcb};
use crate::types::{BlockReason, TaskPrio, TickCount, WakeupReason, TASK_NO_WAIT};

/// Marker for "no inherited priority outstanding"
const NO_SAVED_PRIO: i16 = -1;

struct MutexState {
    /// Locked iff an owner is assigned
    locked: bool,
    /// Task holding the mutex
    owner: Option<NonNull<Tcb>>,
    /// The owner's own priority while it runs with a borrowed one,
    /// `NO_SAVED_PRIO` otherwise. Kept per-mutex so nested holds restore
    /// independently.
    owner_default_priority: i16,
    /// Tasks waiting to lock, highest priority first
    wait_queue: WaitQueue,
}

/// Mutex with optional priority inheritance
pub struct Mutex {
    inner: UnsafeCell<MutexState>,
}

unsafe impl Sync for Mutex {}
unsafe impl Send for Mutex {}

impl Mutex {
    /// Create a new unlocked mutex
    pub const fn new() -> Self {
        Mutex {
            inner: UnsafeCell::new(MutexState {
                locked: false,
                owner: None,
                owner_default_priority: NO_SAVED_PRIO,
                wait_queue: WaitQueue::new(),
            }),
        }
    }

    /// Lock the mutex, waiting up to `wait_ticks` ticks.
    ///
    /// # Errors
    /// * `Busy` - locked by another task and `wait_ticks` is `TASK_NO_WAIT`
    /// * `Timeout` - the wait expired before the mutex was handed over
    pub fn lock(&self, wait_ticks: TickCount) -> KernelResult {
        debug_assert!(!is_isr_context());

        let cs = CriticalSection::enter();
        let pool = kernel::TASK_POOL.get(&cs);
        let m = unsafe { &mut *self.inner.get() };

        let cur_ptr = pool.current_task.ok_or(KernelError::NoTask)?;

        if CFG_MUTEX_PRIO_INHERIT {
            if let Some(owner_ptr) = m.owner {
                let cur_prio = unsafe { cur_ptr.as_ref() }.priority;
                let owner_prio = unsafe { owner_ptr.as_ref() }.priority;

                if cur_prio < owner_prio {
                    // Only the first inheriting waiter saves the default;
                    // later, stricter waiters just raise the owner further
                    if m.owner_default_priority == NO_SAVED_PRIO {
                        m.owner_default_priority = owner_prio as i16;
                    }
                    unsafe { task::task_set_priority(pool, owner_ptr, cur_prio) };
                }
            }
        }

        if !m.locked {
            m.locked = true;
            m.owner = Some(cur_ptr);
            return Ok(());
        }

        if wait_ticks == TASK_NO_WAIT {
            return Err(KernelError::Busy);
        }

        m.wait_queue.insert_by_prio(cur_ptr);
        drop(cs);

        task::task_block(cur_ptr, BlockReason::WaitMutex, wait_ticks);

        critical_section(|_cs| {
            let m = unsafe { &mut *self.inner.get() };
            let cur = unsafe { cur_ptr.as_ref() };

            if cur.wakeup_reason == WakeupReason::MutexLocked && m.owner == Some(cur_ptr) {
                Ok(())
            } else {
                unsafe { WaitQueue::detach(cur_ptr) };
                Err(KernelError::Timeout)
            }
        })
    }

    /// Unlock the mutex.
    ///
    /// Restores the owner's priority if it was boosted, then hands the
    /// mutex directly to the highest-priority waiter, yielding when that
    /// waiter should run in the caller's place.
    ///
    /// # Errors
    /// * `NotOwner` - the calling task does not own the mutex
    /// * `NotLocked` - the mutex is not locked
    pub fn unlock(&self) -> KernelResult {
        debug_assert!(!is_isr_context());

        let mut switch_required = false;

        let result = critical_section(|cs| {
            let pool = kernel::TASK_POOL.get(cs);
            let m = unsafe { &mut *self.inner.get() };

            let cur_ptr = pool.current_task.ok_or(KernelError::NoTask)?;

            if m.owner != Some(cur_ptr) {
                return Err(KernelError::NotOwner);
            }

            if !m.locked {
                return Err(KernelError::NotLocked);
            }

            if CFG_MUTEX_PRIO_INHERIT && m.owner_default_priority != NO_SAVED_PRIO {
                let default_prio = m.owner_default_priority as TaskPrio;
                unsafe { task::task_set_priority(pool, cur_ptr, default_prio) };
                m.owner_default_priority = NO_SAVED_PRIO;
            }

            match m.wait_queue.pop() {
                Some(next_owner) => {
                    m.owner = Some(next_owner);
                    unsafe { task::task_set_ready(pool, next_owner, WakeupReason::MutexLocked) };

                    let cur_prio = unsafe { cur_ptr.as_ref() }.priority;
                    if unsafe { next_owner.as_ref() }.priority <= cur_prio {
                        switch_required = true;
                    }
                }
                None => {
                    m.locked = false;
                    m.owner = None;
                }
            }

            Ok(())
        });

        if result.is_ok() && switch_required {
            sched::os_yield();
        }

        result
    }

    /// Check if the mutex is currently locked
    #[inline]
    pub fn is_locked(&self) -> bool {
        critical_section(|_cs| unsafe { &*self.inner.get() }.locked)
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}
