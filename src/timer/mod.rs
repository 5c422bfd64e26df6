//! Software timers
//!
//! Running timers sit on an intrusive singly linked list that the tick
//! handler walks, decrementing each deadline. Expired handlers are queued
//! on a fixed-capacity dispatch FIFO and executed by a dedicated
//! highest-priority timer task, so handlers run in task context, never
//! inside the tick interrupt.

use core::cell::UnsafeCell;
use core::ptr::NonNull;

use crate::config::{
    CFG_TIMER_DISPATCH_QUEUE_SIZE, CFG_TIMER_TASK_PRIO, CFG_TIMER_TASK_STK_SIZE,
};
use crate::core::cs_cell::CsCell;
use crate::critical::{critical_section, CriticalSection};
use crate::error::{KernelError, KernelResult};
use crate::kernel::TaskPool;
use crate::task::{self, Tcb};
use crate::types::{BlockReason, StackElement, TaskStatus, TickCount, TimerMode, WakeupReason};

/// Timer expiry handler, executed by the timer task
pub type TimerHandler = fn();

struct TimerNode {
    handler: TimerHandler,
    interval_ticks: TickCount,
    ticks_to_expire: TickCount,
    next: Option<NonNull<TimerNode>>,
    mode: TimerMode,
    is_running: bool,
}

/// Software timer
pub struct Timer {
    inner: UnsafeCell<TimerNode>,
}

unsafe impl Sync for Timer {}
unsafe impl Send for Timer {}

impl Timer {
    /// Create a stopped timer with the given handler and mode
    pub const fn new(handler: TimerHandler, mode: TimerMode) -> Self {
        Timer {
            inner: UnsafeCell::new(TimerNode {
                handler,
                interval_ticks: 0,
                ticks_to_expire: 0,
                next: None,
                mode,
                is_running: false,
            }),
        }
    }

    /// Start the timer with the given interval.
    ///
    /// # Errors
    /// * `Inval` - zero interval
    /// * `AlreadyActive` - the timer is already running
    pub fn start(&'static self, interval_ticks: TickCount) -> KernelResult {
        if interval_ticks == 0 {
            return Err(KernelError::Inval);
        }

        critical_section(|cs| {
            let timers = TIMERS.get(cs);
            let node = unsafe { &mut *self.inner.get() };

            if node.is_running {
                return Err(KernelError::AlreadyActive);
            }

            node.is_running = true;
            node.interval_ticks = interval_ticks;
            node.ticks_to_expire = interval_ticks;

            node.next = timers.list_head;
            timers.list_head = NonNull::new(self.inner.get());

            Ok(())
        })
    }

    /// Stop the timer and remove it from the running list.
    ///
    /// # Errors
    /// * `NotActive` - the timer is not running
    pub fn stop(&'static self) -> KernelResult {
        critical_section(|cs| {
            let timers = TIMERS.get(cs);
            let node_ptr = unsafe { NonNull::new_unchecked(self.inner.get()) };

            if !unsafe { node_ptr.as_ref() }.is_running {
                return Err(KernelError::NotActive);
            }

            unsafe {
                (*node_ptr.as_ptr()).is_running = false;
                timers.unlink(node_ptr);
            }

            Ok(())
        })
    }

    /// Check if the timer is running
    #[inline]
    pub fn is_running(&self) -> bool {
        critical_section(|_cs| unsafe { &*self.inner.get() }.is_running)
    }
}

// ============ Dispatch Queue ============

/// Fixed-capacity FIFO of expired handlers awaiting execution.
///
/// Pushed from the tick handler, drained by the timer task. Statically
/// sized: the tick path never allocates.
pub struct DispatchQueue {
    handlers: [Option<TimerHandler>; CFG_TIMER_DISPATCH_QUEUE_SIZE],
    read_index: usize,
    count: usize,
}

impl DispatchQueue {
    pub const fn new() -> Self {
        DispatchQueue {
            handlers: [None; CFG_TIMER_DISPATCH_QUEUE_SIZE],
            read_index: 0,
            count: 0,
        }
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Append a handler; returns `false` when the queue is full
    pub fn push(&mut self, handler: TimerHandler) -> bool {
        if self.count == self.handlers.len() {
            return false;
        }

        let write_index = (self.read_index + self.count) % self.handlers.len();
        self.handlers[write_index] = Some(handler);
        self.count += 1;
        true
    }

    /// Remove and return the oldest pending handler
    pub fn pop(&mut self) -> Option<TimerHandler> {
        if self.count == 0 {
            return None;
        }

        let handler = self.handlers[self.read_index].take();
        self.read_index = (self.read_index + 1) % self.handlers.len();
        self.count -= 1;
        handler
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ============ Timer Subsystem State ============

struct Timers {
    /// Head of the running-timer list
    list_head: Option<NonNull<TimerNode>>,
    /// Expired handlers awaiting the timer task
    dispatch: DispatchQueue,
}

impl Timers {
    const fn new() -> Self {
        Timers {
            list_head: None,
            dispatch: DispatchQueue::new(),
        }
    }

    /// Unlink a node from the running-timer list.
    ///
    /// # Safety
    /// `node` must be on the list.
    unsafe fn unlink(&mut self, node: NonNull<TimerNode>) {
        if self.list_head == Some(node) {
            self.list_head = unsafe { node.as_ref() }.next;
        } else {
            let mut cursor = self.list_head;
            while let Some(cur_ptr) = cursor {
                let cur = unsafe { &mut *cur_ptr.as_ptr() };
                if cur.next == Some(node) {
                    cur.next = unsafe { node.as_ref() }.next;
                    break;
                }
                cursor = cur.next;
            }
        }

        unsafe { (*node.as_ptr()).next = None };
    }
}

unsafe impl Send for Timers {}

static TIMERS: CsCell<Timers> = CsCell::new(Timers::new());

// ============ Timer Task ============

/// Timer task TCB
static mut TIMER_TCB: Tcb = Tcb::new();

/// Timer task stack
static mut TIMER_STK: [StackElement; CFG_TIMER_TASK_STK_SIZE] = [0; CFG_TIMER_TASK_STK_SIZE];

/// Timer task: drains the dispatch queue, running each expired handler
/// outside interrupt context, and blocks indefinitely while no handler
/// is pending.
fn timer_task(_: *mut ()) -> ! {
    loop {
        let handler = critical_section(|cs| TIMERS.get(cs).dispatch.pop());

        match handler {
            Some(handler) => handler(),
            None => {
                let tcb = unsafe { NonNull::new_unchecked(&raw mut TIMER_TCB) };
                task::task_block(tcb, BlockReason::WaitTimerTimeout, 0);
            }
        }
    }
}

/// Create the timer task. Called once while the scheduler starts.
pub(crate) fn timer_task_start() -> KernelResult {
    unsafe {
        task::task_create_raw(
            &raw mut TIMER_TCB,
            "timer",
            timer_task,
            core::ptr::null_mut(),
            CFG_TIMER_TASK_PRIO,
            (&raw mut TIMER_STK).cast::<StackElement>(),
            CFG_TIMER_TASK_STK_SIZE,
        )?;
    }

    Ok(())
}

// ============ Tick Processing ============

/// Walk the running timers, expiring those whose deadline hit zero.
///
/// Expired handlers are queued for the timer task, which is woken if
/// blocked; periodic timers reload, single-shot timers are stopped and
/// unlinked. The successor pointer is saved before a node is touched
/// because a single-shot expiry unlinks the node mid-walk.
///
/// Called from the tick handler inside its critical section.
pub(crate) fn process_timers(cs: &CriticalSection, pool: &mut TaskPool) {
    let timers = TIMERS.get(cs);

    let mut cursor = timers.list_head;
    while let Some(node_ptr) = cursor {
        let node = unsafe { &mut *node_ptr.as_ptr() };
        cursor = node.next;

        if node.ticks_to_expire > 0 {
            node.ticks_to_expire -= 1;
        }

        if node.ticks_to_expire == 0 {
            let queued = timers.dispatch.push(node.handler);
            debug_assert!(queued, "timer dispatch queue overflow");

            let timer_tcb = unsafe { NonNull::new_unchecked(&raw mut TIMER_TCB) };
            if unsafe { timer_tcb.as_ref() }.status == TaskStatus::Blocked {
                unsafe { task::task_set_ready(pool, timer_tcb, WakeupReason::TimerTimeout) };
            }

            node.ticks_to_expire = node.interval_ticks;

            if node.mode == TimerMode::SingleShot {
                node.is_running = false;
                unsafe { timers.unlink(node_ptr) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler_a() {}
    fn handler_b() {}

    #[test]
    fn dispatch_queue_is_fifo() {
        let mut q = DispatchQueue::new();
        assert!(q.is_empty());
        assert!(q.pop().is_none());

        assert!(q.push(handler_a));
        assert!(q.push(handler_b));

        assert_eq!(q.pop().unwrap() as usize, handler_a as usize);
        assert_eq!(q.pop().unwrap() as usize, handler_b as usize);
        assert!(q.is_empty());
    }

    #[test]
    fn dispatch_queue_rejects_overflow() {
        let mut q = DispatchQueue::new();

        for _ in 0..CFG_TIMER_DISPATCH_QUEUE_SIZE {
            assert!(q.push(handler_a));
        }
        assert!(!q.push(handler_b));

        // Draining one slot makes room again
        assert!(q.pop().is_some());
        assert!(q.push(handler_b));
    }

    #[test]
    fn dispatch_queue_wraps() {
        let mut q = DispatchQueue::new();

        for round in 0..(2 * CFG_TIMER_DISPATCH_QUEUE_SIZE) {
            assert!(q.push(if round % 2 == 0 { handler_a } else { handler_b }));
            let popped = q.pop().unwrap();
            let expected = if round % 2 == 0 { handler_a } else { handler_b };
            assert_eq!(popped as usize, expected as usize);
        }
        assert!(q.is_empty());
    }
}
