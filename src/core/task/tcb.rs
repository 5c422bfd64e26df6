//! Task Control Block (TCB) definition
//!
//! The TCB contains all the kernel-visible state for a task.

use core::ptr::NonNull;

use crate::queue::WaitQueue;
use crate::task::TaskFn;
use crate::types::{BlockReason, StackElement, TaskPrio, TaskStatus, TickCount, WakeupReason};

/// Task Control Block
///
/// `stack_ptr` must stay the first field: the PendSV handler stores the
/// outgoing task's stack pointer through it.
#[repr(C)]
pub struct Tcb {
    /// Saved process stack pointer, written only during a context switch
    pub stack_ptr: *mut StackElement,

    /// Base of the task stack
    pub stack_base: *mut StackElement,
    /// Stack size in words
    pub stack_size: usize,

    /// Task name
    pub name: &'static str,

    // ============ Scheduler queue links (ready or blocked queue) ============
    pub sched_next_ptr: Option<NonNull<Tcb>>,
    pub sched_prev_ptr: Option<NonNull<Tcb>>,

    // ============ Wait queue links (primitive wait queues) ============
    pub wait_next_ptr: Option<NonNull<Tcb>>,
    pub wait_prev_ptr: Option<NonNull<Tcb>>,
    /// Wait queue this task currently sits on, null if none
    pub wait_queue_ptr: *mut WaitQueue,

    /// Task entry point
    pub entry: Option<TaskFn>,
    /// Opaque argument passed to the entry point
    pub params: *mut (),

    /// Task priority (0 = highest)
    pub priority: TaskPrio,
    /// Current task state
    pub status: TaskStatus,
    /// Why the task is blocked
    pub blocked_reason: BlockReason,
    /// Why the task was last made ready
    pub wakeup_reason: WakeupReason,
    /// Ticks remaining before a timed wait expires; 0 = no countdown pending
    pub remaining_ticks: TickCount,
}

impl Tcb {
    /// Create a new, uninitialized TCB
    pub const fn new() -> Self {
        Tcb {
            stack_ptr: core::ptr::null_mut(),
            stack_base: core::ptr::null_mut(),
            stack_size: 0,

            name: "",

            sched_next_ptr: None,
            sched_prev_ptr: None,

            wait_next_ptr: None,
            wait_prev_ptr: None,
            wait_queue_ptr: core::ptr::null_mut(),

            entry: None,
            params: core::ptr::null_mut(),

            priority: 0,
            status: TaskStatus::Ready,
            blocked_reason: BlockReason::None,
            wakeup_reason: WakeupReason::None,
            remaining_ticks: 0,
        }
    }

    /// Reset the TCB to default values
    pub fn init(&mut self) {
        *self = Self::new();
    }

    /// Check if the task is ready to run
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.status == TaskStatus::Ready
    }

    /// Check if the task is blocked
    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.status == TaskStatus::Blocked
    }

    /// Check if the task is suspended
    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.status == TaskStatus::Suspended
    }
}

impl Default for Tcb {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for Tcb {}
unsafe impl Sync for Tcb {}
