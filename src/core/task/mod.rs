//! Task management
//!
//! Task creation and the state transitions between ready, running,
//! blocked, and suspended.

mod tcb;

pub use tcb::Tcb;

use core::ptr::NonNull;

use crate::config::CFG_STK_SIZE_MIN;
use crate::critical::{critical_section, is_isr_context};
use crate::error::{KernelError, KernelResult};
use crate::kernel::{self, TaskPool};
use crate::queue::WaitQueue;
use crate::sched;
use crate::types::{BlockReason, StackElement, TaskPrio, TaskStatus, TickCount, WakeupReason};

/// Task entry point function type
pub type TaskFn = fn(*mut ()) -> !;

/// Copyable handle to a created task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRef(pub(crate) NonNull<Tcb>);

// SAFETY: the referenced TCB is 'static and only mutated in critical sections
unsafe impl Send for TaskRef {}

impl TaskRef {
    /// Task name
    pub fn name(&self) -> &'static str {
        unsafe { self.0.as_ref() }.name
    }

    /// Current task priority (may differ from the creation priority while
    /// the task holds a contended mutex)
    pub fn priority(&self) -> TaskPrio {
        critical_section(|_cs| unsafe { self.0.as_ref() }.priority)
    }

    /// Current task status
    pub fn status(&self) -> TaskStatus {
        critical_section(|_cs| unsafe { self.0.as_ref() }.status)
    }

    /// Reason the task was last woken
    pub fn wakeup_reason(&self) -> WakeupReason {
        critical_section(|_cs| unsafe { self.0.as_ref() }.wakeup_reason)
    }
}

/// Handle to the currently running task, `None` before the scheduler starts
pub fn os_current_task() -> Option<TaskRef> {
    critical_section(|cs| kernel::TASK_POOL.get(cs).current_task.map(TaskRef))
}

/// Create a task and make it ready to run.
///
/// The task does not execute before [`os_start`](crate::os_start) is
/// called; afterwards newly created tasks compete for the CPU by
/// priority immediately.
///
/// # Example
/// ```ignore
/// static mut WORKER_TCB: Tcb = Tcb::new();
/// static mut WORKER_STK: [StackElement; 256] = [0; 256];
///
/// fn worker(_: *mut ()) -> ! {
///     loop { /* ... */ }
/// }
///
/// // In main:
/// let worker = os_task_create(
///     unsafe { &mut WORKER_TCB },
///     unsafe { &mut WORKER_STK },
///     "worker",
///     worker,
///     core::ptr::null_mut(),
///     5,
/// ).expect("task creation failed");
/// ```
pub fn os_task_create(
    tcb: &'static mut Tcb,
    stack: &'static mut [StackElement],
    name: &'static str,
    entry: TaskFn,
    params: *mut (),
    priority: TaskPrio,
) -> KernelResult<TaskRef> {
    if is_isr_context() {
        return Err(KernelError::Inval);
    }

    unsafe {
        task_create_raw(
            tcb as *mut Tcb,
            name,
            entry,
            params,
            priority,
            stack.as_mut_ptr(),
            stack.len(),
        )
    }
}

/// Internal task creation used for the idle and timer tasks as well.
///
/// # Safety
/// `tcb` and `stk_base..stk_base+stk_size` must be valid for the life of
/// the program and not in use by another task.
pub(crate) unsafe fn task_create_raw(
    tcb: *mut Tcb,
    name: &'static str,
    entry: TaskFn,
    params: *mut (),
    priority: TaskPrio,
    stk_base: *mut StackElement,
    stk_size: usize,
) -> KernelResult<TaskRef> {
    if tcb.is_null() || stk_base.is_null() {
        return Err(KernelError::Inval);
    }

    if stk_size < CFG_STK_SIZE_MIN {
        return Err(KernelError::Inval);
    }

    critical_section(|cs| {
        let tcb_ref = unsafe { &mut *tcb };
        tcb_ref.init();

        tcb_ref.name = name;
        tcb_ref.priority = priority;
        tcb_ref.entry = Some(entry);
        tcb_ref.params = params;
        tcb_ref.status = TaskStatus::Ready;

        // Seed the synthetic exception frame the first context restore loads
        let stk_ptr = unsafe { crate::port::task_stack_init(entry, params, stk_base, stk_size) };
        tcb_ref.stack_ptr = stk_ptr;
        tcb_ref.stack_base = stk_base;
        tcb_ref.stack_size = stk_size;

        let tcb_nonnull = unsafe { NonNull::new_unchecked(tcb) };
        let pool = kernel::TASK_POOL.get(cs);
        pool.ready_queue.insert_by_prio(tcb_nonnull);

        if kernel::KERNEL.is_running() {
            sched::schedule_next_task(pool);
        }

        Ok(TaskRef(tcb_nonnull))
    })
}

/// Block a task and give the CPU away.
///
/// `ticks` bounds the wait; [`TASK_MAX_WAIT`](crate::types::TASK_MAX_WAIT)
/// disables the tick countdown entirely. The caller must be the task
/// being blocked; control returns here only once the task is next
/// selected to run.
pub(crate) fn task_block(tcb: NonNull<Tcb>, reason: BlockReason, ticks: TickCount) {
    debug_assert!(!is_isr_context());

    critical_section(|cs| {
        let pool = kernel::TASK_POOL.get(cs);
        debug_assert!(pool.current_task == Some(tcb));

        let tcb_ref = unsafe { &mut *tcb.as_ptr() };
        tcb_ref.remaining_ticks = if ticks == crate::types::TASK_MAX_WAIT { 0 } else { ticks };
        tcb_ref.status = TaskStatus::Blocked;
        tcb_ref.blocked_reason = reason;
        tcb_ref.wakeup_reason = WakeupReason::None;

        // The blocked queue is scanned, never popped by priority
        pool.blocked_queue.push_front(tcb);
    });

    sched::os_yield();
}

/// Move a blocked (or resumed) task to the ready queue.
///
/// The single wakeup path: dequeues from the blocked queue, stamps the
/// wakeup reason, clears any pending countdown, and enqueues by priority.
/// The task is not scheduled here; the next `schedule_next_task` decides.
///
/// # Safety
/// Must run inside a critical section. A task still sitting on a
/// primitive's wait queue must be detached by the caller first.
pub(crate) unsafe fn task_set_ready(pool: &mut TaskPool, tcb: NonNull<Tcb>, reason: WakeupReason) {
    let tcb_ref = unsafe { &mut *tcb.as_ptr() };

    if tcb_ref.status == TaskStatus::Blocked {
        pool.blocked_queue.remove(tcb);
    }

    tcb_ref.status = TaskStatus::Ready;
    tcb_ref.blocked_reason = BlockReason::None;
    tcb_ref.wakeup_reason = reason;
    tcb_ref.remaining_ticks = 0;

    pool.ready_queue.insert_by_prio(tcb);
}

/// Change a task's effective priority, keeping the ready queue sorted.
///
/// # Safety
/// Must run inside a critical section.
#[cfg(feature = "mutex")]
pub(crate) unsafe fn task_set_priority(pool: &mut TaskPool, tcb: NonNull<Tcb>, priority: TaskPrio) {
    let tcb_ref = unsafe { &mut *tcb.as_ptr() };

    if tcb_ref.priority == priority {
        return;
    }

    if tcb_ref.status == TaskStatus::Ready {
        pool.ready_queue.remove(tcb);
        tcb_ref.priority = priority;
        pool.ready_queue.insert_by_prio(tcb);
    } else {
        tcb_ref.priority = priority;
    }
}

/// Suspend a task.
///
/// The task is detached from the scheduler queues and from any primitive
/// wait queue it sits on; signals targeting it are suppressed until it is
/// resumed. Suspending the running task yields immediately.
pub fn os_task_suspend(task: TaskRef) -> KernelResult {
    if is_isr_context() {
        return Err(KernelError::Inval);
    }

    let tcb = task.0;

    let is_current = critical_section(|cs| {
        let pool = kernel::TASK_POOL.get(cs);

        if tcb.as_ptr() == kernel::idle_tcb_ptr() {
            return Err(KernelError::Inval);
        }

        let tcb_ref = unsafe { &mut *tcb.as_ptr() };
        match tcb_ref.status {
            TaskStatus::Ready => pool.ready_queue.remove(tcb),
            TaskStatus::Blocked => {
                pool.blocked_queue.remove(tcb);
                unsafe { WaitQueue::detach(tcb) };
            }
            TaskStatus::Running | TaskStatus::Suspended => {}
        }

        tcb_ref.remaining_ticks = 0;
        tcb_ref.status = TaskStatus::Suspended;
        tcb_ref.blocked_reason = BlockReason::None;
        tcb_ref.wakeup_reason = WakeupReason::None;

        Ok(pool.current_task == Some(tcb))
    })?;

    if is_current {
        sched::os_yield();
    }

    Ok(())
}

/// Resume a suspended task.
///
/// The task becomes ready with wakeup reason `Resume` and competes for
/// the CPU at the next scheduling point.
pub fn os_task_resume(task: TaskRef) -> KernelResult {
    critical_section(|cs| {
        let pool = kernel::TASK_POOL.get(cs);
        let tcb_ref = unsafe { task.0.as_ref() };

        if tcb_ref.status != TaskStatus::Suspended {
            return Err(KernelError::NotSuspended);
        }

        unsafe { task_set_ready(pool, task.0, WakeupReason::Resume) };
        Ok(())
    })
}
