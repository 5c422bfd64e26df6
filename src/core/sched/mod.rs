//! Scheduler
//!
//! Strict fixed-priority preemptive scheduling with FIFO ordering among
//! tasks of equal priority. Scheduling decisions run with interrupts
//! disabled; the actual register switch is deferred to the PendSV
//! handler so a decision can be taken from any ISR.

use crate::config::CFG_TASKS_RUN_PRIV;
use crate::critical::critical_section;
use crate::kernel::{self, TaskPool, CPU_STATE};
use crate::queue::WaitQueue;
use crate::task;
use crate::types::{BlockReason, TaskStatus, WakeupReason};

/// Select the next task to run and request a deferred context switch.
///
/// Runs with interrupts disabled. The running task is preempted only by
/// a ready task of equal or higher priority (equal priority hands the
/// CPU over FIFO); otherwise it keeps running.
///
/// Must be called inside a critical section.
pub(crate) fn schedule_next_task(pool: &mut TaskPool) {
    let candidate = match pool.ready_queue.head() {
        Some(candidate) => candidate,
        None => return,
    };

    if let Some(cur_ptr) = pool.current_task {
        let cur = unsafe { &mut *cur_ptr.as_ptr() };

        if cur.status == TaskStatus::Running {
            if unsafe { candidate.as_ref() }.priority <= cur.priority {
                cur.status = TaskStatus::Ready;
                pool.ready_queue.insert_by_prio(cur_ptr);
            } else {
                return;
            }
        }
    }

    let next = match pool.ready_queue.pop() {
        Some(next) => next,
        None => return,
    };
    unsafe { (*next.as_ptr()).status = TaskStatus::Running };
    pool.current_task = Some(next);

    unsafe { CPU_STATE.tcb_high_rdy = next.as_ptr() };

    // Deferred: PendSV fires once interrupts are re-enabled
    crate::port::request_context_switch();
}

/// Run the scheduler from privileged context.
///
/// Entry point shared by the privileged yield path and the SVCall
/// handler.
pub(crate) fn schedule_now() {
    critical_section(|cs| {
        schedule_next_task(kernel::TASK_POOL.get(cs));
    });
}

/// Voluntarily relinquish the CPU.
///
/// When tasks run unprivileged this traps through SVCall so the handler
/// can request the context switch from privileged mode.
pub fn os_yield() {
    if !kernel::KERNEL.is_running() {
        return;
    }

    if CFG_TASKS_RUN_PRIV {
        schedule_now();
    } else {
        crate::port::privilege_trap();
    }
}

/// Decrement the countdown of every blocked task, waking those that
/// reach zero.
///
/// Each task is visited exactly once per tick; a task woken here leaves
/// the blocked queue, so the successor is saved before the wakeup.
/// Sleeps wake with `SleepTimeout`, waits on a primitive with
/// `WaitTimeout` after being detached from the primitive's wait queue.
/// A countdown of zero means no timeout is pending.
///
/// Must be called inside a critical section.
pub(crate) fn check_timeouts(pool: &mut TaskPool) {
    let mut cursor = pool.blocked_queue.head();

    while let Some(tcb_ptr) = cursor {
        let tcb = unsafe { &mut *tcb_ptr.as_ptr() };
        cursor = tcb.sched_next_ptr;

        if tcb.remaining_ticks > 0 {
            tcb.remaining_ticks -= 1;

            if tcb.remaining_ticks == 0 {
                let reason = if tcb.blocked_reason == BlockReason::Sleep {
                    WakeupReason::SleepTimeout
                } else {
                    WakeupReason::WaitTimeout
                };

                unsafe {
                    WaitQueue::detach(tcb_ptr);
                    task::task_set_ready(pool, tcb_ptr, reason);
                }
            }
        }
    }
}
