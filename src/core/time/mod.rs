//! Time management
//!
//! Tick handling, task sleep, and tick/time conversions.

use crate::config::CFG_TICK_INTERVAL_US;
use crate::critical::{is_isr_context, CriticalSection};
use crate::error::{KernelError, KernelResult};
use crate::kernel;
use crate::sched;
use crate::task;
use crate::types::{BlockReason, TaskStatus, TickCount};

/// Convert milliseconds to kernel ticks
#[inline]
pub const fn ms_to_ticks(ms: u32) -> TickCount {
    ((ms as u64 * 1000) / CFG_TICK_INTERVAL_US as u64) as TickCount
}

/// Convert microseconds to kernel ticks
#[inline]
pub const fn us_to_ticks(us: u32) -> TickCount {
    (us / CFG_TICK_INTERVAL_US) as TickCount
}

/// Get the current tick count
#[inline]
pub fn os_tick_get() -> TickCount {
    kernel::KERNEL.tick_get()
}

/// Block the calling task for the given number of ticks.
///
/// A zero-tick sleep returns immediately.
pub fn os_sleep_ticks(ticks: TickCount) -> KernelResult {
    if !kernel::KERNEL.is_running() {
        return Err(KernelError::NotActive);
    }

    if is_isr_context() {
        return Err(KernelError::Inval);
    }

    if ticks == 0 {
        return Ok(());
    }

    let current = task::os_current_task().ok_or(KernelError::NoTask)?;

    if current.status() != TaskStatus::Running {
        return Err(KernelError::NotActive);
    }

    task::task_block(current.0, BlockReason::Sleep, ticks);

    Ok(())
}

/// Block the calling task for the given number of milliseconds
pub fn os_sleep_ms(ms: u32) -> KernelResult {
    os_sleep_ticks(ms_to_ticks(ms))
}

/// Block the calling task for the given number of microseconds
pub fn os_sleep_us(us: u32) -> KernelResult {
    os_sleep_ticks(us_to_ticks(us))
}

/// System tick handler.
///
/// Drives all timeout accounting: expires software timers, wakes blocked
/// tasks whose countdown reached zero, then lets the scheduler decide
/// whether a context switch is due.
pub fn os_tick_handler() {
    if !kernel::KERNEL.is_running() {
        return;
    }

    kernel::KERNEL.tick_increment();

    let cs = CriticalSection::enter();
    let pool = kernel::TASK_POOL.get(&cs);

    #[cfg(feature = "timer")]
    crate::timer::process_timers(&cs, pool);

    if !pool.blocked_queue.is_empty() {
        sched::check_timeouts(pool);
    }

    sched::schedule_next_task(pool);
}

/// SysTick interrupt handler
#[no_mangle]
pub extern "C" fn SysTick() {
    os_tick_handler();
}
