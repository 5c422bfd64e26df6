//! Compile-time configuration for the kernel
//!
//! These constants control the behavior and resource limits of the RTOS.

use crate::types::TaskPrio;

/// Whether application tasks run in privileged mode.
///
/// When `false`, `os_yield` traps into privileged mode through the SVCall
/// exception before requesting a context switch.
pub const CFG_TASKS_RUN_PRIV: bool = true;

/// Enable priority inheritance for mutexes
pub const CFG_MUTEX_PRIO_INHERIT: bool = true;

/// Interval between two system ticks in microseconds
pub const CFG_TICK_INTERVAL_US: u32 = 1000;

/// CPU core clock in Hz, used to derive the SysTick reload value
pub const CFG_CPU_CLOCK_HZ: u32 = 16_000_000;

/// Number of CPU cycles between two system ticks
pub const CFG_TICK_INTERVAL_CPU_CYCLES: u32 =
    (CFG_CPU_CLOCK_HZ as u64 * CFG_TICK_INTERVAL_US as u64 / 1_000_000) as u32;

/// Minimum task stack size in words
pub const CFG_STK_SIZE_MIN: usize = 32;

/// Idle task stack size in words
pub const CFG_IDLE_STK_SIZE: usize = 64;

/// Timer task stack size in words
pub const CFG_TIMER_TASK_STK_SIZE: usize = 128;

/// Timer task priority. The timer task runs above every application task
/// so expired handlers are not starved.
pub const CFG_TIMER_TASK_PRIO: TaskPrio = 0;

/// Capacity of the expired-handler dispatch queue
pub const CFG_TIMER_DISPATCH_QUEUE_SIZE: usize = 16;
