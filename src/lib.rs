//! kestrel, a small preemptive RTOS kernel for ARM Cortex-M
//!
//! Provides:
//! - Fixed-priority preemptive scheduling of statically defined tasks
//! - Synchronization primitives: mutex (with priority inheritance),
//!   counting semaphore, condition variable, bounded message queue
//! - Tick-driven software timers executed by a dedicated timer task
//! - Deferred context switching via PendSV

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod port;
pub mod sync;
#[cfg(feature = "timer")]
pub mod timer;

// ============ Re-exports ============

pub use core::config;
pub use core::config::*;
pub use core::critical;
pub use core::error;
pub use core::error::{KernelError, KernelResult};
pub use core::kernel;
pub use core::kernel::{os_init, os_start};
pub use core::queue;
pub use core::sched;
pub use core::sched::os_yield;
pub use core::task;
pub use core::task::{os_task_create, os_task_resume, os_task_suspend};
pub use core::time;
pub use core::time::{os_sleep_ms, os_sleep_us, os_tick_get};
pub use core::types;
pub use core::types::*;

#[cfg(feature = "sem")]
pub use sync::sem;
#[cfg(feature = "mutex")]
pub use sync::mutex;
#[cfg(feature = "condvar")]
pub use sync::condvar;
#[cfg(feature = "msg-queue")]
pub use sync::msg_queue;
