//! Port layer - CPU-specific implementations
//!
//! Hardware abstraction for context switching, the privilege trap, the
//! initial task stack frame, and the system tick source.

#[cfg(target_arch = "arm")]
pub mod cortex_m4;

#[cfg(target_arch = "arm")]
pub use cortex_m4::*;

// Stub implementations for non-ARM targets (for host testing)
#[cfg(not(target_arch = "arm"))]
pub mod stub {
    use crate::task::TaskFn;
    use crate::types::StackElement;

    pub unsafe fn start_first_task() {
        panic!("start_first_task not available on this platform");
    }

    /// No-op for testing
    pub fn request_context_switch() {}

    /// No-op for testing
    pub fn privilege_trap() {}

    pub unsafe fn task_stack_init(
        _entry: TaskFn,
        _params: *mut (),
        stk_base: *mut StackElement,
        stk_size: usize,
    ) -> *mut StackElement {
        // Return top of stack for testing
        unsafe { stk_base.add(stk_size - 1) }
    }

    pub fn systick_init(_reload: u32) {}
}

#[cfg(not(target_arch = "arm"))]
pub use stub::*;
