//! Critical section handling
//!
//! Every scheduler data structure is protected by globally disabling
//! interrupts. On a single core this is the only synchronization the
//! kernel needs: no per-object locks, no spinlocks.

/// RAII guard for critical sections
///
/// When this guard is created, interrupts are disabled.
/// When it is dropped, the previous interrupt state is restored, so
/// critical sections nest correctly and can be entered from ISRs.
pub struct CriticalSection {
    irq_was_enabled: bool,
}

impl CriticalSection {
    /// Enter a critical section by disabling interrupts.
    ///
    /// Returns a guard that restores the previous interrupt state when
    /// dropped.
    #[inline(always)]
    pub fn enter() -> Self {
        #[cfg(target_arch = "arm")]
        {
            let irq_was_enabled = cortex_m::register::primask::read().is_active();
            cortex_m::interrupt::disable();
            CriticalSection { irq_was_enabled }
        }

        #[cfg(not(target_arch = "arm"))]
        CriticalSection { irq_was_enabled: false }
    }
}

impl Drop for CriticalSection {
    #[inline(always)]
    fn drop(&mut self) {
        #[cfg(target_arch = "arm")]
        if self.irq_was_enabled {
            unsafe { cortex_m::interrupt::enable() };
        }

        #[cfg(not(target_arch = "arm"))]
        let _ = self.irq_was_enabled;
    }
}

/// Execute a closure with interrupts disabled
///
/// The closure receives a reference to the critical section guard,
/// which can be used to access [`CsCell`](crate::core::cs_cell::CsCell)
/// protected data.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&CriticalSection) -> R,
{
    let cs = CriticalSection::enter();
    f(&cs)
}

/// Check if currently executing in an ISR context
#[inline]
pub fn is_isr_context() -> bool {
    #[cfg(target_arch = "arm")]
    {
        let ipsr: u32;
        unsafe {
            core::arch::asm!(
                "mrs {}, IPSR",
                out(reg) ipsr,
                options(nomem, nostack, preserves_flags)
            );
        }
        ipsr != 0
    }

    #[cfg(not(target_arch = "arm"))]
    {
        false
    }
}
