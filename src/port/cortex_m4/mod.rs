//! Cortex-M4 port
//!
//! Context switching via the PendSV exception, the privilege trap via
//! SVCall, and the SysTick tick source.

#![allow(named_asm_labels)]

use core::arch::{asm, naked_asm};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;

use crate::config::CFG_TASKS_RUN_PRIV;
use crate::task::TaskFn;
use crate::types::StackElement;

/// Initialize the SysTick timer as the kernel tick source
///
/// # Arguments
/// * `reload` - CPU cycles between two ticks
pub fn systick_init(reload: u32) {
    let mut p = unsafe { cortex_m::Peripherals::steal() };

    p.SYST.set_reload(reload - 1);
    p.SYST.clear_current();
    p.SYST.set_clock_source(SystClkSource::Core);
    p.SYST.enable_interrupt();
    p.SYST.enable_counter();
}

/// Switch the CPU into the first scheduled task.
///
/// Moves thread mode onto the first task's process stack, drops
/// privilege when tasks run unprivileged, and calls the entry function
/// directly; the synthetic frame on that stack is never consumed. Every
/// later switch goes through PendSV. Does not return.
#[no_mangle]
pub unsafe extern "C" fn start_first_task() {
    unsafe {
        let mut scb = cortex_m::Peripherals::steal().SCB;

        // PendSV and SysTick at the lowest priority so switches tail-chain
        // behind every other interrupt
        scb.set_priority(SystemHandler::PendSV, 0xF0);
        scb.set_priority(SystemHandler::SysTick, 0xF0);

        let first = crate::kernel::CPU_STATE.tcb_high_rdy;
        crate::kernel::CPU_STATE.tcb_cur = first;

        // Thread mode switches to the process stack; exceptions keep
        // running on the main stack inherited from reset
        asm!("msr psp, {0}", in(reg) (*first).stack_ptr as u32);

        // SPSEL = PSP, nPRIV per configuration. Unprivileged tasks must
        // yield through SVCall from here on.
        let control: u32 = if CFG_TASKS_RUN_PRIV { 0x02 } else { 0x03 };
        asm!("msr CONTROL, {0}", "isb", in(reg) control);

        match (*first).entry {
            Some(entry) => entry((*first).params),
            None => loop {
                cortex_m::asm::wfi();
            },
        }
    }
}

/// Request a deferred context switch
#[inline(always)]
pub fn request_context_switch() {
    cortex_m::peripheral::SCB::set_pendsv();
}

/// Trap into privileged mode so the SVCall handler can schedule
#[inline(always)]
pub fn privilege_trap() {
    unsafe {
        asm!("svc 0xff");
    }
}

/// Initial register frame stored on a task stack
///
/// Matches what PendSV saves and restores: the software-saved R4-R11 and
/// EXC_RETURN below the hardware exception frame.
#[repr(C, align(4))]
struct InitialFrame {
    r4: u32,
    r5: u32,
    r6: u32,
    r7: u32,
    r8: u32,
    r9: u32,
    r10: u32,
    r11: u32,
    exc_return: u32,
    r0: u32,
    r1: u32,
    r2: u32,
    r3: u32,
    r12: u32,
    lr: u32,
    pc: u32,
    xpsr: u32,
}

const FRAME_WORDS: usize = 17;

/// Seed a task stack with a synthetic exception frame so the first
/// context restore drops straight into the task entry.
pub unsafe fn task_stack_init(
    entry: TaskFn,
    params: *mut (),
    stk_base: *mut StackElement,
    stk_size: usize,
) -> *mut StackElement {
    unsafe {
        let stk_top = stk_base.add(stk_size);
        // AAPCS: stack 8-byte aligned at the frame boundary
        let stk_aligned = ((stk_top as usize) & !7) as *mut u32;

        let frame_ptr = stk_aligned.sub(FRAME_WORDS) as *mut InitialFrame;

        (*frame_ptr) = InitialFrame {
            r4: 0x04040404,
            r5: 0x05050505,
            r6: 0x06060606,
            r7: 0x07070707,
            r8: 0x08080808,
            r9: 0x09090909,
            r10: 0x10101010,
            r11: 0x11111111,
            exc_return: 0xFFFF_FFFD, // thread mode, PSP
            r0: params as u32,
            r1: 0,
            r2: 0,
            r3: 0,
            r12: 0,
            lr: task_return_trap as *const () as u32,
            pc: (entry as usize as u32) | 1, // thumb bit
            xpsr: 0x0100_0000,
        };

        // Point 4 bytes below the frame to match PendSV's "add r0, r0, #4"
        (frame_ptr as *mut u32).sub(1) as *mut StackElement
    }
}

/// Helper called from PendSV to swap TCB pointers.
/// Returns the incoming task's stack pointer.
#[inline(never)]
#[no_mangle]
unsafe extern "C" fn pendsv_switch_context(cur_sp: *mut u32) -> *mut u32 {
    unsafe {
        let outgoing = crate::kernel::CPU_STATE.tcb_cur;

        if !outgoing.is_null() {
            (*outgoing).stack_ptr = cur_sp;
        }

        crate::kernel::CPU_STATE.tcb_cur = crate::kernel::CPU_STATE.tcb_high_rdy;

        let incoming = crate::kernel::CPU_STATE.tcb_cur;

        if incoming.is_null() {
            core::ptr::null_mut()
        } else {
            (*incoming).stack_ptr
        }
    }
}

/// PendSV exception handler - performs the actual context switch
///
/// 1. Save R4-R11, LR to the current task's PSP (skipped when no task
///    was running yet)
/// 2. Call `pendsv_switch_context` to swap TCB pointers
/// 3. Restore R4-R11, LR from the new task's stack
/// 4. Exception return
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    use crate::kernel::CPU_STATE;

    naked_asm!(
        "cpsid i",
        "dsb",
        "isb",

        "mrs r0, psp",

        "ldr r1, ={cpu_state}",
        "ldr r1, [r1]",
        "cbz r1, 1f",

        "stmdb r0!, {{r4-r11, lr}}",

        "sub r0, r0, #4",

        "1:",
        "bl pendsv_switch_context",

        "cbz r0, 2f",
        "add r0, r0, #4",
        "ldmia r0!, {{r4-r11, lr}}",

        "msr psp, r0",

        "2:",
        "cpsie i",
        "dsb",
        "isb",

        "bx lr",

        cpu_state = sym CPU_STATE,
    );
}

/// SVCall exception handler - privilege trap target.
///
/// Entered from unprivileged thread mode via `svc`; schedules the next
/// task and requests the deferred switch from privileged handler mode.
#[no_mangle]
pub extern "C" fn SVCall() {
    crate::sched::schedule_now();
}

/// Executed if a task entry function ever returns
#[no_mangle]
fn task_return_trap() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}
