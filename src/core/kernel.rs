//! Global kernel state and initialization
//!
//! The process-wide singletons: kernel flags, the task pool (ready queue,
//! blocked queue, current task), the CPU context-switch state shared with
//! the PendSV handler, and the idle task.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::config::CFG_IDLE_STK_SIZE;
use crate::critical::critical_section;
use crate::core::cs_cell::CsCell;
use crate::error::{KernelError, KernelResult};
use crate::queue::TaskQueue;
use crate::task::Tcb;
use crate::types::{StackElement, TaskStatus, TickCount, TASK_LOWEST_PRIORITY};

// ============ Kernel Flags ============

/// Atomic kernel flags
pub struct KernelFlags {
    initialized: AtomicBool,
    running: AtomicBool,
    tick_counter: AtomicU32,
}

impl KernelFlags {
    const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            running: AtomicBool::new(false),
            tick_counter: AtomicU32::new(0),
        }
    }

    pub(crate) fn reset(&self) {
        self.initialized.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        self.tick_counter.store(0, Ordering::SeqCst);
    }

    /// Check if the kernel is running
    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Check if the kernel is initialized
    #[inline(always)]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Get the current tick count
    #[inline(always)]
    pub fn tick_get(&self) -> TickCount {
        self.tick_counter.load(Ordering::Relaxed)
    }

    /// Increment and return the tick count
    #[inline(always)]
    pub(crate) fn tick_increment(&self) -> TickCount {
        self.tick_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline(always)]
    pub(crate) fn set_initialized(&self, val: bool) {
        self.initialized.store(val, Ordering::SeqCst);
    }

    #[inline(always)]
    pub(crate) fn set_running(&self, val: bool) {
        self.running.store(val, Ordering::SeqCst);
    }
}

/// Global kernel flags instance
pub(crate) static KERNEL: KernelFlags = KernelFlags::new();

// ============ Task Pool ============

/// Scheduler task pool: the two scheduler queues plus the running task
pub struct TaskPool {
    /// Tasks ready to run, sorted by priority, FIFO within a priority
    pub(crate) ready_queue: TaskQueue,
    /// Blocked tasks, unsorted; scanned by the tick handler
    pub(crate) blocked_queue: TaskQueue,
    /// The task currently selected to run
    pub(crate) current_task: Option<NonNull<Tcb>>,
}

impl TaskPool {
    const fn new() -> Self {
        Self {
            ready_queue: TaskQueue::new(),
            blocked_queue: TaskQueue::new(),
            current_task: None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.ready_queue.init();
        self.blocked_queue.init();
        self.current_task = None;
    }
}

/// Global task pool instance
pub(crate) static TASK_POOL: CsCell<TaskPool> = CsCell::new(TaskPool::new());

// ============ CPU / Context Switch State ============

/// CPU context-switch state shared with the PendSV handler.
///
/// `tcb_cur` is the task whose registers live on the CPU; it is updated
/// by PendSV itself. The scheduler only ever writes `tcb_high_rdy`.
#[repr(C)]
pub struct CpuState {
    /// TCB of the task currently holding the register file
    pub tcb_cur: *mut Tcb,
    /// TCB selected to run next
    pub tcb_high_rdy: *mut Tcb,
}

impl CpuState {
    pub const fn new() -> Self {
        Self {
            tcb_cur: core::ptr::null_mut(),
            tcb_high_rdy: core::ptr::null_mut(),
        }
    }
}

/// Global CPU state instance, referenced from the PendSV handler
#[no_mangle]
#[used]
pub static mut CPU_STATE: CpuState = CpuState::new();

// ============ Idle Task ============

/// Idle task TCB
static mut IDLE_TCB: Tcb = Tcb::new();

/// Idle task stack
static mut IDLE_STK: [StackElement; CFG_IDLE_STK_SIZE] = [0; CFG_IDLE_STK_SIZE];

/// Idle task: lowest priority, never blocks, keeps the ready queue
/// non-empty whenever every application task is waiting.
fn idle_task(_: *mut ()) -> ! {
    loop {
        #[cfg(target_arch = "arm")]
        cortex_m::asm::nop();
    }
}

pub(crate) fn idle_tcb_ptr() -> *mut Tcb {
    unsafe { &raw mut IDLE_TCB }
}

// ============ Initialization ============

unsafe fn reset_globals() {
    KERNEL.reset();

    unsafe {
        CPU_STATE.tcb_cur = core::ptr::null_mut();
        CPU_STATE.tcb_high_rdy = core::ptr::null_mut();
        TASK_POOL.get_unchecked().reset();
    }
}

/// Initialize the kernel.
///
/// Must be called before any other kernel function. Resets the task pool
/// and creates the idle task.
pub fn os_init() -> KernelResult {
    if KERNEL.is_running() {
        return Err(KernelError::AlreadyActive);
    }

    unsafe { reset_globals() };

    unsafe {
        crate::task::task_create_raw(
            &raw mut IDLE_TCB,
            "idle",
            idle_task,
            core::ptr::null_mut(),
            TASK_LOWEST_PRIORITY,
            (&raw mut IDLE_STK).cast::<StackElement>(),
            CFG_IDLE_STK_SIZE,
        )?;
    }

    KERNEL.set_initialized(true);

    Ok(())
}

/// Start the scheduler.
///
/// Starts the timer task, selects the highest-priority ready task,
/// configures the system tick, and switches the CPU into the first task.
/// Does not return under normal operation.
pub fn os_start() -> KernelResult {
    if !KERNEL.is_initialized() {
        return Err(KernelError::Inval);
    }

    if KERNEL.is_running() {
        return Err(KernelError::AlreadyActive);
    }

    #[cfg(feature = "timer")]
    crate::timer::timer_task_start()?;

    critical_section(|cs| {
        let pool = TASK_POOL.get(cs);

        let first = pool.ready_queue.pop().ok_or(KernelError::NoTask)?;

        unsafe {
            (*first.as_ptr()).status = TaskStatus::Running;
            CPU_STATE.tcb_high_rdy = first.as_ptr();
        }
        pool.current_task = Some(first);

        Ok(())
    })?;

    KERNEL.set_running(true);

    crate::info!("scheduler started");

    crate::port::systick_init(crate::config::CFG_TICK_INTERVAL_CPU_CYCLES);

    unsafe { crate::port::start_first_task() };

    Ok(())
}
