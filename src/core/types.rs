//! Core type definitions for the kernel
//!
//! These types provide strong typing for the scheduler and the
//! synchronization primitives.

/// Task priority (0 = highest priority, 255 = lowest)
pub type TaskPrio = u8;

/// Tick counter type
pub type TickCount = u32;

/// Stack element type
pub type StackElement = u32;

/// Highest possible task priority
pub const TASK_HIGHEST_PRIORITY: TaskPrio = 0;

/// Lowest possible task priority (reserved for the idle task)
pub const TASK_LOWEST_PRIORITY: TaskPrio = 0xff;

/// Return immediately instead of waiting
pub const TASK_NO_WAIT: TickCount = 0;

/// Wait forever
pub const TASK_MAX_WAIT: TickCount = 0xffff_ffff;

/// Task state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TaskStatus {
    /// Task is ready to run
    Ready = 0,
    /// Task is currently executing
    Running = 1,
    /// Task is blocked waiting for an event or timeout
    Blocked = 2,
    /// Task is suspended and will not be scheduled
    Suspended = 3,
}

/// Why a task is blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BlockReason {
    None = 0,
    Sleep = 1,
    WaitSemaphore = 2,
    WaitMutex = 3,
    WaitMsgQueueData = 4,
    WaitMsgQueueSpace = 5,
    WaitCondVar = 6,
    WaitTimerTimeout = 7,
}

/// Why a blocked task was made ready again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum WakeupReason {
    None = 0,
    /// A timed wait on a primitive expired
    WaitTimeout = 1,
    /// A sleep expired
    SleepTimeout = 2,
    SemaphoreTaken = 3,
    MutexLocked = 4,
    MsgQueueDataAvailable = 5,
    MsgQueueSpaceAvailable = 6,
    CondVarSignalled = 7,
    TimerTimeout = 8,
    Resume = 9,
}

/// Software timer mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TimerMode {
    /// Fire once, then stop
    SingleShot = 0,
    /// Reload and fire on every expiry
    Periodic = 1,
}
