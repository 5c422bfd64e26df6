//! Error types for the kernel
//!
//! Uses Rust's Result pattern instead of C-style integer return codes.
//! Discriminants mirror the classic negative errno-style values so a
//! failed call can still be reported over a C ABI if needed.

/// Kernel error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(i16)]
pub enum KernelError {
    /// Invalid argument or invalid operation
    Inval = -1,
    /// Wait timeout expired
    Timeout = -2,
    /// No data available (empty queue)
    Empty = -3,
    /// No space available (full queue)
    Full = -4,
    /// No task available
    NoTask = -5,
    /// Resource busy, would have to wait
    Busy = -6,
    /// Caller does not own the mutex
    NotOwner = -7,
    /// Timer or task is not running
    NotActive = -8,
    /// Timer or task is already running
    AlreadyActive = -9,
    /// Task is not suspended
    NotSuspended = -10,
    /// Semaphore already at its maximum count
    NoSem = -11,
    /// Mutex is not locked
    NotLocked = -12,
}

/// Result type alias for kernel operations
pub type KernelResult<T = ()> = Result<T, KernelError>;

impl KernelError {
    /// Numeric code of this error
    #[inline]
    pub fn code(self) -> i16 {
        self as i16
    }
}
