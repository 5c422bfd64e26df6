//! Synchronization primitives
//!
//! Mutexes (with priority inheritance), counting semaphores, condition
//! variables, and bounded message queues.

#[cfg(feature = "sem")]
pub mod sem;

#[cfg(feature = "mutex")]
pub mod mutex;

#[cfg(feature = "condvar")]
pub mod condvar;

#[cfg(feature = "msg-queue")]
pub mod msg_queue;
