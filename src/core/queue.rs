//! Intrusive task queues
//!
//! Two doubly linked list types thread tasks through link fields embedded
//! in the TCB:
//!
//! - [`TaskQueue`] uses the scheduler links and backs the ready queue and
//!   the blocked queue.
//! - [`WaitQueue`] uses the wait links and backs every primitive's wait
//!   queue. A task blocked on a primitive sits in the blocked queue *and*
//!   that primitive's wait queue at the same time, which is why the two
//!   link families are separate.
//!
//! Within each family a task is a member of at most one queue; that
//! discipline is maintained by the kernel, not checked here. All
//! operations must run inside a critical section.

use core::ptr::NonNull;

use crate::task::Tcb;

/// Queue of tasks linked through the scheduler link fields.
///
/// `insert_by_prio` keeps the list sorted by ascending priority value
/// (highest priority first) with FIFO order among equal priorities, so
/// `pop` always returns the highest-priority, longest-waiting task.
/// `push_front` is the unsorted insertion used by the blocked queue,
/// which is only ever iterated.
pub struct TaskQueue {
    head: Option<NonNull<Tcb>>,
    tail: Option<NonNull<Tcb>>,
}

impl TaskQueue {
    /// Create a new empty queue
    pub const fn new() -> Self {
        TaskQueue { head: None, tail: None }
    }

    /// Reset the queue
    pub fn init(&mut self) {
        self.head = None;
        self.tail = None;
    }

    /// Check if the queue is empty
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// First task in the queue without removing it
    #[inline(always)]
    pub fn head(&self) -> Option<NonNull<Tcb>> {
        self.head
    }

    /// Insert sorted by ascending priority value, after any tasks of
    /// equal priority.
    ///
    /// # Safety contract
    /// `tcb` must be valid and not currently in any scheduler queue.
    pub fn insert_by_prio(&mut self, tcb: NonNull<Tcb>) {
        let prio = unsafe { tcb.as_ref() }.priority;

        let mut current = self.head;
        let mut prev: Option<NonNull<Tcb>> = None;

        while let Some(cur_ptr) = current {
            let cur_ref = unsafe { cur_ptr.as_ref() };
            if prio < cur_ref.priority {
                break;
            }
            prev = current;
            current = cur_ref.sched_next_ptr;
        }

        let tcb_ref = unsafe { &mut *tcb.as_ptr() };
        tcb_ref.sched_prev_ptr = prev;
        tcb_ref.sched_next_ptr = current;

        match prev {
            Some(p) => unsafe { (*p.as_ptr()).sched_next_ptr = Some(tcb) },
            None => self.head = Some(tcb),
        }

        match current {
            Some(c) => unsafe { (*c.as_ptr()).sched_prev_ptr = Some(tcb) },
            None => self.tail = Some(tcb),
        }
    }

    /// Insert at the front, unsorted
    pub fn push_front(&mut self, tcb: NonNull<Tcb>) {
        let tcb_ref = unsafe { &mut *tcb.as_ptr() };

        tcb_ref.sched_prev_ptr = None;
        tcb_ref.sched_next_ptr = self.head;

        match self.head {
            Some(head) => unsafe { (*head.as_ptr()).sched_prev_ptr = Some(tcb) },
            None => self.tail = Some(tcb),
        }

        self.head = Some(tcb);
    }

    /// Remove and return the first task
    pub fn pop(&mut self) -> Option<NonNull<Tcb>> {
        let head = self.head?;
        self.remove(head);
        Some(head)
    }

    /// Remove a specific task from the queue
    pub fn remove(&mut self, tcb: NonNull<Tcb>) {
        let tcb_ref = unsafe { &mut *tcb.as_ptr() };

        match tcb_ref.sched_prev_ptr {
            Some(prev) => unsafe { (*prev.as_ptr()).sched_next_ptr = tcb_ref.sched_next_ptr },
            None => self.head = tcb_ref.sched_next_ptr,
        }

        match tcb_ref.sched_next_ptr {
            Some(next) => unsafe { (*next.as_ptr()).sched_prev_ptr = tcb_ref.sched_prev_ptr },
            None => self.tail = tcb_ref.sched_prev_ptr,
        }

        tcb_ref.sched_prev_ptr = None;
        tcb_ref.sched_next_ptr = None;
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: only modified within critical sections
unsafe impl Send for TaskQueue {}
unsafe impl Sync for TaskQueue {}

/// Queue of tasks waiting on a synchronization primitive, linked through
/// the wait link fields.
///
/// Insertion records the owning queue in the TCB so the tick handler and
/// `os_task_suspend` can detach a waiter without knowing which primitive
/// it sits on. `pop` and `remove` clear that back-pointer.
pub struct WaitQueue {
    head: Option<NonNull<Tcb>>,
    tail: Option<NonNull<Tcb>>,
}

impl WaitQueue {
    /// Create a new empty wait queue
    pub const fn new() -> Self {
        WaitQueue { head: None, tail: None }
    }

    /// Reset the queue
    pub fn init(&mut self) {
        self.head = None;
        self.tail = None;
    }

    /// Check if the queue is empty
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Insert sorted by ascending priority value, after any waiters of
    /// equal priority, and record the owning queue in the TCB.
    pub fn insert_by_prio(&mut self, tcb: NonNull<Tcb>) {
        let prio = unsafe { tcb.as_ref() }.priority;

        let mut current = self.head;
        let mut prev: Option<NonNull<Tcb>> = None;

        while let Some(cur_ptr) = current {
            let cur_ref = unsafe { cur_ptr.as_ref() };
            if prio < cur_ref.priority {
                break;
            }
            prev = current;
            current = cur_ref.wait_next_ptr;
        }

        let tcb_ref = unsafe { &mut *tcb.as_ptr() };
        tcb_ref.wait_prev_ptr = prev;
        tcb_ref.wait_next_ptr = current;
        tcb_ref.wait_queue_ptr = self as *mut WaitQueue;

        match prev {
            Some(p) => unsafe { (*p.as_ptr()).wait_next_ptr = Some(tcb) },
            None => self.head = Some(tcb),
        }

        match current {
            Some(c) => unsafe { (*c.as_ptr()).wait_prev_ptr = Some(tcb) },
            None => self.tail = Some(tcb),
        }
    }

    /// Remove and return the highest-priority waiter
    pub fn pop(&mut self) -> Option<NonNull<Tcb>> {
        let head = self.head?;
        self.remove(head);
        Some(head)
    }

    /// Remove a specific waiter and clear its back-pointer
    pub fn remove(&mut self, tcb: NonNull<Tcb>) {
        let tcb_ref = unsafe { &mut *tcb.as_ptr() };

        match tcb_ref.wait_prev_ptr {
            Some(prev) => unsafe { (*prev.as_ptr()).wait_next_ptr = tcb_ref.wait_next_ptr },
            None => self.head = tcb_ref.wait_next_ptr,
        }

        match tcb_ref.wait_next_ptr {
            Some(next) => unsafe { (*next.as_ptr()).wait_prev_ptr = tcb_ref.wait_prev_ptr },
            None => self.tail = tcb_ref.wait_prev_ptr,
        }

        tcb_ref.wait_prev_ptr = None;
        tcb_ref.wait_next_ptr = None;
        tcb_ref.wait_queue_ptr = core::ptr::null_mut();
    }

    /// Detach a task from whatever wait queue it is on, if any.
    ///
    /// Used by the timeout scan and by task suspension, which know only
    /// the task, not the primitive it waits on.
    ///
    /// # Safety
    /// Must run inside a critical section; the recorded queue pointer, if
    /// non-null, must still reference a live wait queue.
    pub unsafe fn detach(tcb: NonNull<Tcb>) {
        let queue = unsafe { tcb.as_ref() }.wait_queue_ptr;
        if !queue.is_null() {
            unsafe { (*queue).remove(tcb) };
        }
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: only modified within critical sections
unsafe impl Send for WaitQueue {}
unsafe impl Sync for WaitQueue {}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcbs<const N: usize>(prios: [u8; N]) -> [Tcb; N] {
        let mut tcbs = core::array::from_fn(|_| Tcb::new());
        for (tcb, prio) in tcbs.iter_mut().zip(prios) {
            tcb.priority = prio;
        }
        tcbs
    }

    #[test]
    fn priority_order_with_fifo_ties() {
        let mut t = tcbs([20, 5, 10, 5, 0]);
        let mut q = TaskQueue::new();

        for tcb in t.iter_mut() {
            q.insert_by_prio(NonNull::from(tcb));
        }

        // 0, then first 5 inserted, then second 5, then 10, then 20
        let order: [*const Tcb; 5] = [&t[4], &t[1], &t[3], &t[2], &t[0]];
        for expected in order {
            assert_eq!(q.pop().unwrap().as_ptr() as *const Tcb, expected);
        }
        assert!(q.is_empty());
    }

    #[test]
    fn push_front_is_lifo() {
        let mut t = tcbs([1, 2, 3]);
        let mut q = TaskQueue::new();

        for tcb in t.iter_mut() {
            q.push_front(NonNull::from(tcb));
        }

        assert_eq!(q.pop().unwrap().as_ptr() as *const Tcb, &t[2] as *const Tcb);
        assert_eq!(q.pop().unwrap().as_ptr() as *const Tcb, &t[1] as *const Tcb);
        assert_eq!(q.pop().unwrap().as_ptr() as *const Tcb, &t[0] as *const Tcb);
    }

    #[test]
    fn remove_middle_relinks() {
        let mut t = tcbs([1, 2, 3]);
        let mut q = TaskQueue::new();

        for tcb in t.iter_mut() {
            q.insert_by_prio(NonNull::from(tcb));
        }

        q.remove(NonNull::from(&mut t[1]));

        assert_eq!(q.pop().unwrap().as_ptr() as *const Tcb, &t[0] as *const Tcb);
        assert_eq!(q.pop().unwrap().as_ptr() as *const Tcb, &t[2] as *const Tcb);
        assert!(q.is_empty());
    }

    #[test]
    fn wait_queue_records_and_clears_owner() {
        let mut t = tcbs([3, 1]);
        let mut q = WaitQueue::new();

        q.insert_by_prio(NonNull::from(&mut t[0]));
        q.insert_by_prio(NonNull::from(&mut t[1]));
        assert_eq!(t[0].wait_queue_ptr, &mut q as *mut WaitQueue);

        let popped = q.pop().unwrap();
        assert_eq!(popped.as_ptr() as *const Tcb, &t[1] as *const Tcb);
        assert!(t[1].wait_queue_ptr.is_null());

        unsafe { WaitQueue::detach(NonNull::from(&mut t[0])) };
        assert!(t[0].wait_queue_ptr.is_null());
        assert!(q.is_empty());

        // Detaching a task that is on no wait queue is a no-op
        unsafe { WaitQueue::detach(NonNull::from(&mut t[0])) };
    }
}
