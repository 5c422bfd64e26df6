//! Unit tests for core kernel modules
//!
//! These tests run on the host (not the embedded target) to verify the
//! core data structures and the non-blocking API paths. Scheduling paths
//! that need a live context switch only run on target hardware.

#[cfg(test)]
mod queue_tests {
    use core::ptr::NonNull;

    use kestrel::queue::{TaskQueue, WaitQueue};
    use kestrel::task::Tcb;

    fn leaked_tcb(prio: u8) -> NonNull<Tcb> {
        let tcb = Box::leak(Box::new(Tcb::new()));
        tcb.priority = prio;
        NonNull::from(tcb)
    }

    #[test]
    fn test_pop_order_is_priority_then_fifo() {
        let mut q = TaskQueue::new();

        let t10_first = leaked_tcb(10);
        let t5 = leaked_tcb(5);
        let t10_second = leaked_tcb(10);
        let t0 = leaked_tcb(0);

        q.insert_by_prio(t10_first);
        q.insert_by_prio(t5);
        q.insert_by_prio(t10_second);
        q.insert_by_prio(t0);

        assert_eq!(q.pop(), Some(t0));
        assert_eq!(q.pop(), Some(t5));
        assert_eq!(q.pop(), Some(t10_first));
        assert_eq!(q.pop(), Some(t10_second));
        assert_eq!(q.pop(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn test_head_does_not_remove() {
        let mut q = TaskQueue::new();
        let t = leaked_tcb(3);

        q.insert_by_prio(t);
        assert_eq!(q.head(), Some(t));
        assert!(!q.is_empty());
        assert_eq!(q.pop(), Some(t));
    }

    #[test]
    fn test_blocked_queue_iteration_order() {
        let mut q = TaskQueue::new();

        let t1 = leaked_tcb(1);
        let t2 = leaked_tcb(2);
        let t3 = leaked_tcb(3);

        // push_front is the blocked-queue insertion: unsorted, LIFO
        q.push_front(t1);
        q.push_front(t2);
        q.push_front(t3);

        let mut seen = Vec::new();
        let mut cursor = q.head();
        while let Some(tcb) = cursor {
            seen.push(tcb);
            cursor = unsafe { tcb.as_ref() }.sched_next_ptr;
        }
        assert_eq!(seen, vec![t3, t2, t1]);
    }

    #[test]
    fn test_scheduler_and_wait_links_are_independent() {
        let mut blocked = TaskQueue::new();
        let mut waiters = WaitQueue::new();

        let t = leaked_tcb(7);

        // A task blocked on a primitive is in both queues at once
        blocked.push_front(t);
        waiters.insert_by_prio(t);

        blocked.remove(t);
        assert!(blocked.is_empty());
        assert!(!waiters.is_empty());

        assert_eq!(waiters.pop(), Some(t));
        assert!(unsafe { t.as_ref() }.wait_queue_ptr.is_null());
    }

    #[test]
    fn test_wait_queue_detach_by_back_pointer() {
        let mut waiters = WaitQueue::new();

        let high = leaked_tcb(1);
        let low = leaked_tcb(9);

        waiters.insert_by_prio(low);
        waiters.insert_by_prio(high);

        unsafe { WaitQueue::detach(high) };
        assert_eq!(waiters.pop(), Some(low));
        assert!(waiters.is_empty());
    }
}

#[cfg(test)]
mod msg_ring_tests {
    use kestrel::msg_queue::MsgRing;

    #[test]
    fn test_item_count_tracks_reads_and_writes() {
        let mut storage = [0u8; 12];
        let mut ring = MsgRing::new();
        ring.init(storage.as_mut_ptr(), storage.len(), 4);

        assert!(ring.is_empty());

        unsafe { ring.write([0xAAu8; 4].as_ptr()) };
        unsafe { ring.write([0xBBu8; 4].as_ptr()) };
        assert_eq!(ring.len(), 2);
        assert!(!ring.is_full());

        unsafe { ring.write([0xCCu8; 4].as_ptr()) };
        assert!(ring.is_full());

        let mut out = [0u8; 4];
        unsafe { ring.read(out.as_mut_ptr()) };
        assert_eq!(out, [0xAA; 4]);
        assert_eq!(ring.len(), 2);
    }
}

#[cfg(test)]
mod msg_queue_tests {
    use kestrel::msg_queue::MsgQueue;
    use kestrel::types::TASK_NO_WAIT;
    use kestrel::KernelError;

    static QUEUE: MsgQueue = MsgQueue::new();
    static mut QUEUE_BUF: [u8; 8] = [0; 8];

    #[test]
    fn test_nonblocking_send_receive() {
        let buf = unsafe { &mut *core::ptr::addr_of_mut!(QUEUE_BUF) };
        QUEUE.create(buf, 4).unwrap();

        assert!(QUEUE.is_empty());
        assert_eq!(
            QUEUE.receive(&mut [0u8; 4], TASK_NO_WAIT),
            Err(KernelError::Empty)
        );

        QUEUE.send(&[1, 2, 3, 4], TASK_NO_WAIT).unwrap();
        QUEUE.send(&[5, 6, 7, 8], TASK_NO_WAIT).unwrap();
        assert!(QUEUE.is_full());

        // Capacity 2: a third no-wait send is refused
        assert_eq!(
            QUEUE.send(&[9, 10, 11, 12], TASK_NO_WAIT),
            Err(KernelError::Full)
        );

        let mut out = [0u8; 4];
        QUEUE.receive(&mut out, TASK_NO_WAIT).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
        QUEUE.receive(&mut out, TASK_NO_WAIT).unwrap();
        assert_eq!(out, [5, 6, 7, 8]);
        assert!(QUEUE.is_empty());

        // Item size mismatch is rejected outright
        assert_eq!(QUEUE.send(&[0u8; 2], TASK_NO_WAIT), Err(KernelError::Inval));
    }
}

#[cfg(test)]
mod sem_tests {
    use kestrel::sem::Semaphore;
    use kestrel::types::TASK_NO_WAIT;
    use kestrel::KernelError;

    #[test]
    fn test_counting_up_and_down() {
        let sem = Semaphore::new(1, 2);

        assert_eq!(sem.count(), 1);
        sem.take(TASK_NO_WAIT).unwrap();
        assert_eq!(sem.count(), 0);

        assert_eq!(sem.take(TASK_NO_WAIT), Err(KernelError::Busy));

        sem.give().unwrap();
        sem.give().unwrap();
        assert_eq!(sem.count(), 2);

        // Count is capped at max_count
        assert_eq!(sem.give(), Err(KernelError::NoSem));
    }
}

#[cfg(test)]
mod timer_tests {
    use kestrel::timer::Timer;
    use kestrel::types::TimerMode;
    use kestrel::KernelError;

    fn noop_handler() {}

    static PERIODIC: Timer = Timer::new(noop_handler, TimerMode::Periodic);
    static ONE_SHOT: Timer = Timer::new(noop_handler, TimerMode::SingleShot);

    // Timers share the global running list, so all start/stop assertions
    // live in a single test.
    #[test]
    fn test_start_stop_state_machine() {
        assert!(!PERIODIC.is_running());

        assert_eq!(PERIODIC.start(0), Err(KernelError::Inval));

        PERIODIC.start(10).unwrap();
        assert!(PERIODIC.is_running());
        assert_eq!(PERIODIC.start(10), Err(KernelError::AlreadyActive));

        ONE_SHOT.start(5).unwrap();

        PERIODIC.stop().unwrap();
        assert!(!PERIODIC.is_running());
        assert_eq!(PERIODIC.stop(), Err(KernelError::NotActive));

        ONE_SHOT.stop().unwrap();
        assert!(!ONE_SHOT.is_running());
    }
}

#[cfg(test)]
mod error_tests {
    use kestrel::KernelError;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(KernelError::Inval.code(), -1);
        assert_eq!(KernelError::Timeout.code(), -2);
        assert_eq!(KernelError::Empty.code(), -3);
        assert_eq!(KernelError::Full.code(), -4);
        assert_eq!(KernelError::Busy.code(), -6);
        assert_eq!(KernelError::NotOwner.code(), -7);
        assert_eq!(KernelError::NoSem.code(), -11);
        assert_eq!(KernelError::NotLocked.code(), -12);
    }

    #[test]
    fn test_error_debug() {
        // Ensure errors can be formatted for debugging
        let err = KernelError::Timeout;
        let _ = format!("{:?}", err);
    }
}

#[cfg(test)]
mod types_tests {
    use kestrel::types::*;

    #[test]
    fn test_wait_constants() {
        assert_eq!(TASK_NO_WAIT, 0);
        assert_eq!(TASK_MAX_WAIT, u32::MAX);
        assert_eq!(TASK_HIGHEST_PRIORITY, 0);
        assert_eq!(TASK_LOWEST_PRIORITY, 0xff);
    }

    #[test]
    fn test_status_enums() {
        assert_ne!(TaskStatus::Ready, TaskStatus::Running);
        assert_ne!(BlockReason::Sleep, BlockReason::WaitSemaphore);
        assert_ne!(WakeupReason::WaitTimeout, WakeupReason::SleepTimeout);
    }
}

#[cfg(test)]
mod config_tests {
    use kestrel::config::*;
    use kestrel::time::{ms_to_ticks, us_to_ticks};

    #[test]
    fn test_config_values() {
        assert!(CFG_STK_SIZE_MIN >= 16, "stack minimum too small");
        assert!(CFG_IDLE_STK_SIZE >= CFG_STK_SIZE_MIN);
        assert!(CFG_TIMER_TASK_STK_SIZE >= CFG_STK_SIZE_MIN);

        assert!(CFG_TICK_INTERVAL_US > 0);
        assert!(CFG_TIMER_DISPATCH_QUEUE_SIZE > 0);

        // Timer task outranks every application task
        assert_eq!(CFG_TIMER_TASK_PRIO, 0);
    }

    #[test]
    fn test_tick_conversions() {
        // 1 ms tick: one tick per millisecond
        assert_eq!(ms_to_ticks(1), 1000 / CFG_TICK_INTERVAL_US);
        assert_eq!(ms_to_ticks(100), 100 * (1000 / CFG_TICK_INTERVAL_US));
        assert_eq!(us_to_ticks(CFG_TICK_INTERVAL_US), 1);
        assert_eq!(us_to_ticks(CFG_TICK_INTERVAL_US / 2), 0);
    }
}

#[cfg(test)]
mod kernel_tests {
    use kestrel::task::Tcb;
    use kestrel::types::{StackElement, TaskStatus, WakeupReason};
    use kestrel::{os_init, os_task_create, os_task_resume, os_task_suspend, KernelError};

    static mut WORKER_TCB: Tcb = Tcb::new();
    static mut WORKER_STK: [StackElement; 64] = [0; 64];
    static mut SHALLOW_TCB: Tcb = Tcb::new();
    static mut SHALLOW_STK: [StackElement; 8] = [0; 8];

    fn worker(_: *mut ()) -> ! {
        loop {}
    }

    // The kernel singletons are process-wide, so every assertion against
    // them lives in a single test.
    #[test]
    fn test_task_lifecycle_before_start() {
        os_init().unwrap();

        // A stack below the configured minimum is refused
        let shallow = os_task_create(
            unsafe { &mut *core::ptr::addr_of_mut!(SHALLOW_TCB) },
            unsafe { &mut *core::ptr::addr_of_mut!(SHALLOW_STK) },
            "shallow",
            worker,
            core::ptr::null_mut(),
            4,
        );
        assert_eq!(shallow.unwrap_err(), KernelError::Inval);

        let task = os_task_create(
            unsafe { &mut *core::ptr::addr_of_mut!(WORKER_TCB) },
            unsafe { &mut *core::ptr::addr_of_mut!(WORKER_STK) },
            "worker",
            worker,
            core::ptr::null_mut(),
            5,
        )
        .unwrap();

        assert_eq!(task.name(), "worker");
        assert_eq!(task.priority(), 5);
        assert_eq!(task.status(), TaskStatus::Ready);

        assert_eq!(os_task_resume(task), Err(KernelError::NotSuspended));

        os_task_suspend(task).unwrap();
        assert_eq!(task.status(), TaskStatus::Suspended);

        os_task_resume(task).unwrap();
        assert_eq!(task.status(), TaskStatus::Ready);
        assert_eq!(task.wakeup_reason(), WakeupReason::Resume);
    }
}
