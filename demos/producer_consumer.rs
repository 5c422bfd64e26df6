//! Producer-consumer demo over a bounded message queue
//!
//! The producer outruns the consumer, so sends periodically block on the
//! full queue until the consumer drains a slot.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use kestrel::msg_queue::MsgQueue;
use kestrel::task::Tcb;
use kestrel::types::{StackElement, TASK_MAX_WAIT};
use kestrel::{os_sleep_ms, os_task_create};

static SENT: AtomicU32 = AtomicU32::new(0);

static QUEUE: MsgQueue = MsgQueue::new();
static mut QUEUE_BUF: [u8; 16] = [0; 16];

static mut PRODUCER_STK: [StackElement; 256] = [0; 256];
static mut PRODUCER_TCB: Tcb = Tcb::new();
static mut CONSUMER_STK: [StackElement; 256] = [0; 256];
static mut CONSUMER_TCB: Tcb = Tcb::new();

fn producer_task(_arg: *mut ()) -> ! {
    loop {
        let n = SENT.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = QUEUE.send(&n.to_le_bytes(), TASK_MAX_WAIT);
        kestrel::info!("[P] sent #{}", n);
        let _ = os_sleep_ms(50);
    }
}

fn consumer_task(_arg: *mut ()) -> ! {
    loop {
        let mut item = [0u8; 4];
        if QUEUE.receive(&mut item, TASK_MAX_WAIT).is_ok() {
            kestrel::info!("[C] received #{}", u32::from_le_bytes(item));
        }
        let _ = os_sleep_ms(200);
    }
}

#[entry]
fn main() -> ! {
    kestrel::info!("producer-consumer demo");

    kestrel::os_init().expect("kernel init failed");
    QUEUE.create(unsafe { &mut *core::ptr::addr_of_mut!(QUEUE_BUF) }, 4).unwrap();

    unsafe {
        let null = core::ptr::null_mut();
        os_task_create(&mut *core::ptr::addr_of_mut!(PRODUCER_TCB), &mut *core::ptr::addr_of_mut!(PRODUCER_STK), "P", producer_task, null, 15).unwrap();
        os_task_create(&mut *core::ptr::addr_of_mut!(CONSUMER_TCB), &mut *core::ptr::addr_of_mut!(CONSUMER_STK), "C", consumer_task, null, 10).unwrap();
    }

    kestrel::os_start().expect("kernel start failed");

    loop {
        cortex_m::asm::wfi();
    }
}
