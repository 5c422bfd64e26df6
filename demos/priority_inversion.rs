//! Priority inversion demo - mutex priority inheritance
//!
//! Three tasks: High(5), Med(10), Low(15)
//! Low holds mutex -> High waits -> Low boosted to prio 5

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use kestrel::mutex::Mutex;
use kestrel::task::Tcb;
use kestrel::types::{StackElement, TASK_MAX_WAIT};
use kestrel::{os_sleep_ms, os_task_create};

static HIGH_RUNS: AtomicU32 = AtomicU32::new(0);
static LOW_RUNS: AtomicU32 = AtomicU32::new(0);

static MTX: Mutex = Mutex::new();

static mut HIGH_STK: [StackElement; 256] = [0; 256];
static mut HIGH_TCB: Tcb = Tcb::new();
static mut MED_STK: [StackElement; 256] = [0; 256];
static mut MED_TCB: Tcb = Tcb::new();
static mut LOW_STK: [StackElement; 256] = [0; 256];
static mut LOW_TCB: Tcb = Tcb::new();

/// High priority task (prio=5)
fn high_task(_arg: *mut ()) -> ! {
    let _ = os_sleep_ms(50);

    loop {
        let n = HIGH_RUNS.fetch_add(1, Ordering::Relaxed) + 1;

        let _ = MTX.lock(TASK_MAX_WAIT);
        kestrel::info!("[HIGH] acquired #{}", n);

        for _ in 0..1_000 {
            cortex_m::asm::nop();
        }

        let _ = MTX.unlock();
        let _ = os_sleep_ms(100);
    }
}

/// Medium priority task (prio=10) - CPU bound
fn med_task(_arg: *mut ()) -> ! {
    loop {
        for _ in 0..50_000 {
            cortex_m::asm::nop();
        }
        let _ = os_sleep_ms(10);
    }
}

/// Low priority task (prio=15) - holds mutex long
fn low_task(_arg: *mut ()) -> ! {
    loop {
        let n = LOW_RUNS.fetch_add(1, Ordering::Relaxed) + 1;

        let _ = MTX.lock(TASK_MAX_WAIT);
        kestrel::info!("[LOW] holding #{}", n);

        for _ in 0..100_000 {
            cortex_m::asm::nop();
        }

        let _ = MTX.unlock();
        let _ = os_sleep_ms(200);
    }
}

#[entry]
fn main() -> ! {
    kestrel::info!("priority inversion demo: H(5) M(10) L(15)");

    kestrel::os_init().expect("kernel init failed");

    unsafe {
        let null = core::ptr::null_mut();
        os_task_create(&mut *core::ptr::addr_of_mut!(LOW_TCB), &mut *core::ptr::addr_of_mut!(LOW_STK), "L", low_task, null, 15).unwrap();
        os_task_create(&mut *core::ptr::addr_of_mut!(MED_TCB), &mut *core::ptr::addr_of_mut!(MED_STK), "M", med_task, null, 10).unwrap();
        os_task_create(&mut *core::ptr::addr_of_mut!(HIGH_TCB), &mut *core::ptr::addr_of_mut!(HIGH_STK), "H", high_task, null, 5).unwrap();
    }

    kestrel::os_start().expect("kernel start failed");

    loop {
        cortex_m::asm::wfi();
    }
}
