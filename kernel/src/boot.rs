//! Network boot sequence.
//!
//! `net_init` runs once, after the host kernel has installed its service
//! tables and before the first network syscall: memory pool, PCI probe,
//! stack wiring, then interrupt routing. A missing NIC is fatal — this
//! kernel exists to teach the network stack, so there is nothing useful
//! to boot into without one.

use core::ffi::c_void;

use brookos_drivers::e1000::{E1000, E1000_IRQ_LINE};
use brookos_drivers::net::netdev::NetDeviceSlot;
use brookos_drivers::net::stack;
use brookos_lib::kernel_services::driver_runtime::{irq_enable_line, irq_register_handler};
use brookos_lib::{InitFlag, klog_info};
use brookos_mm::page_alloc;

static NET_INIT: InitFlag = InitFlag::new();

extern "C" fn e1000_irq_handler(_irq: u8, _ctx: *mut c_void) {
    stack::nic_interrupt();
}

/// Bring up the network stack. Idempotent; panics if no NIC is present.
pub fn net_init() {
    if !NET_INIT.claim() {
        return;
    }

    page_alloc::init();

    let nic = match E1000::probe() {
        Ok(nic) => nic,
        Err(e) => panic!("net: NIC probe failed: {}", e),
    };

    if stack::init(NetDeviceSlot::E1000(nic)).is_err() {
        panic!("net: stack initialisation failed");
    }

    if irq_register_handler(E1000_IRQ_LINE, e1000_irq_handler, core::ptr::null_mut()) != 0 {
        panic!("net: IRQ {} registration failed", E1000_IRQ_LINE);
    }
    irq_enable_line(E1000_IRQ_LINE, 0);

    klog_info!("net: stack ready (irq {})", E1000_IRQ_LINE);
}
