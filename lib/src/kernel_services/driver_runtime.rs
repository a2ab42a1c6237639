//! Scheduler and IRQ services for drivers.

use core::ffi::{c_int, c_void};

use crate::ServiceCell;

/// Opaque scheduler task handle. Null means "no current task".
pub type DriverTaskHandle = *mut c_void;

/// IRQ handler signature: (irq line, registration context).
pub type DriverIrqHandler = extern "C" fn(u8, *mut c_void);

/// Functions the host scheduler and interrupt controller provide.
pub struct DriverRuntimeServices {
    /// Handle of the task currently executing, for wait-queue enqueue.
    pub current_task: fn() -> DriverTaskHandle,
    /// Block the current task until some `unblock_task` call releases it.
    /// The scheduler's pending-wakeup flag must cover the window between
    /// a wait-queue enqueue and this call (no lost wakeups).
    pub block_current_task: fn(),
    /// Make a blocked task runnable again. Returns non-zero on success.
    pub unblock_task: fn(DriverTaskHandle) -> c_int,
    /// Attach a handler to a legacy IRQ line. Returns 0 on success.
    pub irq_register_handler: fn(u8, DriverIrqHandler, *mut c_void) -> c_int,
    /// Route and unmask an IRQ line towards the given CPU.
    pub irq_enable_line: fn(u8, u32),
}

static DRIVER_RUNTIME: ServiceCell<DriverRuntimeServices> = ServiceCell::new();

/// Install the host's runtime table. First installation wins.
pub fn register_driver_runtime(table: &'static DriverRuntimeServices) {
    DRIVER_RUNTIME.install(table);
}

#[inline]
pub fn is_driver_runtime_initialized() -> bool {
    DRIVER_RUNTIME.is_installed()
}

#[inline]
pub fn current_task() -> DriverTaskHandle {
    match DRIVER_RUNTIME.get() {
        Some(t) => (t.current_task)(),
        None => core::ptr::null_mut(),
    }
}

#[inline]
pub fn block_current_task() {
    if let Some(t) = DRIVER_RUNTIME.get() {
        (t.block_current_task)();
    }
}

#[inline]
pub fn unblock_task(task: DriverTaskHandle) -> c_int {
    match DRIVER_RUNTIME.get() {
        Some(t) => (t.unblock_task)(task),
        None => -1,
    }
}

/// Attach `handler` to `irq_line`. Returns -1 if no runtime is installed.
pub fn irq_register_handler(irq_line: u8, handler: DriverIrqHandler, context: *mut c_void) -> c_int {
    match DRIVER_RUNTIME.get() {
        Some(t) => (t.irq_register_handler)(irq_line, handler, context),
        None => -1,
    }
}

/// Route and unmask `irq_line` towards `cpu`.
pub fn irq_enable_line(irq_line: u8, cpu: u32) {
    if let Some(t) = DRIVER_RUNTIME.get() {
        (t.irq_enable_line)(irq_line, cpu);
    }
}
