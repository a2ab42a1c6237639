#![no_std]
#![allow(unsafe_op_in_unsafe_fn)]

pub mod cpu {
    //! CPU primitives used by the locking and driver layers.
    //!
    //! Privileged instructions are only emitted when building for a bare
    //! metal target (`target_os = "none"`). Hosted builds (unit tests on
    //! the build machine) get inert fallbacks: there the interrupt flag
    //! is not ours to touch.

    #[inline(always)]
    pub fn pause() {
        core::hint::spin_loop();
    }

    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    #[inline(always)]
    pub fn hlt() {
        unsafe {
            core::arch::asm!("hlt", options(nomem, nostack, preserves_flags));
        }
    }

    #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
    #[inline(always)]
    pub fn hlt() {
        core::hint::spin_loop();
    }

    /// Save RFLAGS and disable interrupts (irqsave pattern).
    /// Returns the saved RFLAGS value.
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    #[inline(always)]
    pub fn save_flags_cli() -> u64 {
        let flags: u64;
        unsafe {
            core::arch::asm!(
                "pushfq",
                "pop {}",
                "cli",
                out(reg) flags,
                options(nomem)
            );
        }
        flags
    }

    #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
    #[inline(always)]
    pub fn save_flags_cli() -> u64 {
        0
    }

    /// Restore the interrupt flag from saved RFLAGS (irqrestore pattern).
    /// Only re-enables interrupts if they were enabled in the saved flags.
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    #[inline(always)]
    pub fn restore_flags(flags: u64) {
        if flags & (1 << 9) != 0 {
            unsafe {
                core::arch::asm!("sti", options(nomem, nostack));
            }
        }
    }

    #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
    #[inline(always)]
    pub fn restore_flags(_flags: u64) {}

    #[inline(always)]
    pub fn halt_loop() -> ! {
        loop {
            hlt();
        }
    }
}

pub mod tsc {
    //! Time-stamp counter access for coarse test timing.

    #[cfg(target_arch = "x86_64")]
    #[inline(always)]
    pub fn rdtsc() -> u64 {
        unsafe { core::arch::x86_64::_rdtsc() }
    }

    #[cfg(not(target_arch = "x86_64"))]
    #[inline(always)]
    pub fn rdtsc() -> u64 {
        0
    }
}

pub mod init_flag;
pub mod io;
pub mod kernel_services;
pub mod klog;
pub mod ports;
pub mod service_cell;
pub mod spinlock;
pub mod testing;
pub mod waitqueue;

#[doc(hidden)]
pub use paste;

pub use init_flag::InitFlag;
pub use klog::{KlogLevel, klog_get_level, klog_init, klog_set_level};
pub use ports::COM1;
pub use service_cell::ServiceCell;
pub use spinlock::{IrqMutex, IrqMutexGuard};
pub use waitqueue::WaitQueue;
