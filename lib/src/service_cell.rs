//! Write-once cell for kernel service tables.
//!
//! Subsystem crates consume host-OS functionality (scheduler, IRQ
//! routing, user-memory access) through `&'static` tables of function
//! pointers installed at boot. The cell decouples this crate from the
//! host kernel: nothing here links against the scheduler, and tests can
//! install stub tables.

use core::sync::atomic::{AtomicPtr, Ordering};

pub struct ServiceCell<T: 'static> {
    ptr: AtomicPtr<T>,
}

// SAFETY: The cell only ever hands out `&'static T` references installed
// through `install`, and the pointer is swapped atomically.
unsafe impl<T: Sync> Sync for ServiceCell<T> {}

impl<T: 'static> ServiceCell<T> {
    pub const fn new() -> Self {
        Self {
            ptr: AtomicPtr::new(core::ptr::null_mut()),
        }
    }

    /// Install the service table. The first installation wins; later
    /// calls are ignored so a stub table cannot displace the real one.
    pub fn install(&self, table: &'static T) {
        let _ = self.ptr.compare_exchange(
            core::ptr::null_mut(),
            table as *const T as *mut T,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    #[inline]
    pub fn get(&self) -> Option<&'static T> {
        let ptr = self.ptr.load(Ordering::Acquire);
        // SAFETY: `install` only stores `&'static T`.
        unsafe { ptr.as_ref() }
    }

    #[inline]
    pub fn is_installed(&self) -> bool {
        !self.ptr.load(Ordering::Acquire).is_null()
    }
}

impl<T: 'static> Default for ServiceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}
