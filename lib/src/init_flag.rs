//! One-shot initialisation flags.

use core::sync::atomic::{AtomicBool, Ordering};

/// A flag that can be claimed exactly once.
///
/// Used to guard singleton hardware claims and one-time subsystem
/// initialisation: the first caller of [`claim`](Self::claim) wins, every
/// later caller sees `false`.
pub struct InitFlag {
    set: AtomicBool,
}

impl InitFlag {
    #[inline]
    pub const fn new() -> Self {
        Self {
            set: AtomicBool::new(false),
        }
    }

    /// Attempt to claim the flag. Returns `true` for the first caller only.
    #[inline]
    pub fn claim(&self) -> bool {
        self.set
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Alias of [`claim`](Self::claim) for init-ordering call sites.
    #[inline]
    pub fn init_once(&self) -> bool {
        self.claim()
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    /// Release the flag (probe rollback paths only).
    #[inline]
    pub fn reset(&self) {
        self.set.store(false, Ordering::Release);
    }
}

impl Default for InitFlag {
    fn default() -> Self {
        Self::new()
    }
}
