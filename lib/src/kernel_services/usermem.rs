//! User-memory access services for the syscall layer.
//!
//! The host OS owns address-space layout and page tables, so validating
//! and copying across the user/kernel boundary is its job. Syscall
//! handlers in this tree only ever touch user buffers through these
//! helpers.

use core::ffi::c_int;

use crate::ServiceCell;

/// Functions the host's VM layer provides.
pub struct UserMemServices {
    /// Copy `len` bytes from user address `src` into kernel memory at
    /// `dst`. Returns 0 on success, negative if the user range is not
    /// fully mapped readable in the calling process.
    pub copy_from_user: fn(dst: *mut u8, src: u64, len: usize) -> c_int,
    /// Copy `len` bytes from kernel memory at `src` to user address
    /// `dst`. Returns 0 on success, negative if the user range is not
    /// fully mapped writable in the calling process.
    pub copy_to_user: fn(dst: u64, src: *const u8, len: usize) -> c_int,
}

static USERMEM: ServiceCell<UserMemServices> = ServiceCell::new();

pub fn register_usermem(table: &'static UserMemServices) {
    USERMEM.install(table);
}

#[inline]
pub fn is_usermem_initialized() -> bool {
    USERMEM.is_installed()
}

/// Copy in from userspace. `false` means the user range was bad.
#[inline]
pub fn copy_from_user(dst: &mut [u8], src: u64) -> bool {
    match USERMEM.get() {
        Some(t) => (t.copy_from_user)(dst.as_mut_ptr(), src, dst.len()) == 0,
        None => false,
    }
}

/// Copy out to userspace. `false` means the user range was bad.
#[inline]
pub fn copy_to_user(dst: u64, src: &[u8]) -> bool {
    match USERMEM.get() {
        Some(t) => (t.copy_to_user)(dst, src.as_ptr(), src.len()) == 0,
        None => false,
    }
}
