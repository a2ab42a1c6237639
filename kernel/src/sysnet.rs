//! Network syscall surface.
//!
//! Each handler validates its arguments, crosses the user/kernel
//! boundary through the `usermem` services, and delegates to the stack.
//! Userland sees POSIX-flavoured results: a non-negative value on
//! success, `-1` on any failure. Argument-marshaling failures return
//! before any lock is taken.
//!
//! User data moves through a bounce page: one page bounds a datagram
//! anyway (the stack truncates at the page size, it never fragments),
//! and it keeps user memory out of reach of the network lock.

use brookos_abi::PAGE_SIZE;
use brookos_abi::net::UserNetInfo;
use brookos_abi::syscall::{
    SYSCALL_NETCLOSE, SYSCALL_NETINFO, SYSCALL_NETOPEN, SYSCALL_NETREAD, SYSCALL_NETWRITE,
};
use brookos_drivers::net::stack::{self, MAX_UDP_PAYLOAD};
use brookos_drivers::net::types::{Ipv4Addr, Port};
use brookos_lib::kernel_services::usermem::{copy_from_user, copy_to_user};
use brookos_lib::klog_debug;
use brookos_mm::OwnedPage;

/// Dispatch a network syscall by number. Called from the host kernel's
/// trap path with the raw argument registers.
pub fn net_syscall(nr: u64, args: [u64; 4]) -> i64 {
    match nr {
        SYSCALL_NETOPEN => sys_netopen(args[0] as u32, args[1] as u16, args[2] as u8),
        SYSCALL_NETCLOSE => sys_netclose(args[0] as i64),
        SYSCALL_NETWRITE => sys_netwrite(args[0] as i64, args[1], args[2]),
        SYSCALL_NETREAD => sys_netread(args[0] as i64, args[1], args[2]),
        SYSCALL_NETINFO => sys_netinfo(args[0]),
        _ => -1,
    }
}

/// Open a connection to `remote_addr:remote_port`. Blocks until the
/// peer's hardware address resolves. `conn_type` is accepted and
/// ignored; UDP is the only variant.
pub fn sys_netopen(remote_addr: u32, remote_port: u16, conn_type: u8) -> i64 {
    match stack::netopen(
        Ipv4Addr::from_u32_be(remote_addr),
        Port(remote_port),
        conn_type,
    ) {
        Ok(netfd) => netfd as i64,
        Err(e) => {
            klog_debug!("sys_netopen: {}", e);
            -1
        }
    }
}

/// Close a connection. Idempotent for valid descriptors.
pub fn sys_netclose(netfd: i64) -> i64 {
    match stack::netclose(netfd as i32) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Send `len` bytes from the user buffer as one datagram. Returns the
/// bytes sent (truncated to what one frame carries).
pub fn sys_netwrite(netfd: i64, user_buf: u64, len: u64) -> i64 {
    let n = (len as usize).min(MAX_UDP_PAYLOAD);

    let Some(mut bounce) = OwnedPage::alloc_zeroed() else {
        return -1;
    };
    if !copy_from_user(&mut bounce.as_mut_slice()[..n], user_buf) {
        return -1;
    }

    match stack::netwrite(netfd as i32, &bounce.as_slice()[..n]) {
        Ok(sent) => sent as i64,
        Err(e) => {
            klog_debug!("sys_netwrite: {}", e);
            -1
        }
    }
}

/// Receive up to `max_len` buffered bytes into the user buffer,
/// blocking while the connection is empty. Returns bytes received.
pub fn sys_netread(netfd: i64, user_buf: u64, max_len: u64) -> i64 {
    let n = (max_len as usize).min(PAGE_SIZE);

    let Some(mut bounce) = OwnedPage::alloc_zeroed() else {
        return -1;
    };
    let got = match stack::netread(netfd as i32, &mut bounce.as_mut_slice()[..n]) {
        Ok(got) => got,
        Err(e) => {
            klog_debug!("sys_netread: {}", e);
            return -1;
        }
    };

    if !copy_to_user(user_buf, &bounce.as_slice()[..got]) {
        return -1;
    }
    got as i64
}

/// Copy the interface snapshot out to userland.
pub fn sys_netinfo(user_ptr: u64) -> i64 {
    let info = stack::netinfo();
    // SAFETY: UserNetInfo is repr(C) plain data; viewing it as bytes for
    // the user copy is well-defined.
    let bytes = unsafe {
        core::slice::from_raw_parts(
            (&info as *const UserNetInfo).cast::<u8>(),
            core::mem::size_of::<UserNetInfo>(),
        )
    };
    if !copy_to_user(user_ptr, bytes) {
        return -1;
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use brookos_lib::kernel_services::usermem::{UserMemServices, register_usermem};
    use core::ffi::c_int;

    // Identity user-memory services: "user addresses" are plain kernel
    // pointers, null is rejected the way a real VM layer would reject an
    // unmapped range.
    fn ident_copy_from_user(dst: *mut u8, src: u64, len: usize) -> c_int {
        if src == 0 {
            return -1;
        }
        unsafe { core::ptr::copy_nonoverlapping(src as *const u8, dst, len) };
        0
    }

    fn ident_copy_to_user(dst: u64, src: *const u8, len: usize) -> c_int {
        if dst == 0 {
            return -1;
        }
        unsafe { core::ptr::copy_nonoverlapping(src, dst as *mut u8, len) };
        0
    }

    static IDENT_USERMEM: UserMemServices = UserMemServices {
        copy_from_user: ident_copy_from_user,
        copy_to_user: ident_copy_to_user,
    };

    fn setup() {
        register_usermem(&IDENT_USERMEM);
    }

    #[test]
    fn netopen_without_device_fails() {
        setup();
        // No NIC has been probed in this process.
        assert_eq!(sys_netopen(0x0A00_0001, 4444, 0), -1);
    }

    #[test]
    fn io_on_unopened_descriptors_fails() {
        setup();
        let buf = [0u8; 8];
        assert_eq!(sys_netwrite(0, buf.as_ptr() as u64, 8), -1);
        assert_eq!(sys_netread(0, buf.as_ptr() as u64, 8), -1);
        assert_eq!(sys_netclose(-3), -1);
        assert_eq!(sys_netclose(7), 0, "close of a free slot is idempotent");
    }

    #[test]
    fn bad_user_pointers_fail_before_the_stack_is_touched() {
        setup();
        assert_eq!(sys_netwrite(0, 0, 8), -1);
        assert_eq!(sys_netinfo(0), -1);
    }

    #[test]
    fn netinfo_reports_an_unprobed_stack() {
        setup();
        let mut info = UserNetInfo::default();
        let rc = sys_netinfo(&mut info as *mut UserNetInfo as u64);
        assert_eq!(rc, 0);
        assert_eq!(info.nic_ready, 0);
        assert_eq!(info.ipv4, [10, 0, 0, 2]);
    }

    #[test]
    fn dispatch_rejects_unknown_numbers() {
        setup();
        assert_eq!(net_syscall(9999, [0; 4]), -1);
    }
}
