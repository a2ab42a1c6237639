//! Raw syscall entry and typed veneers.
//!
//! The kernel takes the syscall number in `rax` and up to four arguments
//! in `rdi`/`rsi`/`rdx`/`r10`, returning an `i64` in `rax` (negative on
//! failure). The veneers below translate that into `Result`s; the
//! POSIX-style alias layer at the bottom exists for source
//! compatibility with ported tools.

use brookos_abi::net::SOCK_DGRAM;
use brookos_abi::syscall::{
    SYSCALL_EXIT, SYSCALL_NETCLOSE, SYSCALL_NETINFO, SYSCALL_NETOPEN, SYSCALL_NETREAD,
    SYSCALL_NETWRITE, SYSCALL_READ, SYSCALL_WRITE,
};

pub use brookos_abi::net::UserNetInfo;

#[cfg(target_arch = "x86_64")]
#[inline]
fn syscall4(nr: u64, a0: u64, a1: u64, a2: u64, a3: u64) -> i64 {
    let ret: i64;
    unsafe {
        core::arch::asm!(
            "syscall",
            inlateout("rax") nr => ret,
            in("rdi") a0,
            in("rsi") a1,
            in("rdx") a2,
            in("r10") a3,
            lateout("rcx") _,
            lateout("r11") _,
            options(nostack)
        );
    }
    ret
}

#[cfg(not(target_arch = "x86_64"))]
fn syscall4(_nr: u64, _a0: u64, _a1: u64, _a2: u64, _a3: u64) -> i64 {
    -1
}

#[inline]
fn syscall3(nr: u64, a0: u64, a1: u64, a2: u64) -> i64 {
    syscall4(nr, a0, a1, a2, 0)
}

// ---------------------------------------------------------------------------
// Process and console I/O
// ---------------------------------------------------------------------------

pub fn exit(code: i32) -> ! {
    syscall3(SYSCALL_EXIT, code as u64, 0, 0);
    // The kernel does not return from exit; satisfy the type if it ever
    // did (e.g. hosted stubs).
    loop {
        core::hint::spin_loop();
    }
}

/// Write to a console descriptor (1 = stdout).
pub fn write(fd: u32, buf: &[u8]) -> i64 {
    syscall3(SYSCALL_WRITE, fd as u64, buf.as_ptr() as u64, buf.len() as u64)
}

/// Read from a console descriptor (0 = stdin). Returns bytes read, 0 on
/// EOF, negative on error.
pub fn read(fd: u32, buf: &mut [u8]) -> i64 {
    syscall3(SYSCALL_READ, fd as u64, buf.as_mut_ptr() as u64, buf.len() as u64)
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

pub mod net {
    use super::*;

    /// Open a UDP endpoint to `addr:port`. Blocks until the peer's
    /// hardware address resolves.
    pub fn netopen(addr: [u8; 4], port: u16, conn_type: u8) -> Result<i32, ()> {
        let rc = syscall3(
            SYSCALL_NETOPEN,
            u32::from_be_bytes(addr) as u64,
            port as u64,
            conn_type as u64,
        );
        if rc < 0 { Err(()) } else { Ok(rc as i32) }
    }

    pub fn netclose(netfd: i32) -> Result<(), ()> {
        if syscall3(SYSCALL_NETCLOSE, netfd as u64, 0, 0) < 0 {
            Err(())
        } else {
            Ok(())
        }
    }

    /// Send one datagram. Returns bytes sent.
    pub fn netwrite(netfd: i32, data: &[u8]) -> Result<usize, ()> {
        let rc = syscall3(
            SYSCALL_NETWRITE,
            netfd as u64,
            data.as_ptr() as u64,
            data.len() as u64,
        );
        if rc < 0 { Err(()) } else { Ok(rc as usize) }
    }

    /// Receive buffered datagram bytes, blocking while none are queued.
    pub fn netread(netfd: i32, buf: &mut [u8]) -> Result<usize, ()> {
        let rc = syscall3(
            SYSCALL_NETREAD,
            netfd as u64,
            buf.as_mut_ptr() as u64,
            buf.len() as u64,
        );
        if rc < 0 { Err(()) } else { Ok(rc as usize) }
    }

    pub fn netinfo() -> Result<UserNetInfo, ()> {
        let mut info = UserNetInfo::default();
        let rc = syscall3(SYSCALL_NETINFO, &mut info as *mut UserNetInfo as u64, 0, 0);
        if rc < 0 { Err(()) } else { Ok(info) }
    }

    // -----------------------------------------------------------------------
    // POSIX-style aliases
    // -----------------------------------------------------------------------
    //
    // The kernel folds open+connect into netopen, so `socket` only
    // records intent and `connect` does the work. `bind`, `listen` and
    // `accept` are accepted no-ops: the local port is fixed by the
    // kernel's slot policy.

    /// An unconnected socket handle from [`socket`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Socket {
        netfd: i32,
    }

    pub fn socket(_domain: u8, _sock_type: u8, _protocol: u8) -> Socket {
        Socket { netfd: -1 }
    }

    pub fn connect(sock: &mut Socket, addr: [u8; 4], port: u16) -> Result<(), ()> {
        sock.netfd = netopen(addr, port, SOCK_DGRAM)?;
        Ok(())
    }

    pub fn bind(_sock: &mut Socket, _port: u16) -> Result<(), ()> {
        Ok(())
    }

    pub fn listen(_sock: &Socket) -> Result<(), ()> {
        Ok(())
    }

    pub fn accept(sock: &Socket) -> Result<Socket, ()> {
        Ok(*sock)
    }

    pub fn send(sock: &Socket, data: &[u8]) -> Result<usize, ()> {
        if sock.netfd < 0 {
            return Err(());
        }
        netwrite(sock.netfd, data)
    }

    pub fn recv(sock: &Socket, buf: &mut [u8]) -> Result<usize, ()> {
        if sock.netfd < 0 {
            return Err(());
        }
        netread(sock.netfd, buf)
    }

    pub fn shutdown(sock: &mut Socket) -> Result<(), ()> {
        if sock.netfd >= 0 {
            netclose(sock.netfd)?;
            sock.netfd = -1;
        }
        Ok(())
    }
}
