//! Network ABI constants shared by the kernel stack and userland.

/// Address family: IPv4. The only family the kernel accepts.
pub const AF_INET: u8 = 2;

/// Socket type: datagram (UDP). The only type the kernel implements; the
/// value is carried through `netopen`'s `conn_type` argument for source
/// compatibility and otherwise ignored.
pub const SOCK_DGRAM: u8 = 0;

/// Capacity of the kernel connection table. `netopen` fails once all
/// slots are in use.
pub const NCONN: usize = 100;

/// Base of the local UDP port range. A connection in slot `i` always
/// owns local port `PORT_OFFSET + i`, so the valid local port range is
/// `PORT_OFFSET .. PORT_OFFSET + NCONN`.
pub const PORT_OFFSET: u16 = 3000;

/// The stack's single, fixed IPv4 address (`10.0.0.2`), big-endian u32.
pub const LOCAL_IPV4: u32 = 0x0A00_0002;

/// Bytes of buffered receive data a connection can hold (one page).
pub const CONN_RX_CAPACITY: usize = 4096;

/// Snapshot of interface state returned by the `netinfo` syscall.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct UserNetInfo {
    /// Non-zero once the NIC probe has completed.
    pub nic_ready: u8,
    /// Hardware address read from the card's EEPROM.
    pub mac: [u8; 6],
    /// The fixed local IPv4 address, network byte order.
    pub ipv4: [u8; 4],
    /// Frames received since boot.
    pub rx_packets: u64,
    /// Frames transmitted since boot.
    pub tx_packets: u64,
}
