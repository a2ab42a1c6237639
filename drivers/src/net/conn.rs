//! The connection table.
//!
//! A fixed array of `NCONN` records, each binding a local pseudo-port
//! (derived from its slot index) to a remote `(address, port)` pair and
//! owning one page of buffered receive bytes. The table itself is pure
//! bookkeeping — blocking, transmit, and wakeups live in
//! [`stack`](super::stack), which guards a `ConnTable` with the network
//! lock.
//!
//! # Invariants
//!
//! - An in-use slot `i` always has `local_port == PORT_OFFSET + i`, so
//!   each inbound datagram matches at most one slot.
//! - `rx_buf` is `Some` iff the slot is in use.
//! - `rx_len` never exceeds the page size; overflow truncates.

use brookos_abi::net::{CONN_RX_CAPACITY, NCONN, PORT_OFFSET};
use brookos_mm::OwnedPage;

use super::types::{Ipv4Addr, MacAddr, NetError, Port};

/// One connection record.
pub struct Conn {
    in_use: bool,
    local_port: Port,
    remote_addr: Ipv4Addr,
    remote_port: Port,
    remote_mac: MacAddr,
    remote_mac_valid: bool,
    rx_buf: Option<OwnedPage>,
    rx_len: usize,
}

impl Conn {
    const fn empty() -> Self {
        Self {
            in_use: false,
            local_port: Port(0),
            remote_addr: Ipv4Addr::UNSPECIFIED,
            remote_port: Port(0),
            remote_mac: MacAddr::ZERO,
            remote_mac_valid: false,
            rx_buf: None,
            rx_len: 0,
        }
    }

    #[inline]
    pub fn in_use(&self) -> bool {
        self.in_use
    }

    #[inline]
    pub fn local_port(&self) -> Port {
        self.local_port
    }

    #[inline]
    pub fn remote_addr(&self) -> Ipv4Addr {
        self.remote_addr
    }

    #[inline]
    pub fn remote_port(&self) -> Port {
        self.remote_port
    }

    #[inline]
    pub fn remote_mac(&self) -> MacAddr {
        self.remote_mac
    }

    #[inline]
    pub fn remote_mac_valid(&self) -> bool {
        self.remote_mac_valid
    }

    /// Bytes currently buffered for `netread`.
    #[inline]
    pub fn rx_len(&self) -> usize {
        self.rx_len
    }
}

/// The fixed-capacity table. One per stack, guarded by the network lock.
pub struct ConnTable {
    slots: [Conn; NCONN],
}

impl ConnTable {
    pub const fn new() -> Self {
        Self {
            slots: [const { Conn::empty() }; NCONN],
        }
    }

    #[inline]
    pub fn slot(&self, index: usize) -> &Conn {
        &self.slots[index]
    }

    /// Claim the lowest free slot for `(remote_addr, remote_port)`.
    ///
    /// Allocates the slot's receive page and fixes its local port to
    /// `PORT_OFFSET + index`. The hardware address starts unresolved;
    /// the caller issues the ARP request and blocks.
    pub fn open_slot(
        &mut self,
        remote_addr: Ipv4Addr,
        remote_port: Port,
    ) -> Result<usize, NetError> {
        let index = self
            .slots
            .iter()
            .position(|c| !c.in_use)
            .ok_or(NetError::TableFull)?;

        let rx_buf = OwnedPage::alloc_zeroed().ok_or(NetError::OutOfMemory)?;

        let conn = &mut self.slots[index];
        conn.in_use = true;
        conn.local_port = Port(PORT_OFFSET + index as u16);
        conn.remote_addr = remote_addr;
        conn.remote_port = remote_port;
        conn.remote_mac = MacAddr::ZERO;
        conn.remote_mac_valid = false;
        conn.rx_buf = Some(rx_buf);
        conn.rx_len = 0;
        Ok(index)
    }

    /// Release a slot. Idempotent: closing a free or out-of-range slot
    /// is a no-op.
    pub fn close(&mut self, index: usize) {
        let Some(conn) = self.slots.get_mut(index) else {
            return;
        };
        if !conn.in_use {
            return;
        }
        conn.in_use = false;
        conn.remote_mac_valid = false;
        conn.rx_buf = None; // frees the page
        conn.rx_len = 0;
    }

    /// Find the slot owning `local_port`, if any. With the port-offset
    /// scheme this is an index computation plus an occupancy check.
    pub fn lookup_local_port(&self, local_port: Port) -> Option<usize> {
        let index = local_port.as_u16().checked_sub(PORT_OFFSET)? as usize;
        if index < NCONN && self.slots[index].in_use {
            Some(index)
        } else {
            None
        }
    }

    /// Record an ARP reply from `(sender_ip, sender_mac)`.
    ///
    /// Fills the cached hardware address of every in-use slot whose
    /// remote address matches and returns the first such slot so the
    /// caller can wake its opener. Matching is by protocol address only;
    /// a stale reply can overwrite a reused slot's cache (known hazard,
    /// kept as specified).
    pub fn record_arp_reply(&mut self, sender_ip: Ipv4Addr, sender_mac: MacAddr) -> Option<usize> {
        let mut woken = None;
        for (i, conn) in self.slots.iter_mut().enumerate() {
            if conn.in_use && conn.remote_addr == sender_ip {
                conn.remote_mac = sender_mac;
                conn.remote_mac_valid = true;
                if woken.is_none() {
                    woken = Some(i);
                }
            }
        }
        woken
    }

    /// Append datagram payload to a slot's receive buffer.
    ///
    /// Bytes past the page capacity are discarded (protocol-correct UDP
    /// loss). Returns the number of bytes actually buffered.
    pub fn append_rx(&mut self, index: usize, payload: &[u8]) -> usize {
        let conn = &mut self.slots[index];
        debug_assert!(conn.in_use);
        let Some(page) = conn.rx_buf.as_mut() else {
            return 0;
        };
        let room = CONN_RX_CAPACITY - conn.rx_len;
        let n = payload.len().min(room);
        page.as_mut_slice()[conn.rx_len..conn.rx_len + n].copy_from_slice(&payload[..n]);
        conn.rx_len += n;
        n
    }

    /// Copy up to `dst.len()` buffered bytes out of a slot, consuming
    /// them. The unread remainder slides down to the buffer front so a
    /// later read continues in arrival order.
    pub fn take_rx(&mut self, index: usize, dst: &mut [u8]) -> usize {
        let conn = &mut self.slots[index];
        let Some(page) = conn.rx_buf.as_mut() else {
            return 0;
        };
        let n = conn.rx_len.min(dst.len());
        if n == 0 {
            return 0;
        }
        let buf = page.as_mut_slice();
        dst[..n].copy_from_slice(&buf[..n]);
        buf.copy_within(n..conn.rx_len, 0);
        conn.rx_len -= n;
        n
    }

    /// Number of in-use slots (diagnostic).
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|c| c.in_use).count()
    }

    /// Release every slot (test support).
    pub fn close_all(&mut self) {
        for i in 0..NCONN {
            self.close(i);
        }
    }
}

impl Default for ConnTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: Ipv4Addr = Ipv4Addr([10, 0, 0, 1]);
    const PEER_MAC: MacAddr = MacAddr([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);

    #[test]
    fn slots_are_claimed_lowest_first_with_derived_ports() {
        let mut table = ConnTable::new();
        let a = table.open_slot(PEER, Port(4444)).unwrap();
        let b = table.open_slot(PEER, Port(5555)).unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(table.slot(0).local_port(), Port(3000));
        assert_eq!(table.slot(1).local_port(), Port(3001));

        // Closing slot 0 makes it the next claim again.
        table.close(0);
        let c = table.open_slot(PEER, Port(6666)).unwrap();
        assert_eq!(c, 0);
        assert_eq!(table.slot(0).local_port(), Port(3000));
    }

    #[test]
    fn local_ports_are_unique_across_open_slots() {
        let mut table = ConnTable::new();
        for _ in 0..8 {
            table.open_slot(PEER, Port(4444)).unwrap();
        }
        for i in 0..8 {
            for j in (i + 1)..8 {
                assert_ne!(table.slot(i).local_port(), table.slot(j).local_port());
            }
            assert_eq!(
                table.slot(i).local_port().as_u16() - PORT_OFFSET,
                i as u16
            );
        }
    }

    #[test]
    fn table_full_is_reported() {
        let mut table = ConnTable::new();
        for _ in 0..NCONN {
            table.open_slot(PEER, Port(4444)).unwrap();
        }
        assert_eq!(
            table.open_slot(PEER, Port(4444)),
            Err(NetError::TableFull)
        );
    }

    #[test]
    fn close_is_idempotent_and_frees_the_buffer() {
        let mut table = ConnTable::new();
        let fd = table.open_slot(PEER, Port(4444)).unwrap();
        assert!(table.slot(fd).in_use());
        table.close(fd);
        assert!(!table.slot(fd).in_use());
        table.close(fd);
        table.close(NCONN + 5);
        assert_eq!(table.open_count(), 0);
    }

    #[test]
    fn lookup_matches_at_most_one_slot() {
        let mut table = ConnTable::new();
        let a = table.open_slot(PEER, Port(4444)).unwrap();
        let b = table.open_slot(PEER, Port(4444)).unwrap();
        assert_eq!(table.lookup_local_port(Port(3000)), Some(a));
        assert_eq!(table.lookup_local_port(Port(3001)), Some(b));
        assert_eq!(table.lookup_local_port(Port(3002)), None);
        assert_eq!(table.lookup_local_port(Port(2999)), None);
        assert_eq!(table.lookup_local_port(Port(80)), None);
    }

    #[test]
    fn arp_reply_fills_matching_slots_only() {
        let mut table = ConnTable::new();
        let a = table.open_slot(PEER, Port(4444)).unwrap();
        let other = table.open_slot(Ipv4Addr([10, 0, 0, 3]), Port(4444)).unwrap();

        let woken = table.record_arp_reply(PEER, PEER_MAC);
        assert_eq!(woken, Some(a));
        assert!(table.slot(a).remote_mac_valid());
        assert_eq!(table.slot(a).remote_mac(), PEER_MAC);
        assert!(!table.slot(other).remote_mac_valid());

        // Reply for an address nobody is resolving.
        assert_eq!(
            table.record_arp_reply(Ipv4Addr([10, 0, 0, 9]), PEER_MAC),
            None
        );
    }

    #[test]
    fn append_preserves_arrival_order_and_truncates() {
        let mut table = ConnTable::new();
        let fd = table.open_slot(PEER, Port(4444)).unwrap();

        assert_eq!(table.append_rx(fd, &[b'a'; 3000]), 3000);
        assert_eq!(table.append_rx(fd, &[b'b'; 2000]), 1096);
        assert_eq!(table.slot(fd).rx_len(), CONN_RX_CAPACITY);

        let mut out = [0u8; 8192];
        let n = table.take_rx(fd, &mut out);
        assert_eq!(n, CONN_RX_CAPACITY);
        assert!(out[..3000].iter().all(|&x| x == b'a'));
        assert!(out[3000..4096].iter().all(|&x| x == b'b'));
    }

    #[test]
    fn partial_reads_slide_the_remainder_down() {
        let mut table = ConnTable::new();
        let fd = table.open_slot(PEER, Port(4444)).unwrap();
        table.append_rx(fd, b"world");
        table.append_rx(fd, b"hello");

        let mut out = [0u8; 4];
        assert_eq!(table.take_rx(fd, &mut out), 4);
        assert_eq!(&out, b"worl");
        assert_eq!(table.slot(fd).rx_len(), 6);

        let mut rest = [0u8; 16];
        assert_eq!(table.take_rx(fd, &mut rest), 6);
        assert_eq!(&rest[..6], b"dhello");
        assert_eq!(table.take_rx(fd, &mut rest), 0);
    }
}
