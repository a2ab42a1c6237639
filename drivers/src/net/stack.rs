//! The network stack singleton and its blocking operations.
//!
//! One [`IrqMutex`] — the network lock — guards everything shared: the
//! device (and with it the descriptor rings), the connection table, the
//! egress scratch page, and the counters. There is no per-connection
//! lock and no useful parallelism; what the single lock buys is freedom
//! from data races between syscall context and the interrupt path.
//!
//! # Blocking
//!
//! `netopen` and `netread` are the only suspension points. Each
//! connection slot owns a [`WaitQueue`] sleep channel (the slot index is
//! the channel identity). Waiters re-check their predicate under the
//! lock on every wakeup. The network lock is **never** held while a
//! channel is woken: the interrupt path collects slots to wake in a
//! bitmask and signals them after release, so lock order is always
//! channel-internal → network, never the reverse.

use brookos_abi::net::{LOCAL_IPV4, NCONN, UserNetInfo};
use brookos_lib::{IrqMutex, WaitQueue, klog_debug};
use brookos_mm::OwnedPage;

use super::arp::ArpPacket;
use super::conn::ConnTable;
use super::ethernet::EthHeader;
use super::ingress::{self, Verdict};
use super::ipv4;
use super::netdev::{NetDeviceSlot, NetDeviceStats};
use super::types::{Ipv4Addr, MacAddr, NetError, Port};
use super::udp::UdpHeader;
use super::{
    ARP_PACKET_LEN, ETH_HEADER_LEN, ETHERTYPE_ARP, ETHERTYPE_IPV4, UDP_FRAME_OVERHEAD,
    UDP_HEADER_LEN,
};
use crate::e1000_defs::InterruptCause;

/// Largest UDP payload a single transmit page can carry.
pub const MAX_UDP_PAYLOAD: usize = brookos_abi::PAGE_SIZE - UDP_FRAME_OVERHEAD;

pub struct NetStack {
    dev: NetDeviceSlot,
    local_ip: Ipv4Addr,
    /// One page for building egress frames, valid once `init` ran.
    scratch: Option<OwnedPage>,
    stats: NetDeviceStats,
    conns: ConnTable,
}

impl NetStack {
    const fn new() -> Self {
        Self {
            dev: NetDeviceSlot::Empty,
            local_ip: Ipv4Addr::from_u32_be(LOCAL_IPV4),
            scratch: None,
            stats: NetDeviceStats::new(),
            conns: ConnTable::new(),
        }
    }

    #[inline]
    pub fn conns(&self) -> &ConnTable {
        &self.conns
    }

    #[inline]
    pub fn conns_mut(&mut self) -> &mut ConnTable {
        &mut self.conns
    }

    #[inline]
    pub fn stats(&self) -> NetDeviceStats {
        self.stats
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut NetDeviceSlot {
        &mut self.dev
    }

    /// Run one frame through the ingress pipeline and transmit whatever
    /// reply it produced. Returns the slot to wake, if any.
    fn ingest(&mut self, frame: &[u8], eop: bool) -> Option<usize> {
        let NetStack {
            dev,
            local_ip,
            scratch,
            stats,
            conns,
        } = self;
        let Some(scratch_page) = scratch.as_mut() else {
            return None;
        };

        let local_mac = dev.mac();
        let outcome = ingress::classify(
            frame,
            eop,
            scratch_page.as_mut_slice(),
            conns,
            local_mac,
            *local_ip,
        );

        if outcome.verdict != Verdict::Dropped {
            stats.rx_packets += 1;
        }
        if outcome.reply_len > 0 {
            match dev.tx_enqueue(
                &scratch_page.as_slice()[..outcome.reply_len],
                outcome.reply_offload,
            ) {
                Ok(()) => stats.tx_packets += 1,
                Err(e) => klog_debug!("net: reply tx failed: {}", e),
            }
        }
        outcome.wake
    }

    /// Broadcast an ARP request for `target`. The 42-byte frame fits on
    /// the stack, so this path does not need the scratch page.
    fn send_arp_request(&mut self, target: Ipv4Addr) -> Result<(), NetError> {
        let local_mac = self.dev.mac();
        let mut frame = [0u8; ETH_HEADER_LEN + ARP_PACKET_LEN];
        let eth = EthHeader {
            dst: MacAddr::BROADCAST,
            src: local_mac,
            ethertype: ETHERTYPE_ARP,
        };
        let mut len = eth.write(&mut frame);
        len += ArpPacket::request(local_mac, self.local_ip, target).write(&mut frame[len..]);

        klog_debug!("arp: requesting {}", target);
        self.dev.tx_enqueue(&frame[..len], false)?;
        self.stats.tx_packets += 1;
        Ok(())
    }

    /// Build and transmit one UDP datagram for connection `slot`.
    /// Returns the payload bytes actually sent (truncated, never split).
    fn send_udp(&mut self, slot: usize, payload: &[u8]) -> Result<usize, NetError> {
        let conn = self.conns.slot(slot);
        let remote_mac = conn.remote_mac();
        let remote_addr = conn.remote_addr();
        let remote_port = conn.remote_port();
        let local_port = conn.local_port();

        let NetStack {
            dev,
            local_ip,
            scratch,
            stats,
            ..
        } = self;
        let scratch_page = scratch.as_mut().ok_or(NetError::NoDevice)?;

        let n = payload.len().min(MAX_UDP_PAYLOAD);
        let frame = scratch_page.as_mut_slice();
        let mut off = EthHeader {
            dst: remote_mac,
            src: dev.mac(),
            ethertype: ETHERTYPE_IPV4,
        }
        .write(frame);
        off += ipv4::udp_header(UDP_HEADER_LEN + n, *local_ip, remote_addr).write(&mut frame[off..]);
        off += UdpHeader::outbound(local_port, remote_port, n).write(&mut frame[off..]);
        frame[off..off + n].copy_from_slice(&payload[..n]);
        off += n;

        dev.tx_enqueue(&scratch_page.as_slice()[..off], true)?;
        stats.tx_packets += 1;
        Ok(n)
    }

    /// Drain the NIC after an interrupt. Returns a bitmask of slots to
    /// wake once the lock is released.
    fn service_nic(&mut self) -> u128 {
        const _: () = assert!(NCONN <= 128, "wake bitmask is a u128");

        let NetStack {
            dev,
            local_ip,
            scratch,
            stats,
            conns,
        } = self;
        let NetDeviceSlot::E1000(nic) = dev else {
            return 0;
        };

        let causes = nic.read_interrupt_cause();
        // TXDW is acknowledged by the ICR read itself; completed
        // transmit descriptors (and their pages) are not yet reclaimed.
        if !causes.contains(InterruptCause::RXT0) {
            return 0;
        }
        let Some(scratch_page) = scratch.as_mut() else {
            return 0;
        };

        let local_mac = nic.mac();
        let mut wake_mask = 0u128;
        while let Some(completion) = nic.rx_next() {
            let outcome = {
                let frame = nic.rx_frame(&completion);
                ingress::classify(
                    frame,
                    completion.end_of_packet,
                    scratch_page.as_mut_slice(),
                    conns,
                    local_mac,
                    *local_ip,
                )
            };

            if outcome.verdict != Verdict::Dropped {
                stats.rx_packets += 1;
            }
            if outcome.reply_len > 0 {
                match nic.tx_enqueue(
                    &scratch_page.as_slice()[..outcome.reply_len],
                    outcome.reply_offload,
                ) {
                    Ok(()) => stats.tx_packets += 1,
                    Err(e) => klog_debug!("net: reply tx failed: {}", e),
                }
            }
            if let Some(slot) = outcome.wake {
                wake_mask |= 1 << slot;
            }
            nic.rx_advance();
        }
        nic.rx_retire();
        wake_mask
    }
}

/// The network lock and everything under it.
static NET: IrqMutex<NetStack> = IrqMutex::new(NetStack::new());

/// Per-slot sleep channels. The slot index is the channel identity.
static CONN_CHANNELS: [WaitQueue; NCONN] = [const { WaitQueue::new() }; NCONN];

/// Install the probed device and allocate the egress scratch page.
/// Called once from `net_init`, before the first syscall.
pub fn init(dev: NetDeviceSlot) -> Result<(), NetError> {
    let scratch = OwnedPage::alloc_zeroed().ok_or(NetError::OutOfMemory)?;
    let mut stack = NET.lock();
    stack.dev = dev;
    if stack.scratch.is_none() {
        stack.scratch = Some(scratch);
    }
    Ok(())
}

/// Entry point for one received frame — the demultiplexer of the stack.
///
/// Takes the network lock, classifies, transmits any reply, and wakes
/// the affected connection's sleep channel after the lock is released.
pub fn handle_packet(frame: &[u8], eop: bool) {
    let wake = {
        let mut stack = NET.lock();
        stack.ingest(frame, eop)
    };
    if let Some(slot) = wake {
        CONN_CHANNELS[slot].wake_all();
    }
}

/// NIC interrupt service routine: drain completed receive descriptors
/// and dispatch each frame, then wake every affected sleep channel.
pub fn nic_interrupt() {
    let wake_mask = {
        let mut stack = NET.lock();
        stack.service_nic()
    };

    let mut mask = wake_mask;
    while mask != 0 {
        let slot = mask.trailing_zeros() as usize;
        mask &= mask - 1;
        CONN_CHANNELS[slot].wake_all();
    }
}

/// Open a connection to `remote_addr:remote_port`.
///
/// Claims the lowest free slot, broadcasts an ARP request for the peer,
/// and blocks on the slot's sleep channel until the reply fills the
/// cached hardware address. `conn_type` is accepted for source
/// compatibility; UDP is the only variant.
pub fn netopen(remote_addr: Ipv4Addr, remote_port: Port, _conn_type: u8) -> Result<i32, NetError> {
    let slot = {
        let mut stack = NET.lock();
        if !stack.dev.is_ready() {
            return Err(NetError::NoDevice);
        }
        let slot = stack.conns.open_slot(remote_addr, remote_port)?;
        if let Err(e) = stack.send_arp_request(remote_addr) {
            stack.conns.close(slot);
            return Err(e);
        }
        slot
    };

    let resolved =
        CONN_CHANNELS[slot].wait_event(|| NET.lock().conns.slot(slot).remote_mac_valid());
    if !resolved {
        // Blocking was impossible (no scheduler runtime). Only a reply
        // that already arrived lets the open succeed.
        let mut stack = NET.lock();
        if !stack.conns.slot(slot).remote_mac_valid() {
            stack.conns.close(slot);
            return Err(NetError::HostUnreachable);
        }
    }
    Ok(slot as i32)
}

/// Close a connection. Idempotent.
pub fn netclose(netfd: i32) -> Result<(), NetError> {
    let slot = usize::try_from(netfd).map_err(|_| NetError::BadArgument)?;
    if slot >= NCONN {
        return Err(NetError::BadArgument);
    }
    NET.lock().conns.close(slot);
    Ok(())
}

/// Send one datagram on an open connection. Returns bytes sent.
pub fn netwrite(netfd: i32, payload: &[u8]) -> Result<usize, NetError> {
    let slot = usize::try_from(netfd).map_err(|_| NetError::BadArgument)?;
    if slot >= NCONN {
        return Err(NetError::BadArgument);
    }

    let mut stack = NET.lock();
    if !stack.conns.slot(slot).in_use() {
        return Err(NetError::NotConnected);
    }
    stack.send_udp(slot, payload)
}

/// Receive buffered datagram bytes, blocking while the connection is
/// open and its buffer is empty. Returns bytes copied into `dst`.
pub fn netread(netfd: i32, dst: &mut [u8]) -> Result<usize, NetError> {
    let slot = usize::try_from(netfd).map_err(|_| NetError::BadArgument)?;
    if slot >= NCONN {
        return Err(NetError::BadArgument);
    }
    if !NET.lock().conns.slot(slot).in_use() {
        return Err(NetError::NotConnected);
    }

    CONN_CHANNELS[slot].wait_event(|| {
        let stack = NET.lock();
        let conn = stack.conns.slot(slot);
        !conn.in_use() || conn.rx_len() > 0
    });

    let mut stack = NET.lock();
    if !stack.conns.slot(slot).in_use() {
        return Err(NetError::NotConnected);
    }
    Ok(stack.conns.take_rx(slot, dst))
}

/// Interface snapshot for the `netinfo` syscall.
pub fn netinfo() -> UserNetInfo {
    let stack = NET.lock();
    UserNetInfo {
        nic_ready: u8::from(stack.dev.is_ready()),
        mac: stack.dev.mac().0,
        ipv4: stack.local_ip.0,
        rx_packets: stack.stats.rx_packets,
        tx_packets: stack.stats.tx_packets,
    }
}

// =============================================================================
// Test support
// =============================================================================

#[cfg(any(test, feature = "itests"))]
pub mod testing {
    //! Hooks for the in-kernel suites: swap the device for a loopback
    //! and inspect the stack under the lock.

    use super::*;
    use crate::net::loopback::LoopbackDevice;

    /// Reset the stack to a clean loopback configuration.
    pub fn reset_with_loopback() {
        let scratch = OwnedPage::alloc_zeroed();
        let mut stack = NET.lock();
        stack.conns.close_all();
        stack.dev = NetDeviceSlot::Loopback(LoopbackDevice::new());
        if stack.scratch.is_none() {
            stack.scratch = scratch;
        }
        stack.stats = NetDeviceStats::new();
    }

    /// Run `f` with the network lock held.
    pub fn with_stack<R>(f: impl FnOnce(&mut NetStack) -> R) -> R {
        f(&mut NET.lock())
    }

    /// Pop the oldest frame the loopback device captured.
    pub fn pop_tx_frame(out: &mut [u8]) -> Option<(usize, bool)> {
        let mut stack = NET.lock();
        match stack.device_mut() {
            NetDeviceSlot::Loopback(dev) => dev.pop_tx(out),
            _ => None,
        }
    }
}
