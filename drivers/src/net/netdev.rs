//! The driver↔stack seam.
//!
//! Exactly one link type exists (Ethernet over one NIC), so the boundary
//! stays deliberately small: a device can report its hardware address
//! and enqueue one frame for transmit. Receive never crosses this seam
//! as an abstract operation — the E1000's interrupt path drains its own
//! ring and feeds the shared ingress pipeline directly.

use super::types::{MacAddr, NetError};
use crate::e1000::E1000;

use super::loopback::LoopbackDevice;

/// Counters kept by the stack for diagnostics and `netinfo`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetDeviceStats {
    /// Frames accepted by the ingress pipeline.
    pub rx_packets: u64,
    /// Frames handed to the device for transmit.
    pub tx_packets: u64,
}

impl NetDeviceStats {
    pub const fn new() -> Self {
        Self {
            rx_packets: 0,
            tx_packets: 0,
        }
    }
}

/// Operations every network device provides.
pub trait NetDevice {
    /// Hardware address of the device.
    fn mac(&self) -> MacAddr;

    /// Queue one complete Ethernet frame for transmission.
    ///
    /// `offload` requests IPv4 header checksum insertion for frames laid
    /// out as Ethernet/IPv4/UDP.
    fn tx_enqueue(&mut self, frame: &[u8], offload: bool) -> Result<(), NetError>;
}

/// The stack's device slot — a tagged union rather than a trait object,
/// since the set of devices is closed and known at compile time.
pub enum NetDeviceSlot {
    /// No device probed yet.
    Empty,
    /// The real NIC.
    E1000(E1000),
    /// Software device that reflects transmitted frames into a capture
    /// queue; used by the test suites.
    Loopback(LoopbackDevice),
}

impl NetDeviceSlot {
    #[inline]
    pub fn is_ready(&self) -> bool {
        !matches!(self, Self::Empty)
    }

    pub fn mac(&self) -> MacAddr {
        match self {
            Self::Empty => MacAddr::ZERO,
            Self::E1000(nic) => nic.mac(),
            Self::Loopback(dev) => dev.mac(),
        }
    }

    pub fn tx_enqueue(&mut self, frame: &[u8], offload: bool) -> Result<(), NetError> {
        match self {
            Self::Empty => Err(NetError::NoDevice),
            Self::E1000(nic) => nic.tx_enqueue(frame, offload),
            Self::Loopback(dev) => dev.tx_enqueue(frame, offload),
        }
    }
}
