//! Ethernet II frame header codec.

use super::types::MacAddr;
use super::{ETH_ADDR_LEN, ETH_HEADER_LEN};

/// An Ethernet II header in host representation.
///
/// `ethertype` is kept as the raw host-order value; classification into
/// known protocols happens in the ingress pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EthHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
}

impl EthHeader {
    pub const LEN: usize = ETH_HEADER_LEN;

    /// Parse the leading 14 bytes of `frame`. `None` if too short.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < Self::LEN {
            return None;
        }
        let mut dst = [0u8; ETH_ADDR_LEN];
        let mut src = [0u8; ETH_ADDR_LEN];
        dst.copy_from_slice(&frame[0..6]);
        src.copy_from_slice(&frame[6..12]);
        Some(Self {
            dst: MacAddr(dst),
            src: MacAddr(src),
            ethertype: u16::from_be_bytes([frame[12], frame[13]]),
        })
    }

    /// Serialize into the first 14 bytes of `out`. Returns bytes written.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than [`Self::LEN`].
    pub fn write(&self, out: &mut [u8]) -> usize {
        out[0..6].copy_from_slice(&self.dst.0);
        out[6..12].copy_from_slice(&self.src.0);
        out[12..14].copy_from_slice(&self.ethertype.to_be_bytes());
        Self::LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ETHERTYPE_ARP;

    #[test]
    fn roundtrip() {
        let hdr = EthHeader {
            dst: MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            src: MacAddr([0x52, 0x54, 0x00, 0x12, 0x34, 0x56]),
            ethertype: ETHERTYPE_ARP,
        };
        let mut buf = [0u8; EthHeader::LEN];
        assert_eq!(hdr.write(&mut buf), EthHeader::LEN);
        assert_eq!(EthHeader::parse(&buf), Some(hdr));
    }

    #[test]
    fn wire_layout_is_big_endian() {
        let hdr = EthHeader {
            dst: MacAddr::BROADCAST,
            src: MacAddr::ZERO,
            ethertype: 0x0800,
        };
        let mut buf = [0u8; EthHeader::LEN];
        hdr.write(&mut buf);
        assert_eq!(&buf[12..14], &[0x08, 0x00]);
    }

    #[test]
    fn short_input_rejected() {
        assert_eq!(EthHeader::parse(&[0u8; 13]), None);
    }

    #[test]
    fn trailing_payload_ignored() {
        let mut buf = [0u8; 64];
        buf[12] = 0x86;
        buf[13] = 0xDD;
        let hdr = EthHeader::parse(&buf).unwrap();
        assert_eq!(hdr.ethertype, 0x86DD);
    }
}
