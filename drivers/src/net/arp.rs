//! ARP packet codec and request/reply construction (RFC 826, restricted
//! to Ethernet/IPv4).

use super::types::{Ipv4Addr, MacAddr};
use super::{
    ARP_HLEN_ETHERNET, ARP_HTYPE_ETHERNET, ARP_OPER_REPLY, ARP_OPER_REQUEST, ARP_PACKET_LEN,
    ARP_PLEN_IPV4, ARP_PTYPE_IPV4,
};

/// An ARP packet in host representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArpPacket {
    pub htype: u16,
    pub ptype: u16,
    pub hlen: u8,
    pub plen: u8,
    pub oper: u16,
    /// Sender hardware address.
    pub sha: MacAddr,
    /// Sender protocol address.
    pub spa: Ipv4Addr,
    /// Target hardware address (zero in requests).
    pub tha: MacAddr,
    /// Target protocol address.
    pub tpa: Ipv4Addr,
}

impl ArpPacket {
    pub const LEN: usize = ARP_PACKET_LEN;

    /// Parse the leading 28 bytes of `data`. `None` if too short.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < Self::LEN {
            return None;
        }
        Some(Self {
            htype: u16::from_be_bytes([data[0], data[1]]),
            ptype: u16::from_be_bytes([data[2], data[3]]),
            hlen: data[4],
            plen: data[5],
            oper: u16::from_be_bytes([data[6], data[7]]),
            sha: MacAddr([data[8], data[9], data[10], data[11], data[12], data[13]]),
            spa: Ipv4Addr([data[14], data[15], data[16], data[17]]),
            tha: MacAddr([data[18], data[19], data[20], data[21], data[22], data[23]]),
            tpa: Ipv4Addr([data[24], data[25], data[26], data[27]]),
        })
    }

    /// Serialize into the first 28 bytes of `out`. Returns bytes written.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than [`Self::LEN`].
    pub fn write(&self, out: &mut [u8]) -> usize {
        out[0..2].copy_from_slice(&self.htype.to_be_bytes());
        out[2..4].copy_from_slice(&self.ptype.to_be_bytes());
        out[4] = self.hlen;
        out[5] = self.plen;
        out[6..8].copy_from_slice(&self.oper.to_be_bytes());
        out[8..14].copy_from_slice(&self.sha.0);
        out[14..18].copy_from_slice(&self.spa.0);
        out[18..24].copy_from_slice(&self.tha.0);
        out[24..28].copy_from_slice(&self.tpa.0);
        Self::LEN
    }

    /// `true` if the fixed fields describe Ethernet/IPv4 ARP.
    pub fn is_ethernet_ipv4(&self) -> bool {
        self.htype == ARP_HTYPE_ETHERNET
            && self.ptype == ARP_PTYPE_IPV4
            && self.hlen == ARP_HLEN_ETHERNET
            && self.plen == ARP_PLEN_IPV4
    }

    /// Build a broadcast resolution request for `target_ip`.
    pub fn request(local_mac: MacAddr, local_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            htype: ARP_HTYPE_ETHERNET,
            ptype: ARP_PTYPE_IPV4,
            hlen: ARP_HLEN_ETHERNET,
            plen: ARP_PLEN_IPV4,
            oper: ARP_OPER_REQUEST,
            sha: local_mac,
            spa: local_ip,
            tha: MacAddr::ZERO,
            tpa: target_ip,
        }
    }

    /// Build the reply to this request, answering with `local_mac`.
    pub fn reply_to(&self, local_mac: MacAddr, local_ip: Ipv4Addr) -> Self {
        Self {
            htype: ARP_HTYPE_ETHERNET,
            ptype: ARP_PTYPE_IPV4,
            hlen: ARP_HLEN_ETHERNET,
            plen: ARP_PLEN_IPV4,
            oper: ARP_OPER_REPLY,
            sha: local_mac,
            spa: local_ip,
            tha: self.sha,
            tpa: self.spa,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL_MAC: MacAddr = MacAddr([0x52, 0x54, 0x00, 0x12, 0x34, 0x56]);
    const LOCAL_IP: Ipv4Addr = Ipv4Addr([10, 0, 0, 2]);
    const PEER_MAC: MacAddr = MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    const PEER_IP: Ipv4Addr = Ipv4Addr([10, 0, 0, 1]);

    #[test]
    fn roundtrip() {
        let pkt = ArpPacket::request(LOCAL_MAC, LOCAL_IP, PEER_IP);
        let mut buf = [0u8; ArpPacket::LEN];
        assert_eq!(pkt.write(&mut buf), ArpPacket::LEN);
        assert_eq!(ArpPacket::parse(&buf), Some(pkt));
    }

    #[test]
    fn request_fields() {
        let req = ArpPacket::request(LOCAL_MAC, LOCAL_IP, PEER_IP);
        assert!(req.is_ethernet_ipv4());
        assert_eq!(req.oper, ARP_OPER_REQUEST);
        assert_eq!(req.sha, LOCAL_MAC);
        assert_eq!(req.spa, LOCAL_IP);
        assert_eq!(req.tha, MacAddr::ZERO);
        assert_eq!(req.tpa, PEER_IP);
    }

    #[test]
    fn reply_mirrors_requester() {
        let req = ArpPacket::request(PEER_MAC, PEER_IP, LOCAL_IP);
        let reply = req.reply_to(LOCAL_MAC, LOCAL_IP);
        assert_eq!(reply.oper, ARP_OPER_REPLY);
        assert_eq!(reply.sha, LOCAL_MAC);
        assert_eq!(reply.spa, LOCAL_IP);
        assert_eq!(reply.tha, PEER_MAC);
        assert_eq!(reply.tpa, PEER_IP);
    }

    #[test]
    fn wire_layout() {
        let req = ArpPacket::request(LOCAL_MAC, LOCAL_IP, PEER_IP);
        let mut buf = [0u8; ArpPacket::LEN];
        req.write(&mut buf);
        assert_eq!(&buf[0..8], &[0, 1, 0x08, 0, 6, 4, 0, 1]);
        assert_eq!(&buf[14..18], &[10, 0, 0, 2]);
        assert_eq!(&buf[24..28], &[10, 0, 0, 1]);
    }

    #[test]
    fn short_input_rejected() {
        assert_eq!(ArpPacket::parse(&[0u8; 27]), None);
    }
}
