//! Ingress pipeline — classification of received frames.
//!
//! [`classify`] is the single entry point for every frame the NIC (or
//! the loopback device) delivers. It parses the Ethernet header,
//! dispatches by ether-type, and either:
//!
//! - answers an ARP request for the local address (reply frame built
//!   into the caller's scratch buffer),
//! - records an ARP reply into the connection table (waking the opener),
//! - appends a UDP datagram's payload to the matching connection
//!   (waking any reader),
//! - answers an ICMP echo request, or
//! - drops the frame.
//!
//! Classification never touches the device: egress frames are built into
//! `scratch` and transmitted by the caller once its borrow of the
//! receive buffer has ended. That deferral is what lets the interrupt
//! path hand the DMA buffer in here in place.

use brookos_lib::klog_debug;

use super::conn::ConnTable;
use super::ethernet::EthHeader;
use super::ipv4::Ipv4Header;
use super::types::{EtherType, Ipv4Addr, IpProtocol, MacAddr};
use super::udp::UdpHeader;
use super::{ARP_OPER_REPLY, ARP_OPER_REQUEST, ETH_HEADER_LEN, ETHERTYPE_ARP, ETHERTYPE_IPV4, arp::ArpPacket, icmp};

/// What `classify` decided about a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// ARP request for us — a reply frame is waiting in scratch.
    ArpReplied,
    /// ARP reply recorded — a `netopen` waiter may now resolve.
    ArpResolved,
    /// UDP payload appended to a connection's receive buffer.
    UdpDelivered,
    /// ICMP echo request — a reply frame is waiting in scratch.
    IcmpEchoed,
    /// Anything else; the frame had no effect.
    Dropped,
}

/// Result of classifying one frame.
pub struct IngressOutcome {
    pub verdict: Verdict,
    /// Connection slot whose sleep channel should be woken.
    pub wake: Option<usize>,
    /// Bytes of egress frame built into scratch (0 = none).
    pub reply_len: usize,
    /// Whether the egress frame wants IPv4 checksum offload.
    pub reply_offload: bool,
}

impl IngressOutcome {
    const fn dropped() -> Self {
        Self {
            verdict: Verdict::Dropped,
            wake: None,
            reply_len: 0,
            reply_offload: false,
        }
    }
}

/// Classify one received frame, mutating `conns` and possibly building
/// an egress frame into `scratch`.
///
/// `eop` is the NIC's end-of-packet flag; frames split across multiple
/// descriptors exceed anything this stack emits or accepts and are
/// dropped.
pub fn classify(
    frame: &[u8],
    eop: bool,
    scratch: &mut [u8],
    conns: &mut ConnTable,
    local_mac: MacAddr,
    local_ip: Ipv4Addr,
) -> IngressOutcome {
    if !eop {
        klog_debug!("net: dropping multi-descriptor frame ({} bytes)", frame.len());
        return IngressOutcome::dropped();
    }

    let Some(eth) = EthHeader::parse(frame) else {
        klog_debug!("net: runt frame ({} bytes)", frame.len());
        return IngressOutcome::dropped();
    };

    match EtherType::from_u16(eth.ethertype) {
        Some(EtherType::Arp) => classify_arp(&frame[ETH_HEADER_LEN..], scratch, conns, local_mac, local_ip),
        Some(EtherType::Ipv4) => {
            classify_ipv4(&eth, &frame[ETH_HEADER_LEN..], scratch, conns, local_mac, local_ip)
        }
        Some(EtherType::Ipv6) => IngressOutcome::dropped(),
        None => {
            klog_debug!("net: unknown ether-type {:#06x}", eth.ethertype);
            IngressOutcome::dropped()
        }
    }
}

fn classify_arp(
    data: &[u8],
    scratch: &mut [u8],
    conns: &mut ConnTable,
    local_mac: MacAddr,
    local_ip: Ipv4Addr,
) -> IngressOutcome {
    let Some(pkt) = ArpPacket::parse(data) else {
        return IngressOutcome::dropped();
    };
    if !pkt.is_ethernet_ipv4() {
        klog_debug!(
            "arp: malformed header (htype={}, ptype={:#06x})",
            pkt.htype,
            pkt.ptype
        );
        return IngressOutcome::dropped();
    }
    // Requests and replies alike must be aimed at us.
    if pkt.tpa != local_ip {
        return IngressOutcome::dropped();
    }

    match pkt.oper {
        ARP_OPER_REPLY => match conns.record_arp_reply(pkt.spa, pkt.sha) {
            Some(slot) => {
                klog_debug!("arp: reply from {} ({})", pkt.spa, pkt.sha);
                IngressOutcome {
                    verdict: Verdict::ArpResolved,
                    wake: Some(slot),
                    reply_len: 0,
                    reply_offload: false,
                }
            }
            None => IngressOutcome::dropped(),
        },
        ARP_OPER_REQUEST => {
            klog_debug!("arp: request for us from {} ({})", pkt.spa, pkt.sha);
            let eth = EthHeader {
                dst: pkt.sha,
                src: local_mac,
                ethertype: ETHERTYPE_ARP,
            };
            let mut len = eth.write(scratch);
            len += pkt.reply_to(local_mac, local_ip).write(&mut scratch[len..]);
            IngressOutcome {
                verdict: Verdict::ArpReplied,
                wake: None,
                reply_len: len,
                reply_offload: false,
            }
        }
        oper => {
            klog_debug!("arp: unknown opcode {}", oper);
            IngressOutcome::dropped()
        }
    }
}

fn classify_ipv4(
    eth: &EthHeader,
    data: &[u8],
    scratch: &mut [u8],
    conns: &mut ConnTable,
    local_mac: MacAddr,
    local_ip: Ipv4Addr,
) -> IngressOutcome {
    let Ok(ip) = Ipv4Header::parse(data) else {
        return IngressOutcome::dropped();
    };
    if ip.dst != local_ip {
        return IngressOutcome::dropped();
    }

    let payload = &data[Ipv4Header::LEN..ip.total_len as usize];

    match IpProtocol::from_u8(ip.protocol) {
        Some(IpProtocol::Udp) => {
            let Ok(udp) = UdpHeader::parse(payload) else {
                return IngressOutcome::dropped();
            };
            let Some(slot) = conns.lookup_local_port(udp.dst_port) else {
                klog_debug!("udp: no connection for port {}", udp.dst_port);
                return IngressOutcome::dropped();
            };
            let datagram = &payload[UdpHeader::LEN..udp.length as usize];
            conns.append_rx(slot, datagram);
            IngressOutcome {
                verdict: Verdict::UdpDelivered,
                wake: Some(slot),
                reply_len: 0,
                reply_offload: false,
            }
        }
        Some(IpProtocol::Icmp) => {
            if !icmp::is_echo_request(payload) {
                return IngressOutcome::dropped();
            }
            // Ethernet + IPv4 headers first, echo reply after; the IPv4
            // checksum is left for the NIC's offload engine.
            let reply_eth = EthHeader {
                dst: eth.src,
                src: local_mac,
                ethertype: ETHERTYPE_IPV4,
            };
            let mut len = reply_eth.write(scratch);
            let reply_ip = Ipv4Header::outbound(ip.protocol, payload.len(), local_ip, ip.src);
            len += reply_ip.write(&mut scratch[len..]);
            let Some(n) = icmp::echo_reply_into(payload, &mut scratch[len..]) else {
                return IngressOutcome::dropped();
            };
            len += n;
            IngressOutcome {
                verdict: Verdict::IcmpEchoed,
                wake: None,
                reply_len: len,
                reply_offload: true,
            }
        }
        None => IngressOutcome::dropped(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::types::Port;
    use crate::net::{ARP_PACKET_LEN, IPPROTO_ICMP, IPPROTO_UDP, IPV4_HEADER_LEN, UDP_HEADER_LEN};

    const LOCAL_MAC: MacAddr = MacAddr([0x52, 0x54, 0x00, 0x12, 0x34, 0x56]);
    const LOCAL_IP: Ipv4Addr = Ipv4Addr([10, 0, 0, 2]);
    const PEER_MAC: MacAddr = MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    const PEER_IP: Ipv4Addr = Ipv4Addr([10, 0, 0, 1]);

    fn arp_frame(pkt: &ArpPacket) -> std::vec::Vec<u8> {
        let mut frame = std::vec![0u8; ETH_HEADER_LEN + ARP_PACKET_LEN];
        EthHeader {
            dst: MacAddr::BROADCAST,
            src: pkt.sha,
            ethertype: ETHERTYPE_ARP,
        }
        .write(&mut frame);
        pkt.write(&mut frame[ETH_HEADER_LEN..]);
        frame
    }

    fn udp_frame(dst_ip: Ipv4Addr, src_port: u16, dst_port: u16, payload: &[u8]) -> std::vec::Vec<u8> {
        let total = ETH_HEADER_LEN + IPV4_HEADER_LEN + UDP_HEADER_LEN + payload.len();
        let mut frame = std::vec![0u8; total];
        let mut off = EthHeader {
            dst: LOCAL_MAC,
            src: PEER_MAC,
            ethertype: ETHERTYPE_IPV4,
        }
        .write(&mut frame);
        off += Ipv4Header::outbound(IPPROTO_UDP, UDP_HEADER_LEN + payload.len(), PEER_IP, dst_ip)
            .write(&mut frame[off..]);
        off += UdpHeader::outbound(Port(src_port), Port(dst_port), payload.len())
            .write(&mut frame[off..]);
        frame[off..].copy_from_slice(payload);
        frame
    }

    fn run(frame: &[u8], conns: &mut ConnTable) -> (IngressOutcome, [u8; 2048]) {
        let mut scratch = [0u8; 2048];
        let outcome = classify(frame, true, &mut scratch, conns, LOCAL_MAC, LOCAL_IP);
        (outcome, scratch)
    }

    // S1 — ARP responder.
    #[test]
    fn arp_request_for_us_is_answered() {
        let mut conns = ConnTable::new();
        let request = ArpPacket::request(PEER_MAC, PEER_IP, LOCAL_IP);
        let (outcome, scratch) = run(&arp_frame(&request), &mut conns);

        assert_eq!(outcome.verdict, Verdict::ArpReplied);
        assert_eq!(outcome.reply_len, ETH_HEADER_LEN + ARP_PACKET_LEN);
        assert!(!outcome.reply_offload);

        let eth = EthHeader::parse(&scratch).unwrap();
        assert_eq!(eth.dst, PEER_MAC);
        assert_eq!(eth.src, LOCAL_MAC);
        assert_eq!(eth.ethertype, ETHERTYPE_ARP);

        let reply = ArpPacket::parse(&scratch[ETH_HEADER_LEN..]).unwrap();
        assert_eq!(reply.oper, crate::net::ARP_OPER_REPLY);
        assert_eq!(reply.sha, LOCAL_MAC);
        assert_eq!(reply.spa, LOCAL_IP);
        assert_eq!(reply.tha, PEER_MAC);
        assert_eq!(reply.tpa, PEER_IP);
    }

    // S2 — ARP for a foreign IP produces no traffic.
    #[test]
    fn arp_request_for_other_host_is_ignored() {
        let mut conns = ConnTable::new();
        let request = ArpPacket::request(PEER_MAC, PEER_IP, Ipv4Addr([10, 0, 0, 3]));
        let (outcome, _) = run(&arp_frame(&request), &mut conns);
        assert_eq!(outcome.verdict, Verdict::Dropped);
        assert_eq!(outcome.reply_len, 0);
    }

    #[test]
    fn arp_reply_resolves_waiting_connection() {
        let mut conns = ConnTable::new();
        let slot = conns.open_slot(PEER_IP, Port(4444)).unwrap();

        let mut reply = ArpPacket::request(PEER_MAC, PEER_IP, LOCAL_IP);
        reply.oper = crate::net::ARP_OPER_REPLY;
        reply.tha = LOCAL_MAC;
        let (outcome, _) = run(&arp_frame(&reply), &mut conns);

        assert_eq!(outcome.verdict, Verdict::ArpResolved);
        assert_eq!(outcome.wake, Some(slot));
        assert!(conns.slot(slot).remote_mac_valid());
        assert_eq!(conns.slot(slot).remote_mac(), PEER_MAC);
    }

    #[test]
    fn arp_reply_without_waiter_is_dropped() {
        let mut conns = ConnTable::new();
        let mut reply = ArpPacket::request(PEER_MAC, PEER_IP, LOCAL_IP);
        reply.oper = crate::net::ARP_OPER_REPLY;
        let (outcome, _) = run(&arp_frame(&reply), &mut conns);
        assert_eq!(outcome.verdict, Verdict::Dropped);
    }

    #[test]
    fn malformed_arp_is_dropped() {
        let mut conns = ConnTable::new();
        let mut request = ArpPacket::request(PEER_MAC, PEER_IP, LOCAL_IP);
        request.htype = 6; // IEEE 802 instead of Ethernet
        let (outcome, _) = run(&arp_frame(&request), &mut conns);
        assert_eq!(outcome.verdict, Verdict::Dropped);
    }

    // S5 precursor — datagram lands in the right connection.
    #[test]
    fn udp_datagram_is_delivered_to_matching_port() {
        let mut conns = ConnTable::new();
        let slot = conns.open_slot(PEER_IP, Port(4444)).unwrap();

        let frame = udp_frame(LOCAL_IP, 4444, 3000, b"world");
        let (outcome, _) = run(&frame, &mut conns);

        assert_eq!(outcome.verdict, Verdict::UdpDelivered);
        assert_eq!(outcome.wake, Some(slot));
        assert_eq!(conns.slot(slot).rx_len(), 5);

        let mut out = [0u8; 16];
        assert_eq!(conns.take_rx(slot, &mut out), 5);
        assert_eq!(&out[..5], b"world");
    }

    #[test]
    fn udp_to_unbound_port_is_dropped() {
        let mut conns = ConnTable::new();
        let _slot = conns.open_slot(PEER_IP, Port(4444)).unwrap();
        let frame = udp_frame(LOCAL_IP, 4444, 3001, b"lost");
        let (outcome, _) = run(&frame, &mut conns);
        assert_eq!(outcome.verdict, Verdict::Dropped);
        assert_eq!(conns.slot(0).rx_len(), 0);
    }

    #[test]
    fn udp_for_foreign_destination_is_dropped() {
        let mut conns = ConnTable::new();
        let _slot = conns.open_slot(PEER_IP, Port(4444)).unwrap();
        let frame = udp_frame(Ipv4Addr([10, 0, 0, 3]), 4444, 3000, b"nope");
        let (outcome, _) = run(&frame, &mut conns);
        assert_eq!(outcome.verdict, Verdict::Dropped);
    }

    #[test]
    fn udp_claiming_more_bytes_than_received_is_dropped() {
        let mut conns = ConnTable::new();
        let _slot = conns.open_slot(PEER_IP, Port(4444)).unwrap();
        let mut frame = udp_frame(LOCAL_IP, 4444, 3000, b"hey");
        // Inflate the UDP length field past the frame end.
        let udp_len_off = ETH_HEADER_LEN + IPV4_HEADER_LEN + 4;
        frame[udp_len_off..udp_len_off + 2].copy_from_slice(&100u16.to_be_bytes());
        let (outcome, _) = run(&frame, &mut conns);
        assert_eq!(outcome.verdict, Verdict::Dropped);
    }

    #[test]
    fn ipv6_and_unknown_ethertypes_are_dropped() {
        let mut conns = ConnTable::new();
        let mut frame = udp_frame(LOCAL_IP, 4444, 3000, b"x");
        frame[12..14].copy_from_slice(&0x86DDu16.to_be_bytes());
        let (outcome, _) = run(&frame, &mut conns);
        assert_eq!(outcome.verdict, Verdict::Dropped);

        frame[12..14].copy_from_slice(&0x1234u16.to_be_bytes());
        let (outcome, _) = run(&frame, &mut conns);
        assert_eq!(outcome.verdict, Verdict::Dropped);
    }

    #[test]
    fn runt_and_partial_frames_are_dropped() {
        let mut conns = ConnTable::new();
        let (outcome, _) = run(&[0u8; 9], &mut conns);
        assert_eq!(outcome.verdict, Verdict::Dropped);

        let frame = udp_frame(LOCAL_IP, 4444, 3000, b"x");
        let mut scratch = [0u8; 2048];
        let outcome = classify(&frame, false, &mut scratch, &mut conns, LOCAL_MAC, LOCAL_IP);
        assert_eq!(outcome.verdict, Verdict::Dropped);
    }

    #[test]
    fn icmp_echo_request_is_answered() {
        let mut conns = ConnTable::new();

        // Hand-build an echo request frame.
        let mut message = std::vec![icmp::TYPE_ECHO_REQUEST, 0, 0, 0, 0x12, 0x34, 0, 1];
        message.extend_from_slice(b"payload");
        let csum = crate::net::inet_checksum(&message);
        message[2..4].copy_from_slice(&csum.to_be_bytes());

        let mut frame = std::vec![0u8; ETH_HEADER_LEN + IPV4_HEADER_LEN + message.len()];
        let mut off = EthHeader {
            dst: LOCAL_MAC,
            src: PEER_MAC,
            ethertype: ETHERTYPE_IPV4,
        }
        .write(&mut frame);
        off += Ipv4Header::outbound(IPPROTO_ICMP, message.len(), PEER_IP, LOCAL_IP)
            .write(&mut frame[off..]);
        frame[off..].copy_from_slice(&message);

        let (outcome, scratch) = run(&frame, &mut conns);
        assert_eq!(outcome.verdict, Verdict::IcmpEchoed);
        assert!(outcome.reply_offload);
        assert_eq!(outcome.reply_len, frame.len());

        let eth = EthHeader::parse(&scratch).unwrap();
        assert_eq!(eth.dst, PEER_MAC);
        let ip = Ipv4Header::parse(&scratch[ETH_HEADER_LEN..outcome.reply_len]).unwrap();
        assert_eq!(ip.dst, PEER_IP);
        assert_eq!(ip.src, LOCAL_IP);
        assert_eq!(ip.protocol, IPPROTO_ICMP);
        let reply = &scratch[ETH_HEADER_LEN + IPV4_HEADER_LEN..outcome.reply_len];
        assert_eq!(reply[0], icmp::TYPE_ECHO_REPLY);
        assert_eq!(&reply[4..8], &message[4..8]);
        assert_eq!(crate::net::inet_checksum(reply), 0);
    }
}
