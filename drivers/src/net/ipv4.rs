//! IPv4 header codec — the fixed 20-byte form only.
//!
//! The stack never emits or accepts options (`ihl` must be 5). The
//! `version`/`ihl` nibble pair in the first byte is the one field needing
//! bit-level care; everything else is plain big-endian.

use super::types::{Ipv4Addr, NetError};
use super::{IPV4_HEADER_LEN, IPPROTO_UDP};

const VERSION_IPV4: u8 = 4;
const IHL_NO_OPTIONS: u8 = 5;
const DEFAULT_TTL: u8 = 64;

/// An IPv4 header in host representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv4Header {
    pub tos: u8,
    /// Header plus payload length in bytes.
    pub total_len: u16,
    pub id: u16,
    pub flags_frag: u16,
    pub ttl: u8,
    pub protocol: u8,
    /// Zero on every outbound frame; the NIC fills it via offload.
    pub checksum: u16,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl Ipv4Header {
    pub const LEN: usize = IPV4_HEADER_LEN;

    /// Parse the leading 20 bytes of `data`.
    ///
    /// Fails with [`NetError::Truncated`] when the slice is shorter than
    /// a header or shorter than the claimed `total_len`, and with
    /// [`NetError::BadArgument`] when the version/ihl nibble is anything
    /// but the fixed option-less IPv4 form.
    pub fn parse(data: &[u8]) -> Result<Self, NetError> {
        if data.len() < Self::LEN {
            return Err(NetError::Truncated);
        }
        let version = data[0] >> 4;
        let ihl = data[0] & 0x0f;
        if version != VERSION_IPV4 || ihl != IHL_NO_OPTIONS {
            return Err(NetError::BadArgument);
        }
        let total_len = u16::from_be_bytes([data[2], data[3]]);
        if (total_len as usize) < Self::LEN || (total_len as usize) > data.len() {
            return Err(NetError::Truncated);
        }
        Ok(Self {
            tos: data[1],
            total_len,
            id: u16::from_be_bytes([data[4], data[5]]),
            flags_frag: u16::from_be_bytes([data[6], data[7]]),
            ttl: data[8],
            protocol: data[9],
            checksum: u16::from_be_bytes([data[10], data[11]]),
            src: Ipv4Addr([data[12], data[13], data[14], data[15]]),
            dst: Ipv4Addr([data[16], data[17], data[18], data[19]]),
        })
    }

    /// Serialize into the first 20 bytes of `out`. Returns bytes written.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than [`Self::LEN`].
    pub fn write(&self, out: &mut [u8]) -> usize {
        out[0] = (VERSION_IPV4 << 4) | IHL_NO_OPTIONS;
        out[1] = self.tos;
        out[2..4].copy_from_slice(&self.total_len.to_be_bytes());
        out[4..6].copy_from_slice(&self.id.to_be_bytes());
        out[6..8].copy_from_slice(&self.flags_frag.to_be_bytes());
        out[8] = self.ttl;
        out[9] = self.protocol;
        out[10..12].copy_from_slice(&self.checksum.to_be_bytes());
        out[12..16].copy_from_slice(&self.src.0);
        out[16..20].copy_from_slice(&self.dst.0);
        Self::LEN
    }

    /// Header for an outbound payload of `payload_len` bytes carrying
    /// `protocol`, with the checksum left to the NIC.
    pub fn outbound(protocol: u8, payload_len: usize, src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        Self {
            tos: 0,
            total_len: (Self::LEN + payload_len) as u16,
            id: 0,
            flags_frag: 0,
            ttl: DEFAULT_TTL,
            protocol,
            checksum: 0,
            src,
            dst,
        }
    }

    /// Payload bytes the header claims to carry.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.total_len as usize - Self::LEN
    }
}

/// Convenience for the UDP transmit path.
pub fn udp_header(udp_len: usize, src: Ipv4Addr, dst: Ipv4Addr) -> Ipv4Header {
    Ipv4Header::outbound(IPPROTO_UDP, udp_len, src, dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: Ipv4Addr = Ipv4Addr([10, 0, 0, 2]);
    const DST: Ipv4Addr = Ipv4Addr([10, 0, 0, 1]);

    #[test]
    fn roundtrip() {
        let hdr = udp_header(13, SRC, DST);
        let mut buf = [0u8; 40];
        assert_eq!(hdr.write(&mut buf), Ipv4Header::LEN);
        // parse() checks total_len against the slice, so hand it the
        // padded frame the header describes.
        let parsed = Ipv4Header::parse(&buf[..hdr.total_len as usize]).unwrap();
        assert_eq!(parsed, hdr);
    }

    #[test]
    fn version_ihl_nibble() {
        let hdr = udp_header(0, SRC, DST);
        let mut buf = [0u8; Ipv4Header::LEN];
        hdr.write(&mut buf);
        assert_eq!(buf[0], 0x45);
    }

    #[test]
    fn outbound_defaults_match_wire_contract() {
        let hdr = udp_header(5, SRC, DST);
        // 20 IPv4 + 8 UDP + 5 payload.
        assert_eq!(hdr.total_len, 33);
        assert_eq!(hdr.ttl, 64);
        assert_eq!(hdr.protocol, IPPROTO_UDP);
        assert_eq!(hdr.checksum, 0);
        assert_eq!(hdr.id, 0);
        assert_eq!(hdr.flags_frag, 0);
    }

    #[test]
    fn options_rejected() {
        let hdr = udp_header(0, SRC, DST);
        let mut buf = [0u8; 24];
        hdr.write(&mut buf);
        buf[0] = 0x46; // ihl = 6
        assert_eq!(Ipv4Header::parse(&buf), Err(NetError::BadArgument));
    }

    #[test]
    fn claimed_length_beyond_frame_rejected() {
        let hdr = udp_header(100, SRC, DST);
        let mut buf = [0u8; Ipv4Header::LEN];
        hdr.write(&mut buf);
        assert_eq!(Ipv4Header::parse(&buf), Err(NetError::Truncated));
    }

    #[test]
    fn short_input_rejected() {
        assert_eq!(Ipv4Header::parse(&[0u8; 19]), Err(NetError::Truncated));
    }
}
