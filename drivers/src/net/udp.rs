//! UDP header codec (RFC 768).

use super::UDP_HEADER_LEN;
use super::types::{NetError, Port};

/// A UDP header in host representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UdpHeader {
    pub src_port: Port,
    pub dst_port: Port,
    /// Header plus payload length in bytes.
    pub length: u16,
    /// Zero on every outbound frame; legal per RFC 768 ("checksum not
    /// computed") and unverified on receive.
    pub checksum: u16,
}

impl UdpHeader {
    pub const LEN: usize = UDP_HEADER_LEN;

    /// Parse the leading 8 bytes of `data`, validating the claimed
    /// length against the slice.
    pub fn parse(data: &[u8]) -> Result<Self, NetError> {
        if data.len() < Self::LEN {
            return Err(NetError::Truncated);
        }
        let length = u16::from_be_bytes([data[4], data[5]]);
        if (length as usize) < Self::LEN || (length as usize) > data.len() {
            return Err(NetError::Truncated);
        }
        Ok(Self {
            src_port: Port::from_network_bytes([data[0], data[1]]),
            dst_port: Port::from_network_bytes([data[2], data[3]]),
            length,
            checksum: u16::from_be_bytes([data[6], data[7]]),
        })
    }

    /// Serialize into the first 8 bytes of `out`. Returns bytes written.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than [`Self::LEN`].
    pub fn write(&self, out: &mut [u8]) -> usize {
        out[0..2].copy_from_slice(&self.src_port.to_network_bytes());
        out[2..4].copy_from_slice(&self.dst_port.to_network_bytes());
        out[4..6].copy_from_slice(&self.length.to_be_bytes());
        out[6..8].copy_from_slice(&self.checksum.to_be_bytes());
        Self::LEN
    }

    /// Header for an outbound datagram of `payload_len` bytes.
    pub fn outbound(src_port: Port, dst_port: Port, payload_len: usize) -> Self {
        Self {
            src_port,
            dst_port,
            length: (Self::LEN + payload_len) as u16,
            checksum: 0,
        }
    }

    /// Payload bytes the header claims to carry.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.length as usize - Self::LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let hdr = UdpHeader::outbound(Port(3000), Port(4444), 5);
        let mut buf = [0u8; 13];
        assert_eq!(hdr.write(&mut buf), UdpHeader::LEN);
        assert_eq!(UdpHeader::parse(&buf), Ok(hdr));
    }

    #[test]
    fn outbound_length_and_zero_checksum() {
        let hdr = UdpHeader::outbound(Port(3000), Port(4444), 5);
        assert_eq!(hdr.length, 13);
        assert_eq!(hdr.payload_len(), 5);
        assert_eq!(hdr.checksum, 0);
    }

    #[test]
    fn ports_are_big_endian_on_the_wire() {
        let hdr = UdpHeader::outbound(Port(3000), Port(4444), 0);
        let mut buf = [0u8; UdpHeader::LEN];
        hdr.write(&mut buf);
        assert_eq!(&buf[0..2], &3000u16.to_be_bytes());
        assert_eq!(&buf[2..4], &4444u16.to_be_bytes());
    }

    #[test]
    fn length_shorter_than_header_rejected() {
        let mut buf = [0u8; UdpHeader::LEN];
        buf[5] = 7;
        assert_eq!(UdpHeader::parse(&buf), Err(NetError::Truncated));
    }

    #[test]
    fn length_beyond_frame_rejected() {
        let hdr = UdpHeader::outbound(Port(1), Port(2), 64);
        let mut buf = [0u8; UdpHeader::LEN];
        hdr.write(&mut buf);
        assert_eq!(UdpHeader::parse(&buf), Err(NetError::Truncated));
    }
}
