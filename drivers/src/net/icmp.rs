//! ICMP echo responder support.
//!
//! Just enough ICMP to answer pings: parse an echo request, emit the
//! matching echo reply. The reply checksum is computed in software —
//! the NIC's context descriptor only covers the UDP layout.

use super::inet_checksum;

pub const ICMP_HEADER_LEN: usize = 8;

pub const TYPE_ECHO_REPLY: u8 = 0;
pub const TYPE_ECHO_REQUEST: u8 = 8;

/// `true` if `message` is a well-formed echo request.
pub fn is_echo_request(message: &[u8]) -> bool {
    message.len() >= ICMP_HEADER_LEN && message[0] == TYPE_ECHO_REQUEST && message[1] == 0
}

/// Build the echo reply for `request` into `out`.
///
/// The identifier, sequence number, and payload are echoed verbatim;
/// only the type flips and the checksum is recomputed. Returns the
/// reply length, or `None` when the request is malformed or `out` is
/// too small.
pub fn echo_reply_into(request: &[u8], out: &mut [u8]) -> Option<usize> {
    if !is_echo_request(request) || out.len() < request.len() {
        return None;
    }

    let len = request.len();
    out[..len].copy_from_slice(request);
    out[0] = TYPE_ECHO_REPLY;
    out[2] = 0;
    out[3] = 0;
    let csum = inet_checksum(&out[..len]);
    out[2..4].copy_from_slice(&csum.to_be_bytes());
    Some(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_request(ident: u16, seq: u16, payload: &[u8]) -> std::vec::Vec<u8> {
        let mut msg = std::vec::Vec::new();
        msg.extend_from_slice(&[TYPE_ECHO_REQUEST, 0, 0, 0]);
        msg.extend_from_slice(&ident.to_be_bytes());
        msg.extend_from_slice(&seq.to_be_bytes());
        msg.extend_from_slice(payload);
        let csum = inet_checksum(&msg);
        msg[2..4].copy_from_slice(&csum.to_be_bytes());
        msg
    }

    #[test]
    fn reply_echoes_ident_seq_payload() {
        let req = echo_request(0x1234, 7, b"abcdefgh");
        let mut out = [0u8; 64];
        let len = echo_reply_into(&req, &mut out).unwrap();
        assert_eq!(len, req.len());
        assert_eq!(out[0], TYPE_ECHO_REPLY);
        assert_eq!(&out[4..6], &0x1234u16.to_be_bytes());
        assert_eq!(&out[6..8], &7u16.to_be_bytes());
        assert_eq!(&out[8..len], b"abcdefgh");
    }

    #[test]
    fn reply_checksum_verifies() {
        let req = echo_request(1, 1, b"ping");
        let mut out = [0u8; 64];
        let len = echo_reply_into(&req, &mut out).unwrap();
        // A correct one's-complement checksum makes the message sum to zero.
        assert_eq!(inet_checksum(&out[..len]), 0);
    }

    #[test]
    fn non_echo_ignored() {
        let mut msg = echo_request(1, 1, b"x");
        msg[0] = 3; // destination unreachable
        let mut out = [0u8; 64];
        assert_eq!(echo_reply_into(&msg, &mut out), None);
    }

    #[test]
    fn short_message_ignored() {
        let mut out = [0u8; 8];
        assert_eq!(echo_reply_into(&[TYPE_ECHO_REQUEST, 0, 0], &mut out), None);
    }
}
