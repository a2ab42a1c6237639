//! Software loopback device.
//!
//! Implements the device seam with no hardware behind it: transmitted
//! frames land in a small capture ring the caller can drain. The test
//! suites run the whole stack against this device; nothing else
//! instantiates it.

use super::netdev::NetDevice;
use super::types::{MacAddr, NetError};

/// Frames the capture ring can hold before the oldest is overwritten.
const CAPTURE_SLOTS: usize = 4;

/// Largest frame the capture ring stores (standard Ethernet MTU plus
/// headers; anything bigger is truncated on capture).
pub const CAPTURE_FRAME_MAX: usize = 1600;

struct CapturedFrame {
    data: [u8; CAPTURE_FRAME_MAX],
    len: usize,
    offload: bool,
}

impl CapturedFrame {
    const fn empty() -> Self {
        Self {
            data: [0; CAPTURE_FRAME_MAX],
            len: 0,
            offload: false,
        }
    }
}

pub struct LoopbackDevice {
    mac: MacAddr,
    frames: [CapturedFrame; CAPTURE_SLOTS],
    head: usize,
    count: usize,
    tx_frames: u64,
}

impl LoopbackDevice {
    /// Locally administered address, so it can never collide with a real
    /// NIC's EEPROM address.
    pub const MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);

    pub const fn new() -> Self {
        Self {
            mac: Self::MAC,
            frames: [const { CapturedFrame::empty() }; CAPTURE_SLOTS],
            head: 0,
            count: 0,
            tx_frames: 0,
        }
    }

    /// Pop the oldest captured frame into `out`. Returns the frame
    /// length and whether checksum offload was requested for it.
    pub fn pop_tx(&mut self, out: &mut [u8]) -> Option<(usize, bool)> {
        if self.count == 0 {
            return None;
        }
        let idx = (self.head + CAPTURE_SLOTS - self.count) % CAPTURE_SLOTS;
        self.count -= 1;
        let frame = &self.frames[idx];
        let n = frame.len.min(out.len());
        out[..n].copy_from_slice(&frame.data[..n]);
        Some((n, frame.offload))
    }

    /// Captured frames waiting to be popped.
    pub fn pending_tx(&self) -> usize {
        self.count
    }

    /// Total frames ever transmitted through this device.
    pub fn tx_frames(&self) -> u64 {
        self.tx_frames
    }
}

impl Default for LoopbackDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl NetDevice for LoopbackDevice {
    fn mac(&self) -> MacAddr {
        self.mac
    }

    fn tx_enqueue(&mut self, frame: &[u8], offload: bool) -> Result<(), NetError> {
        let slot = &mut self.frames[self.head];
        let n = frame.len().min(CAPTURE_FRAME_MAX);
        slot.data[..n].copy_from_slice(&frame[..n]);
        slot.len = n;
        slot.offload = offload;

        self.head = (self.head + 1) % CAPTURE_SLOTS;
        if self.count < CAPTURE_SLOTS {
            self.count += 1;
        }
        self.tx_frames += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_preserves_order() {
        let mut dev = LoopbackDevice::new();
        dev.tx_enqueue(b"first", false).unwrap();
        dev.tx_enqueue(b"second", true).unwrap();

        let mut buf = [0u8; 16];
        let (n, offload) = dev.pop_tx(&mut buf).unwrap();
        assert_eq!((&buf[..n], offload), (&b"first"[..], false));
        let (n, offload) = dev.pop_tx(&mut buf).unwrap();
        assert_eq!((&buf[..n], offload), (&b"second"[..], true));
        assert!(dev.pop_tx(&mut buf).is_none());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut dev = LoopbackDevice::new();
        for i in 0..6u8 {
            dev.tx_enqueue(&[i], false).unwrap();
        }
        assert_eq!(dev.pending_tx(), CAPTURE_SLOTS);
        let mut buf = [0u8; 4];
        let (n, _) = dev.pop_tx(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[2]);
        assert_eq!(dev.tx_frames(), 6);
    }
}
