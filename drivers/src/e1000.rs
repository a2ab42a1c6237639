//! Intel 8254x ("E1000") gigabit Ethernet driver.
//!
//! Probe order: locate the function over PCI, enable bus mastering, map
//! BAR0, read the hardware address out of the serial EEPROM, build the
//! receive and transmit descriptor rings, then unmask interrupt causes.
//! After probe the driver exposes exactly two data-plane operations —
//! descriptor-ring receive draining for the interrupt path and
//! [`tx_enqueue`](E1000::tx_enqueue) for everything outbound.
//!
//! Buffer ownership: every receive descriptor owns one 4 KiB page for
//! the card's lifetime and is reused in place. Transmit frames are
//! copied into a freshly allocated page per packet; those pages are
//! never reclaimed because the TXDW writeback is acknowledged but not
//! handled (known leak, tracked as a follow-up).

use brookos_abi::addr::{PhysAddr, VirtAddr};
use brookos_lib::{klog_debug, klog_info};
use brookos_mm::{OwnedPage, hhdm, page_alloc};

use crate::e1000_defs::*;
use crate::net::netdev::NetDevice;
use crate::net::types::{MacAddr, NetError};
use crate::pci;

pub const PCI_VENDOR_INTEL: u16 = 0x8086;
/// 82540EM — the part QEMU emulates as `-device e1000`.
pub const PCI_DEVICE_82540EM: u16 = 0x100E;

/// Legacy IRQ line the platform routes the NIC's INTA# to.
pub const E1000_IRQ_LINE: u8 = 11;

// =============================================================================
// MMIO access
// =============================================================================

/// The BAR0 register window. All accesses are 32-bit volatile.
struct Mmio {
    base: VirtAddr,
}

impl Mmio {
    #[inline]
    fn read(&self, reg: u32) -> u32 {
        // SAFETY: `base` maps the device's register window; offsets come
        // from the register table in e1000_defs.
        unsafe { core::ptr::read_volatile((self.base + reg as u64).as_ptr::<u32>()) }
    }

    #[inline]
    fn write(&self, reg: u32, value: u32) {
        // SAFETY: See read().
        unsafe { core::ptr::write_volatile((self.base + reg as u64).as_mut_ptr::<u32>(), value) }
    }
}

// =============================================================================
// Driver state
// =============================================================================

/// A completed receive descriptor, as seen by the drain loop.
#[derive(Clone, Copy, Debug)]
pub struct RxCompletion {
    pub index: usize,
    pub len: usize,
    pub end_of_packet: bool,
}

pub struct E1000 {
    mmio: Mmio,
    mac: MacAddr,
    /// Receive descriptor ring (one page, 16-byte descriptors).
    rx_ring: OwnedPage,
    /// Data page backing each receive descriptor, kernel-virtual.
    rx_bufs: [VirtAddr; RX_RING_LEN],
    /// Software index of the next descriptor to examine.
    rx_head: usize,
    /// Transmit descriptor ring.
    tx_ring: OwnedPage,
    /// Whether the UDP checksum context descriptor has been enqueued
    /// since reset.
    tx_ctx_installed: bool,
}

impl E1000 {
    /// Find and initialise the NIC.
    ///
    /// Fails with [`NetError::NoDevice`] when the PCI scan comes back
    /// empty. Ring buffer allocation failure panics — boot cannot
    /// proceed without receive buffers.
    pub fn probe() -> Result<Self, NetError> {
        let info =
            pci::find_device(PCI_VENDOR_INTEL, PCI_DEVICE_82540EM).ok_or(NetError::NoDevice)?;
        pci::enable_bus_master(&info);

        let bar0 = pci::read_bar0(&info);
        if bar0 == 0 {
            klog_info!("e1000: BAR0 unprogrammed");
            return Err(NetError::NoDevice);
        }
        let mmio = Mmio {
            base: hhdm::phys_to_virt(PhysAddr::new(bar0 as u64)),
        };

        let mac = read_mac(&mmio);

        let mut nic = Self {
            mmio,
            mac,
            rx_ring: OwnedPage::alloc_zeroed().expect("e1000: rx ring allocation failed"),
            rx_bufs: [VirtAddr::NULL; RX_RING_LEN],
            rx_head: 0,
            tx_ring: OwnedPage::alloc_zeroed().expect("e1000: tx ring allocation failed"),
            tx_ctx_installed: false,
        };

        nic.init_rx();
        nic.init_tx();
        nic.mmio.write(IMS, InterruptCause::boot_mask().bits());

        klog_info!(
            "e1000: ready at 00:{:02x}.0 mac={} mmio={:#x}",
            info.device,
            mac,
            bar0
        );
        Ok(nic)
    }

    /// Receive initialisation (manual section 14.4): program the station
    /// address, clear the multicast table, build the descriptor ring
    /// with one owned data page per descriptor, and enable the receiver.
    fn init_rx(&mut self) {
        let mac = self.mac.0;
        self.mmio
            .write(RAL0, u32::from_le_bytes([mac[0], mac[1], mac[2], mac[3]]));
        self.mmio
            .write(RAH0, u32::from_le_bytes([mac[4], mac[5], 0, 0]));

        let mut mta = MTA_LOW;
        while mta <= MTA_HIGH {
            self.mmio.write(mta, 0);
            mta += 4;
        }

        for i in 0..RX_RING_LEN {
            let buf = page_alloc::alloc_page().expect("e1000: rx buffer allocation failed");
            self.rx_bufs[i] = buf;
            let desc = RxDesc::with_buffer(hhdm::virt_to_phys(buf).as_u64());
            // SAFETY: i < RX_RING_LEN and the ring page holds exactly
            // RX_RING_LEN descriptors.
            unsafe { self.rx_desc_ptr(i).write_volatile(desc) };
        }

        let ring_phys = self.rx_ring.phys_u64();
        self.mmio.write(RDBAL, ring_phys as u32);
        self.mmio.write(RDBAH, (ring_phys >> 32) as u32);
        self.mmio.write(RDLEN, brookos_abi::PAGE_SIZE as u32);
        self.mmio.write(RDH, 0);
        self.mmio.write(RDT, (RX_RING_LEN - 1) as u32);

        self.mmio.write(RCTL, RctlFlags::boot_config().bits());
    }

    /// Transmit initialisation (manual section 14.5).
    fn init_tx(&mut self) {
        let ring_phys = self.tx_ring.phys_u64();
        self.mmio.write(TDBAL, ring_phys as u32);
        self.mmio.write(TDBAH, (ring_phys >> 32) as u32);
        self.mmio.write(TDLEN, brookos_abi::PAGE_SIZE as u32);
        self.mmio.write(TDH, 0);
        self.mmio.write(TDT, 0);

        self.mmio.write(TCTL, tctl_value(0xF, 0x200));
        self.mmio.write(TIPG, TIPG_DEFAULT);
    }

    #[inline]
    fn rx_desc_ptr(&self, index: usize) -> *mut RxDesc {
        // SAFETY (pointer math only): index is bounded by RX_RING_LEN.
        unsafe { self.rx_ring.as_mut_ptr::<RxDesc>().add(index) }
    }

    #[inline]
    fn tx_desc_ptr(&self, index: usize) -> *mut TxDataDesc {
        // SAFETY (pointer math only): index is bounded by TX_RING_LEN.
        unsafe { self.tx_ring.as_mut_ptr::<TxDataDesc>().add(index) }
    }

    #[inline]
    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    /// Read and thereby clear the interrupt cause register.
    pub fn read_interrupt_cause(&mut self) -> InterruptCause {
        InterruptCause::from_bits_truncate(self.mmio.read(ICR))
    }

    /// Next completed receive descriptor, or `None` once the software
    /// head catches up with the hardware head.
    pub fn rx_next(&mut self) -> Option<RxCompletion> {
        let hw_head = self.mmio.read(RDH) as usize;
        if self.rx_head == hw_head {
            return None;
        }
        // SAFETY: rx_head < RX_RING_LEN.
        let desc = unsafe { self.rx_desc_ptr(self.rx_head).read_volatile() };
        Some(RxCompletion {
            index: self.rx_head,
            len: desc.length as usize,
            end_of_packet: desc.is_end_of_packet(),
        })
    }

    /// The frame bytes of a completed descriptor, in place in its DMA
    /// page. Valid until [`rx_advance`](Self::rx_advance) returns the
    /// descriptor to the hardware.
    pub fn rx_frame(&self, completion: &RxCompletion) -> &[u8] {
        let len = completion.len.min(brookos_abi::PAGE_SIZE);
        // SAFETY: The buffer page is owned by this descriptor and the
        // hardware wrote `len` bytes into it.
        unsafe {
            core::slice::from_raw_parts(self.rx_bufs[completion.index].as_ptr::<u8>(), len)
        }
    }

    /// Return the descriptor at the software head to the hardware and
    /// advance. The buffer page is reused in place.
    pub fn rx_advance(&mut self) {
        // SAFETY: rx_head < RX_RING_LEN; clearing status hands the
        // descriptor back for in-place reuse.
        unsafe {
            let ptr = self.rx_desc_ptr(self.rx_head);
            let mut desc = ptr.read_volatile();
            desc.reset();
            ptr.write_volatile(desc);
        }
        self.rx_head = ring_next(self.rx_head, RX_RING_LEN);
    }

    /// Publish the refill tail after a drain pass: one descriptor behind
    /// the software head.
    pub fn rx_retire(&mut self) {
        self.mmio.write(RDT, ring_prev(self.rx_head, RX_RING_LEN) as u32);
    }

    /// Install a descriptor at the hardware tail and bump TDT.
    ///
    /// # Safety
    ///
    /// `write` must store a full descriptor at the given ring slot.
    unsafe fn push_tx_desc(&mut self, write: impl FnOnce(*mut TxDataDesc)) {
        let tail = self.mmio.read(TDT) as usize % TX_RING_LEN;
        write(self.tx_desc_ptr(tail));
        self.mmio.write(TDT, ring_next(tail, TX_RING_LEN) as u32);
    }

    /// Queue one frame for transmission.
    ///
    /// The frame is copied into a freshly allocated page (truncated to
    /// the page size — this stack never fragments). With `offload` the
    /// data descriptor asks the checksum engine to fill the IPv4 header
    /// checksum per the context descriptor, which is installed in front
    /// of the first offloaded packet after reset.
    pub fn tx_enqueue(&mut self, frame: &[u8], offload: bool) -> Result<(), NetError> {
        let mut page = OwnedPage::alloc_zeroed().ok_or(NetError::OutOfMemory)?;
        let len = frame.len().min(brookos_abi::PAGE_SIZE);
        page.as_mut_slice()[..len].copy_from_slice(&frame[..len]);

        if !self.tx_ctx_installed {
            let ctx = TxContextDesc::udp_offload();
            // SAFETY: A context descriptor is layout-compatible with a
            // data descriptor slot (both 16 bytes).
            unsafe {
                self.push_tx_desc(|slot| (slot as *mut TxContextDesc).write_volatile(ctx));
            }
            self.tx_ctx_installed = true;
        }

        let desc = TxDataDesc::packet(hhdm::virt_to_phys(page.virt()).as_u64(), len as u32, offload);
        // SAFETY: Writes one data descriptor into its ring slot.
        unsafe {
            self.push_tx_desc(|slot| slot.write_volatile(desc));
        }

        // The page stays with the hardware. Nothing reclaims it on
        // writeback yet, so every transmitted frame costs one pool frame
        // until the TXDW handler lands.
        let _ = page.into_raw();

        klog_debug!("e1000: queued {} byte frame (offload={})", len, offload);
        Ok(())
    }
}

impl NetDevice for E1000 {
    fn mac(&self) -> MacAddr {
        self.mac
    }

    fn tx_enqueue(&mut self, frame: &[u8], offload: bool) -> Result<(), NetError> {
        E1000::tx_enqueue(self, frame, offload)
    }
}

/// Read the station address out of the serial EEPROM: three 16-bit words
/// at offsets 0..3, each started via EERD and polled to completion.
fn read_mac(mmio: &Mmio) -> MacAddr {
    let mut mac = [0u8; 6];
    for word in 0..3 {
        mmio.write(EERD, EERD_START | ((word as u32) << EERD_ADDR_SHIFT));
        let mut value = mmio.read(EERD);
        while value & EERD_DONE == 0 {
            core::hint::spin_loop();
            value = mmio.read(EERD);
        }
        let data = (value >> EERD_DATA_SHIFT) as u16;
        mac[word * 2..word * 2 + 2].copy_from_slice(&data.to_le_bytes());
    }
    MacAddr(mac)
}
