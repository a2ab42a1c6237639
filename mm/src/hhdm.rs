//! Direct-map phys↔virt translation.
//!
//! The single source of truth for the kernel's direct-map offset. DMA
//! descriptor programming uses [`virt_to_phys`]; walking a descriptor's
//! buffer pointer back into kernel memory uses [`phys_to_virt`].
//!
//! The offset defaults to zero (identity map), which is correct both for
//! hosted test builds and for an early-boot identity-mapped window; the
//! host kernel installs its real offset once during memory init.

use core::sync::atomic::{AtomicU64, Ordering};

use brookos_abi::addr::{PhysAddr, VirtAddr};

static DIRECT_MAP_OFFSET: AtomicU64 = AtomicU64::new(0);

/// Install the direct-map offset. Called once during boot memory init.
pub fn init(offset: u64) {
    DIRECT_MAP_OFFSET.store(offset, Ordering::Release);
}

#[inline]
pub fn offset() -> u64 {
    DIRECT_MAP_OFFSET.load(Ordering::Acquire)
}

/// Translate a direct-mapped kernel virtual address to physical.
#[inline]
pub fn virt_to_phys(virt: VirtAddr) -> PhysAddr {
    PhysAddr::new(virt.as_u64().wrapping_sub(offset()))
}

/// Translate a physical address into the direct map.
#[inline]
pub fn phys_to_virt(phys: PhysAddr) -> VirtAddr {
    VirtAddr::new(phys.as_u64().wrapping_add(offset()))
}
