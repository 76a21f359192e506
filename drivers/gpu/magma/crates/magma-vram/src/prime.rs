//! # PRIME Export
//!
//! Hooks used when a buffer is shared with another device or process.
//! Exported buffers are pinned into the device's PRIME domain so the
//! importer sees stable pages.

use magma_core::{Result, VirtAddr, WaitPolicy};

use crate::device::VramDevice;
use crate::object::GemVramObject;

/// Pin an object for export
pub fn gem_prime_pin(device: &VramDevice, gbo: &GemVramObject) -> Result<()> {
    gbo.pin(device.config().prime_pin_domain)
}

/// Drop an export pin. Failures are logged, not returned.
pub fn gem_prime_unpin(gbo: &GemVramObject) {
    if let Err(err) = gbo.unpin() {
        log::warn!("magma-vram: prime unpin of {:?} failed: {}", gbo.id(), err);
    }
}

/// Pin an object and map it into kernel space.
///
/// Both steps run under one reservation, so no unpin can slip in between.
/// Returns `None` on any failure; a pin taken here is dropped again if the
/// mapping fails.
pub fn gem_prime_vmap(device: &VramDevice, gbo: &GemVramObject) -> Option<VirtAddr> {
    let mut bo = match gbo.reserve(WaitPolicy::INTERRUPTIBLE) {
        Ok(bo) => bo,
        Err(err) => {
            log::debug!("magma-vram: prime vmap of {:?}: {}", gbo.id(), err);
            return None;
        }
    };

    if let Err(err) = bo.pin_locked(device.config().prime_pin_domain) {
        log::debug!("magma-vram: prime pin of {:?} failed: {}", gbo.id(), err);
        return None;
    }

    match bo.kmap(true) {
        Ok(Some(mapped)) => Some(mapped.virt),
        Ok(None) => None,
        Err(err) => {
            log::debug!("magma-vram: prime kmap of {:?} failed: {}", gbo.id(), err);
            if let Err(err) = bo.unpin_locked() {
                log::warn!("magma-vram: prime unpin of {:?} failed: {}", gbo.id(), err);
            }
            None
        }
    }
}

/// Undo [`gem_prime_vmap`]: unmap, then unpin, under one reservation
pub fn gem_prime_vunmap(gbo: &GemVramObject) {
    let mut bo = match gbo.reserve(WaitPolicy::UNINTERRUPTIBLE) {
        Ok(bo) => bo,
        Err(err) => {
            log::warn!("magma-vram: prime vunmap of {:?}: {}", gbo.id(), err);
            return;
        }
    };

    bo.kunmap();
    if let Err(err) = bo.unpin_locked() {
        log::warn!("magma-vram: prime unpin of {:?} failed: {}", gbo.id(), err);
    }
}

/// mmap offset for mapping an exported buffer.
///
/// Exported mappings go through the memory manager's node, never the
/// identity service's.
pub fn gem_prime_mmap(gbo: &GemVramObject) -> u64 {
    gbo.mmap_offset()
}
