//! # Memory Manager Callbacks
//!
//! Entry points the shared memory manager calls back into. The manager
//! backs objects of several drivers, so every callback first checks that
//! the object is one of ours and stays neutral for everything else.

use magma_core::{BoDriver, FileId, ManagedObject, ObjectKind, Placement};

use crate::object::GemVramObject;
use crate::placement;

/// Downcast a managed object to a VRAM buffer object
pub fn as_gem_vram(object: &dyn ManagedObject) -> Option<&GemVramObject> {
    if object.kind() != ObjectKind::GemVram {
        return None;
    }
    object.as_any().downcast_ref::<GemVramObject>()
}

/// Placement an object is evicted to: system memory only.
///
/// Independent of the pin state; whether a pinned object may be moved at
/// all is the manager's call.
pub fn bo_driver_evict_flags(object: &dyn ManagedObject) -> Option<Placement> {
    let gbo = as_gem_vram(object)?;
    log::trace!("magma-vram: evicting {:?} to system memory", gbo.id());
    Some(placement::eviction())
}

/// Check if `file` may fault in mappings of `object`.
///
/// Foreign objects are denied.
pub fn bo_driver_verify_access(object: &dyn ManagedObject, file: FileId) -> bool {
    match as_gem_vram(object) {
        Some(gbo) => gbo.registry.verify_access(gbo.id(), file),
        None => false,
    }
}

/// Callback table to register with the memory manager
#[derive(Debug, Clone, Copy, Default)]
pub struct GemVramFuncs;

impl BoDriver for GemVramFuncs {
    fn evict_flags(&self, object: &dyn ManagedObject) -> Option<Placement> {
        bo_driver_evict_flags(object)
    }

    fn verify_access(&self, object: &dyn ManagedObject, file: FileId) -> bool {
        bo_driver_verify_access(object, file)
    }
}

/// Shared callback table for VRAM-backed buffer objects
pub static GEM_VRAM_MM_FUNCS: GemVramFuncs = GemVramFuncs;
