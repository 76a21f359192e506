//! # MAGMA Core Traits
//!
//! The seams between buffer-object drivers and the shared infrastructure
//! they sit on.
//!
//! ## Trait Hierarchy
//!
//! ```text
//!            driver ──────────────▶ MemoryManager
//!              │        validate / kmap / put / offsets
//!              │
//!              ├──────────────────▶ ObjectRegistry
//!              │        identity + mmap-node access lists
//!              │
//!   MemoryManager ───────────────▶ ManagedObject (kind tag, destroy hook)
//!              │
//!              └─────────────────▶ BoDriver (evict_flags, verify_access)
//! ```
//!
//! The memory manager is shared by every object kind of a device, so the
//! callbacks it issues must check [`ManagedObject::kind`] before touching
//! driver-specific state.

use alloc::sync::Arc;
use core::any::Any;

use crate::error::Result;
use crate::memory::Placement;
use crate::sync::SignalPending;
use crate::types::*;

// =============================================================================
// MANAGED OBJECTS
// =============================================================================

/// Object kinds that may share one memory manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// VRAM-backed GEM buffer object
    GemVram,
    /// Object owned by some other driver
    Other(u32),
}

/// Capability interface the memory manager holds for each object it backs
pub trait ManagedObject: Send + Sync {
    /// Stable identity
    fn id(&self) -> ObjectId;

    /// Kind tag used to dispatch callbacks
    fn kind(&self) -> ObjectKind;

    /// Downcast support for the owning driver
    fn as_any(&self) -> &dyn Any;

    /// Destructor hook, run by the manager once it has reclaimed the
    /// backing store of an object whose last reference was put.
    fn destroy(&self);
}

// =============================================================================
// MEMORY MANAGER
// =============================================================================

/// Options for one placement validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationCtx {
    /// Waits inside the manager may be aborted by a signal
    pub interruptible: bool,
    /// Do not wait for the GPU to idle the object
    pub no_wait_gpu: bool,
}

/// A kernel-visible CPU mapping of an object's pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelMapping {
    /// Object the mapping belongs to
    pub object: ObjectId,
    /// Start of the mapping
    pub virt: VirtAddr,
    /// Mapped memory is device I/O memory
    pub is_iomem: bool,
    /// First mapped page
    pub first_page: u64,
    /// Number of mapped pages
    pub num_pages: u64,
}

/// The external memory manager that moves bytes between pools
///
/// Implementations may block inside [`MemoryManager::validate`] while other
/// objects are evicted; those waits honour [`OperationCtx::interruptible`].
pub trait MemoryManager: SignalPending {
    /// Allocate backing for a new object and place it.
    ///
    /// On success the manager keeps `object` until [`MemoryManager::put`]
    /// and then calls [`ManagedObject::destroy`]. On failure it must drop
    /// `object` without calling the destroy hook.
    fn init_object(
        &self,
        object: Arc<dyn ManagedObject>,
        size: ByteSize,
        placement: &Placement,
        page_alignment: u64,
        ctx: OperationCtx,
    ) -> Result<()>;

    /// Migrate an object into one of the given places, evicting others if needed
    fn validate(&self, object: ObjectId, placement: &Placement, ctx: OperationCtx) -> Result<()>;

    /// Drop the last driver reference; backing is reclaimed and the destroy
    /// hook runs, possibly after this call returns
    fn put(&self, object: ObjectId);

    /// Current offset of the object inside its pool
    fn gpu_offset(&self, object: ObjectId) -> GpuAddr;

    /// Fake offset userspace uses to mmap the object
    fn mmap_offset(&self, object: ObjectId) -> u64;

    /// Map a page range of a reserved, placed object into kernel space
    fn kmap(&self, object: ObjectId, first_page: u64, num_pages: u64) -> Result<KernelMapping>;

    /// Tear down a mapping returned by [`MemoryManager::kmap`]
    fn kunmap(&self, mapping: KernelMapping);
}

// =============================================================================
// OBJECT REGISTRY
// =============================================================================

/// Identity service for buffer objects (object ids, mmap nodes, access lists)
pub trait ObjectRegistry: Send + Sync {
    /// Allocate an identity for an object of `size` bytes
    fn object_init(&self, size: ByteSize) -> Result<ObjectId>;

    /// Release an identity and everything attached to it
    fn object_release(&self, object: ObjectId);

    /// Check if `file` may fault in mappings of `object`
    fn verify_access(&self, object: ObjectId, file: FileId) -> bool;
}

// =============================================================================
// DRIVER CALLBACKS
// =============================================================================

/// Callbacks the memory manager issues back into a driver
pub trait BoDriver: Send + Sync {
    /// Placement to fall back to when `object` is evicted, `None` to keep
    /// the manager's default
    fn evict_flags(&self, object: &dyn ManagedObject) -> Option<Placement>;

    /// Check if `file` may access `object`
    fn verify_access(&self, object: &dyn ManagedObject, file: FileId) -> bool;
}
