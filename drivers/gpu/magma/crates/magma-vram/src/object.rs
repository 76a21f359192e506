//! # VRAM Buffer Objects
//!
//! The buffer object, its lifecycle and its reservation discipline.
//!
//! ## Lifecycle
//!
//! ```text
//!   create ──▶ Live ──(last GemVram dropped)──▶ Releasing ──(destroy hook)──▶ Freed
//!                │                                  │                          │
//!                │ retain / release (atomic)        │ kmap torn down,          │ identity
//!                │ pin / unpin / kmap (reserved)    │ manager.put()            │ released
//! ```
//!
//! The `Releasing → Freed` transition belongs to the memory manager: it
//! runs [`ManagedObject::destroy`] once it has reclaimed the backing store.
//! The object's own memory goes away with the last `Arc`, after that.
//!
//! ## Reservation
//!
//! Placement, pin count and the cached mapping live behind the object's
//! [`Reservation`]. Operations that need it held on entry are methods of
//! [`ReservedBo`], the guard returned by [`GemVramObject::lock`]; everything
//! else acquires it internally.

use alloc::sync::Arc;
use core::any::Any;
use core::fmt;
use core::num::NonZeroU32;
use core::ops::Deref;
use core::sync::atomic::{fence, AtomicU32, AtomicU8, Ordering};

use magma_core::{
    ByteSize, Error, GpuAddr, ManagedObject, MemoryManager, ObjectId, ObjectKind, ObjectRegistry,
    OperationCtx, Placement, PlacementFlags, Reservation, ReservationGuard, Result, SignalPending,
    WaitPolicy,
};

use crate::kmap::Kmap;
use crate::placement;

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Lifecycle state of a buffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    /// Referenced and usable
    Live      = 0,
    /// Last reference dropped, waiting for the manager's destroy hook
    Releasing = 1,
    /// Identity released
    Freed     = 2,
}

impl Lifecycle {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Live,
            1 => Self::Releasing,
            _ => Self::Freed,
        }
    }
}

// =============================================================================
// PIN STATE
// =============================================================================

/// Pin state of an object
///
/// `Pinned(n)` carries a multiplicity, not a recursive lock: the placement
/// is validated on the `Evictable → Pinned(1)` and `Pinned(1) → Evictable`
/// transitions only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    /// The manager may relocate the object
    Evictable,
    /// Placement is frozen
    Pinned(NonZeroU32),
}

impl PinState {
    /// Number of outstanding pins
    pub const fn count(self) -> u32 {
        match self {
            Self::Evictable => 0,
            Self::Pinned(n) => n.get(),
        }
    }
}

/// Mutable object state guarded by the reservation
#[derive(Debug)]
pub(crate) struct BoState {
    /// Pools requested by the last placement change
    pub(crate) requested: PlacementFlags,
    /// Placement last validated with the manager
    pub(crate) placement: Placement,
    pub(crate) pin: PinState,
    pub(crate) kmap: Kmap,
}

// =============================================================================
// BUFFER OBJECT
// =============================================================================

/// A GEM buffer object backed by VRAM with system memory as fallback
pub struct GemVramObject {
    id: ObjectId,
    size: ByteSize,
    pub(crate) mm: Arc<dyn MemoryManager>,
    pub(crate) registry: Arc<dyn ObjectRegistry>,
    resv: Reservation<BoState>,
    refcount: AtomicU32,
    lifecycle: AtomicU8,
    /// Mirror of the pin count for lock-free advisory reads
    pin_hint: AtomicU32,
}

/// Forwards signal checks to the memory manager
struct ManagerSignals<'a>(&'a dyn MemoryManager);

impl SignalPending for ManagerSignals<'_> {
    fn signal_pending(&self) -> bool {
        self.0.signal_pending()
    }
}

impl GemVramObject {
    /// Get identity
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Get size (page aligned)
    pub fn size(&self) -> ByteSize {
        self.size
    }

    /// Number of owning references (advisory)
    pub fn refcount(&self) -> u32 {
        self.refcount.load(Ordering::Relaxed)
    }

    /// Current lifecycle state
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_raw(self.lifecycle.load(Ordering::Acquire))
    }

    /// Check if the object is live
    pub fn is_live(&self) -> bool {
        self.lifecycle() == Lifecycle::Live
    }

    /// Pin count read without the reservation; may be stale
    pub fn pin_count(&self) -> u32 {
        self.pin_hint.load(Ordering::Acquire)
    }

    /// Check if pinned, without the reservation; may be stale
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    /// Lock the object's reservation.
    ///
    /// Waits are always interruptible. With `no_wait`, a busy reservation
    /// fails with [`Error::WouldBlock`] instead of waiting. Dropping the
    /// returned guard (or calling [`ReservedBo::unlock`]) releases it.
    pub fn lock(&self, no_wait: bool) -> Result<ReservedBo<'_>> {
        self.reserve(WaitPolicy::interruptible(no_wait))
    }

    pub(crate) fn reserve(&self, policy: WaitPolicy) -> Result<ReservedBo<'_>> {
        let state = self
            .resv
            .reserve(policy, &ManagerSignals(self.mm.as_ref()))?;
        Ok(ReservedBo { bo: self, state })
    }

    /// Offset userspace uses to mmap the object
    pub fn mmap_offset(&self) -> u64 {
        self.mm.mmap_offset(self.id)
    }

    /// Offset of the object in device memory.
    ///
    /// Only meaningful while pinned; an unpinned object reports
    /// [`Error::NotPinned`].
    pub fn offset(&self) -> Result<GpuAddr> {
        if magma_core::warn_on_once!(
            !self.is_pinned(),
            "magma-vram: device offset of unpinned object {:?}",
            self.id
        ) {
            return Err(Error::NotPinned);
        }
        Ok(self.mm.gpu_offset(self.id))
    }

    // -------------------------------------------------------------------------
    // Reference counting
    // -------------------------------------------------------------------------

    fn retain(&self) {
        let old = self.refcount.fetch_add(1, Ordering::Relaxed);
        debug_assert!(old > 0, "retain of released object");
    }

    fn release(&self) {
        if self.refcount.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        fence(Ordering::Acquire);
        self.release_final();
    }

    /// Last reference is gone: tear down the mapping and hand the object
    /// back to the manager. The reservation is not held across `put`.
    fn release_final(&self) {
        if let Err(raw) = self.lifecycle.compare_exchange(
            Lifecycle::Live as u8,
            Lifecycle::Releasing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            log::warn!(
                "magma-vram: final release of {:?} in state {:?}",
                self.id,
                Lifecycle::from_raw(raw)
            );
            return;
        }

        // Borrowed pointers may still hold the reservation; the mapping has
        // to go before `put`, so wait them out.
        match self
            .resv
            .reserve(WaitPolicy::UNINTERRUPTIBLE, &ManagerSignals(self.mm.as_ref()))
        {
            Ok(mut state) => {
                if state.pin != PinState::Evictable {
                    log::warn!(
                        "magma-vram: releasing {:?} with pin count {}",
                        self.id,
                        state.pin.count()
                    );
                }
                state.kmap.unmap(self.mm.as_ref());
            }
            Err(err) => log::warn!(
                "magma-vram: final release of {:?} could not reserve: {}",
                self.id,
                err
            ),
        }

        log::trace!("magma-vram: put {:?}", self.id);
        self.mm.put(self.id);
    }

    pub(crate) fn set_pin(&self, state: &mut BoState, pin: PinState) {
        state.pin = pin;
        self.pin_hint.store(pin.count(), Ordering::Release);
    }
}

impl ManagedObject for GemVramObject {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::GemVram
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn destroy(&self) {
        match self.lifecycle.compare_exchange(
            Lifecycle::Releasing as u8,
            Lifecycle::Freed as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.registry.object_release(self.id);
                log::debug!("magma-vram: destroyed {:?}", self.id);
            }
            Err(raw) => log::warn!(
                "magma-vram: destroy hook for {:?} in state {:?}",
                self.id,
                Lifecycle::from_raw(raw)
            ),
        }
    }
}

impl fmt::Debug for GemVramObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GemVramObject")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("refcount", &self.refcount())
            .field("pin_count", &self.pin_count())
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

// =============================================================================
// OWNING REFERENCE
// =============================================================================

/// Owning reference to a [`GemVramObject`]
///
/// Cloning retains, dropping releases. Dropping the last reference starts
/// destruction.
pub struct GemVram {
    obj: Arc<GemVramObject>,
}

impl GemVram {
    /// Create a VRAM-backed buffer object.
    ///
    /// `size` is rounded up to the page size; zero is rejected. The object
    /// starts out evictable with a placement allowing device and system
    /// memory. `page_alignment` is in pages (0 lets the manager pick);
    /// `interruptible` lets a signal abort waits for memory.
    pub fn create(
        registry: &Arc<dyn ObjectRegistry>,
        mm: &Arc<dyn MemoryManager>,
        size: ByteSize,
        page_alignment: u64,
        interruptible: bool,
    ) -> Result<Self> {
        if size.is_zero() {
            return Err(Error::InvalidArgument);
        }
        let size = size.page_align().ok_or(Error::InvalidArgument)?;

        let id = registry.object_init(size)?;

        let requested = PlacementFlags::VRAM | PlacementFlags::SYSTEM;
        let placement = placement::resolve(requested);

        let obj = Arc::new(GemVramObject {
            id,
            size,
            mm: Arc::clone(mm),
            registry: Arc::clone(registry),
            resv: Reservation::new(BoState {
                requested,
                placement: placement.clone(),
                pin: PinState::Evictable,
                kmap: Kmap::new(),
            }),
            refcount: AtomicU32::new(1),
            lifecycle: AtomicU8::new(Lifecycle::Live as u8),
            pin_hint: AtomicU32::new(0),
        });

        let ctx = OperationCtx {
            interruptible,
            no_wait_gpu: false,
        };
        let managed: Arc<dyn ManagedObject> = obj.clone();
        if let Err(err) = mm.init_object(managed, size, &placement, page_alignment, ctx) {
            registry.object_release(id);
            obj.lifecycle.store(Lifecycle::Freed as u8, Ordering::Release);
            log::debug!("magma-vram: init of {:?} failed: {}", id, err);
            return Err(err);
        }

        log::debug!("magma-vram: created {:?} ({})", id, size);
        Ok(Self { obj })
    }

    /// Take another owning reference
    pub fn retain(&self) -> Self {
        self.clone()
    }

    /// Drop this reference
    pub fn release(self) {
        drop(self);
    }

    /// Shared pointer to the object, without owning a reference
    pub fn as_arc(&self) -> &Arc<GemVramObject> {
        &self.obj
    }
}

impl Clone for GemVram {
    fn clone(&self) -> Self {
        self.obj.retain();
        Self {
            obj: Arc::clone(&self.obj),
        }
    }
}

impl Drop for GemVram {
    fn drop(&mut self) {
        self.obj.release();
    }
}

impl Deref for GemVram {
    type Target = GemVramObject;

    fn deref(&self) -> &Self::Target {
        &self.obj
    }
}

impl fmt::Debug for GemVram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.obj, f)
    }
}

// =============================================================================
// RESERVED OBJECT
// =============================================================================

/// A buffer object whose reservation is held
///
/// Carries the "locked" variants of pin, unpin and kmap. Dropping it
/// releases the reservation.
pub struct ReservedBo<'a> {
    pub(crate) bo: &'a GemVramObject,
    pub(crate) state: ReservationGuard<'a, BoState>,
}

impl<'a> ReservedBo<'a> {
    /// The reserved object
    pub fn object(&self) -> &'a GemVramObject {
        self.bo
    }

    /// Exact pin count
    pub fn pin_count(&self) -> u32 {
        self.state.pin.count()
    }

    /// Pin state
    pub fn pin_state(&self) -> PinState {
        self.state.pin
    }

    /// Current placement
    pub fn placement(&self) -> &Placement {
        &self.state.placement
    }

    /// Pools requested by the last placement change
    pub fn requested(&self) -> PlacementFlags {
        self.state.requested
    }

    /// Release the reservation
    pub fn unlock(self) {}
}

impl fmt::Debug for ReservedBo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReservedBo")
            .field("id", &self.bo.id)
            .field("state", &*self.state)
            .finish()
    }
}
