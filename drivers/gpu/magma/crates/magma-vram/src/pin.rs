//! # Pinning
//!
//! Pinning freezes an object's placement: every entry of the validated
//! placement carries the no-evict flag until the matching unpin. Only the
//! `0 → 1` and `1 → 0` transitions talk to the memory manager; nested pins
//! just count.
//!
//! A pinned object has to be unpinned before it can be pinned to another
//! pool set; a nested pin with different pools keeps the frozen placement.

use core::num::NonZeroU32;

use magma_core::{Error, OperationCtx, PlacementFlags, Result, WaitPolicy};

use crate::object::{GemVramObject, PinState, ReservedBo};
use crate::placement;

impl GemVramObject {
    /// Pin the object into one of the pools in `pl_flag`.
    ///
    /// Acquires the reservation (interruptible). On failure the pin count
    /// and placement are unchanged.
    pub fn pin(&self, pl_flag: PlacementFlags) -> Result<()> {
        let mut bo = self.reserve(WaitPolicy::INTERRUPTIBLE)?;
        bo.pin_locked(pl_flag)
    }

    /// Drop one pin.
    ///
    /// When the last pin goes, the placement becomes evictable again and is
    /// re-validated. A failed re-validation is returned, but the object
    /// stays unpinned.
    pub fn unpin(&self) -> Result<()> {
        let mut bo = self.reserve(WaitPolicy::INTERRUPTIBLE)?;
        bo.unpin_locked()
    }
}

impl ReservedBo<'_> {
    /// [`GemVramObject::pin`] for a caller already holding the reservation
    pub fn pin_locked(&mut self, pl_flag: PlacementFlags) -> Result<()> {
        let bo = self.bo;

        if magma_core::warn_on_once!(
            !bo.is_live(),
            "magma-vram: pin of {:?} during destruction",
            bo.id()
        ) {
            return Ok(());
        }

        if let PinState::Pinned(count) = self.state.pin {
            let count = count.checked_add(1).ok_or(Error::InvalidArgument)?;
            bo.set_pin(&mut self.state, PinState::Pinned(count));
            return Ok(());
        }

        let mut placement = placement::resolve(pl_flag);
        placement.set_no_evict(true);

        bo.mm
            .validate(bo.id(), &placement, OperationCtx::default())?;

        self.state.requested = pl_flag;
        self.state.placement = placement;
        bo.set_pin(&mut self.state, PinState::Pinned(NonZeroU32::MIN));
        log::trace!("magma-vram: pinned {:?} to {:?}", bo.id(), pl_flag);

        Ok(())
    }

    /// [`GemVramObject::unpin`] for a caller already holding the reservation
    pub fn unpin_locked(&mut self) -> Result<()> {
        let bo = self.bo;

        let count = match self.state.pin {
            PinState::Pinned(count) => count.get(),
            PinState::Evictable => {
                magma_core::warn_on_once!(true, "magma-vram: unpin of unpinned {:?}", bo.id());
                return Ok(());
            }
        };

        if let Some(rest) = NonZeroU32::new(count - 1) {
            bo.set_pin(&mut self.state, PinState::Pinned(rest));
            return Ok(());
        }

        bo.set_pin(&mut self.state, PinState::Evictable);
        self.state.placement.set_no_evict(false);
        log::trace!("magma-vram: unpinned {:?}", bo.id());

        bo.mm
            .validate(bo.id(), &self.state.placement, OperationCtx::default())
            .map_err(|err| {
                log::warn!("magma-vram: re-validation of {:?} failed: {}", bo.id(), err);
                err
            })
    }
}
