//! # Kernel Mappings
//!
//! Lazily established CPU mappings of a buffer object. Each object caches
//! one mapping of its whole page range; callers that juggle their own
//! mapping pass a [`Kmap`] slot to the `_at` variants instead.
//!
//! Mapping does not pin. A caller that needs the pages to stay put while
//! mapped pins under the same reservation first.

use magma_core::{KernelMapping, MemoryManager, Result, VirtAddr};

use crate::object::{GemVramObject, ReservedBo};

/// Slot holding at most one kernel mapping
#[derive(Debug, Default)]
pub struct Kmap {
    mapping: Option<KernelMapping>,
}

/// Address of an established mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapped {
    /// Start of the mapping
    pub virt: VirtAddr,
    /// Mapping points at device I/O memory
    pub is_iomem: bool,
}

impl Kmap {
    /// Create an empty slot
    pub const fn new() -> Self {
        Self { mapping: None }
    }

    /// Check if the slot holds a mapping
    pub fn is_mapped(&self) -> bool {
        self.mapping.is_some()
    }

    /// Start address of the held mapping
    pub fn virt(&self) -> Option<VirtAddr> {
        self.mapping.map(|m| m.virt)
    }

    /// Whether the held mapping points at I/O memory
    pub fn is_iomem(&self) -> Option<bool> {
        self.mapping.map(|m| m.is_iomem)
    }

    fn mapped(&self) -> Option<Mapped> {
        self.mapping.map(|m| Mapped {
            virt: m.virt,
            is_iomem: m.is_iomem,
        })
    }

    /// Tear down the held mapping, if any
    pub(crate) fn unmap(&mut self, mm: &dyn MemoryManager) {
        if let Some(mapping) = self.mapping.take() {
            log::trace!("magma-vram: kunmap {:?} at {:?}", mapping.object, mapping.virt);
            mm.kunmap(mapping);
        }
    }
}

impl ReservedBo<'_> {
    /// Map the whole object into kernel space, using the cached mapping.
    ///
    /// Returns the existing mapping if there is one. Otherwise, with `map`
    /// set, establishes and caches a new mapping; without it, returns
    /// `Ok(None)`. A failed mapping leaves the cache empty. An object that
    /// is being destroyed is never mapped.
    pub fn kmap(&mut self, map: bool) -> Result<Option<Mapped>> {
        let bo = self.bo;
        kmap_slot(bo, &mut self.state.kmap, map)
    }

    /// [`ReservedBo::kmap`] into a caller-owned slot.
    ///
    /// The caller unmaps the slot with [`ReservedBo::kunmap_at`] before
    /// dropping it.
    pub fn kmap_at(&mut self, map: bool, kmap: &mut Kmap) -> Result<Option<Mapped>> {
        kmap_slot(self.bo, kmap, map)
    }

    /// Tear down the cached mapping; no-op without one
    pub fn kunmap(&mut self) {
        self.state.kmap.unmap(self.bo.mm.as_ref());
    }

    /// Tear down the mapping held in a caller-owned slot
    pub fn kunmap_at(&mut self, kmap: &mut Kmap) {
        kmap.unmap(self.bo.mm.as_ref());
    }

    /// Check if the object has a cached mapping
    pub fn is_kmapped(&self) -> bool {
        self.state.kmap.is_mapped()
    }
}

fn kmap_slot(bo: &GemVramObject, kmap: &mut Kmap, map: bool) -> Result<Option<Mapped>> {
    if kmap.is_mapped() || !map {
        return Ok(kmap.mapped());
    }
    if magma_core::warn_on_once!(
        !bo.is_live(),
        "magma-vram: kmap of {:?} during destruction",
        bo.id()
    ) {
        return Ok(None);
    }

    let mapping = bo.mm.kmap(bo.id(), 0, bo.size().pages())?;
    log::trace!(
        "magma-vram: kmap {:?} at {:?} ({} pages)",
        bo.id(),
        mapping.virt,
        mapping.num_pages
    );
    kmap.mapping = Some(mapping);

    Ok(kmap.mapped())
}
