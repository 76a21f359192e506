//! # Memory Placement Primitives
//!
//! Memory pools, caching modes and placement lists exchanged between buffer
//! object drivers and the memory manager.

use arrayvec::ArrayVec;

use crate::error::{Error, Result};

/// Maximum entries in one placement list (one per memory pool)
pub const MAX_PLACEMENTS: usize = 2;

// =============================================================================
// MEMORY POOLS
// =============================================================================

/// Concrete memory pool an object can be placed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryType {
    /// General-purpose system memory, the overflow pool
    System,
    /// Device memory attached to the graphics hardware
    Vram,
}

impl MemoryType {
    /// Check if CPU mappings of this pool are I/O memory
    pub const fn is_iomem(self) -> bool {
        matches!(self, MemoryType::Vram)
    }
}

bitflags::bitflags! {
    /// Set of pools a caller accepts for an object
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PlacementFlags: u32 {
        /// Device memory
        const VRAM = 1 << 0;
        /// System memory
        const SYSTEM = 1 << 1;
    }
}

bitflags::bitflags! {
    /// Caching modes acceptable for a placement entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CachingFlags: u32 {
        /// CPU-cached
        const CACHED = 1 << 0;
        /// Uncached
        const UNCACHED = 1 << 1;
        /// Write-combined
        const WRITE_COMBINED = 1 << 2;
        /// Any caching mode
        const MASK = Self::CACHED.bits() | Self::UNCACHED.bits() | Self::WRITE_COMBINED.bits();
    }
}

// =============================================================================
// PLACE
// =============================================================================

/// One acceptable location for an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Place {
    /// Target pool
    pub mem_type: MemoryType,
    /// Acceptable caching modes
    pub caching: CachingFlags,
    /// The memory manager must not relocate the object while set
    pub no_evict: bool,
    /// First acceptable page frame (0 = unconstrained)
    pub fpfn: u64,
    /// Last acceptable page frame (0 = unconstrained)
    pub lpfn: u64,
}

impl Place {
    /// Place covering the whole pool
    pub const fn new(mem_type: MemoryType, caching: CachingFlags) -> Self {
        Self {
            mem_type,
            caching,
            no_evict: false,
            fpfn: 0,
            lpfn: 0,
        }
    }

    /// Check if the page range is unconstrained
    pub const fn is_unconstrained(&self) -> bool {
        self.fpfn == 0 && self.lpfn == 0
    }
}

// =============================================================================
// PLACEMENT
// =============================================================================

/// Ordered list of acceptable places, most preferred first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    places: ArrayVec<Place, MAX_PLACEMENTS>,
}

impl Placement {
    /// Create an empty placement
    pub const fn new() -> Self {
        Self {
            places: ArrayVec::new_const(),
        }
    }

    /// Placement with a single place
    pub fn single(place: Place) -> Self {
        let mut places = ArrayVec::new_const();
        places.push(place);
        Self { places }
    }

    /// Placement with two places, `first` preferred
    pub fn pair(first: Place, second: Place) -> Self {
        Self {
            places: ArrayVec::from([first, second]),
        }
    }

    /// Append a place
    pub fn push(&mut self, place: Place) -> Result<()> {
        self.places
            .try_push(place)
            .map_err(|_| Error::InvalidArgument)
    }

    /// Get places in preference order
    pub fn places(&self) -> &[Place] {
        &self.places
    }

    /// Number of places
    pub fn len(&self) -> usize {
        self.places.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    /// Set or clear the no-evict flag on every place
    pub fn set_no_evict(&mut self, no_evict: bool) {
        for place in self.places.iter_mut() {
            place.no_evict = no_evict;
        }
    }

    /// Check if any place forbids eviction
    pub fn any_no_evict(&self) -> bool {
        self.places.iter().any(|p| p.no_evict)
    }

    /// Check if every place forbids eviction
    pub fn all_no_evict(&self) -> bool {
        !self.places.is_empty() && self.places.iter().all(|p| p.no_evict)
    }

    /// Check if a pool is acceptable
    pub fn allows(&self, mem_type: MemoryType) -> bool {
        self.places.iter().any(|p| p.mem_type == mem_type)
    }
}
