//! # Placement Policy
//!
//! Maps a requested set of memory pools to the ordered placement list the
//! memory manager validates against. Pure computation, no locking.

use magma_core::{CachingFlags, MemoryType, Place, Placement, PlacementFlags};

/// Resolve `requested` pools into an ordered, de-duplicated placement.
///
/// Device memory comes first (uncached, write-combined), then system
/// memory (any caching). An empty request falls back to system memory so
/// the list is never empty. Every entry covers the whole object and is
/// evictable.
pub fn resolve(requested: PlacementFlags) -> Placement {
    let vram = Place::new(
        MemoryType::Vram,
        CachingFlags::WRITE_COMBINED | CachingFlags::UNCACHED,
    );
    let system = Place::new(MemoryType::System, CachingFlags::MASK);

    match (
        requested.contains(PlacementFlags::VRAM),
        requested.contains(PlacementFlags::SYSTEM),
    ) {
        (true, true) => Placement::pair(vram, system),
        (true, false) => Placement::single(vram),
        (false, _) => Placement::single(system),
    }
}

/// Placement an evicted object falls back to
pub fn eviction() -> Placement {
    resolve(PlacementFlags::SYSTEM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_both_pools() {
        let pl = resolve(PlacementFlags::VRAM | PlacementFlags::SYSTEM);
        assert_eq!(pl.len(), 2);

        let vram = pl.places()[0];
        assert_eq!(vram.mem_type, MemoryType::Vram);
        assert!(vram.caching.contains(CachingFlags::WRITE_COMBINED));
        assert!(vram.caching.contains(CachingFlags::UNCACHED));
        assert!(!vram.caching.contains(CachingFlags::CACHED));

        let sys = pl.places()[1];
        assert_eq!(sys.mem_type, MemoryType::System);
        assert_eq!(sys.caching, CachingFlags::MASK);
    }

    #[test]
    fn test_resolve_vram_only() {
        let pl = resolve(PlacementFlags::VRAM);
        assert_eq!(pl.len(), 1);
        assert!(pl.allows(MemoryType::Vram));
        assert!(!pl.allows(MemoryType::System));
    }

    #[test]
    fn test_resolve_empty_falls_back_to_system() {
        let pl = resolve(PlacementFlags::empty());
        assert_eq!(pl.len(), 1);
        assert_eq!(pl.places()[0].mem_type, MemoryType::System);
    }

    #[test]
    fn test_resolve_entries_unconstrained_and_evictable() {
        for flags in [
            PlacementFlags::empty(),
            PlacementFlags::VRAM,
            PlacementFlags::SYSTEM,
            PlacementFlags::all(),
        ] {
            let pl = resolve(flags);
            assert!(!pl.is_empty());
            assert!(!pl.any_no_evict());
            assert!(pl.places().iter().all(|p| p.is_unconstrained()));
        }
    }

    #[test]
    fn test_eviction_is_system_only() {
        let pl = eviction();
        assert_eq!(pl.len(), 1);
        assert!(!pl.allows(MemoryType::Vram));
    }
}
