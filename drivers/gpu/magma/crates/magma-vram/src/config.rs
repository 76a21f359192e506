//! # Configuration
//!
//! Per-device knobs for the dumb-buffer and PRIME paths.

use magma_core::PlacementFlags;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// VRAM helper configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VramConfig {
    /// Buffer alignment in pages passed to the manager (0 = manager default)
    pub page_alignment: u64,
    /// Allocation waits may be interrupted by a signal
    pub interruptible: bool,
    /// Pools used when pinning buffers for PRIME export
    pub prime_pin_domain: PlacementFlags,
}

impl Default for VramConfig {
    fn default() -> Self {
        Self {
            page_alignment: 0,
            interruptible: false,
            prime_pin_domain: PlacementFlags::VRAM,
        }
    }
}

impl VramConfig {
    /// Create configuration with a fixed buffer alignment
    pub fn with_alignment(page_alignment: u64) -> Self {
        Self {
            page_alignment,
            ..Default::default()
        }
    }

    /// Create configuration whose allocation waits can be interrupted
    pub fn interruptible() -> Self {
        Self {
            interruptible: true,
            ..Default::default()
        }
    }

    /// Create configuration pinning PRIME buffers into `domain`
    pub fn with_prime_domain(domain: PlacementFlags) -> Self {
        Self {
            prime_pin_domain: domain,
            ..Default::default()
        }
    }
}
