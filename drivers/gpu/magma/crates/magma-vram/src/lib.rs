//! # MAGMA VRAM Buffer Objects
//!
//! GEM buffer objects backed by device memory, with system memory as the
//! fallback pool. The helper sits between a display driver and the shared
//! MAGMA memory manager: it decides where objects may live, pins them for
//! scanout and export, and keeps a kernel mapping around for CPU access.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          magma-vram                            │
//! │  ┌─────────────┐   ┌──────────────┐   ┌────────────────────┐   │
//! │  │  Dumb/PRIME │──▶│  GemVram     │──▶│  Placement policy  │   │
//! │  │  glue       │   │  (lifecycle) │   └────────────────────┘   │
//! │  └─────────────┘   └──────┬───────┘                            │
//! │                           │ reservation                        │
//! │                    ┌──────┴───────┐   ┌────────────────────┐   │
//! │                    │  ReservedBo  │──▶│  pin / kmap        │   │
//! │                    └──────────────┘   └────────────────────┘   │
//! └───────────────────────────┬────────────────────────────────────┘
//!                             │ validate / kmap / put      ▲ evict_flags
//!                             ▼                            │ verify_access
//!                      MemoryManager ──────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use magma_vram::{GemVram, PlacementFlags};
//!
//! let gbo = GemVram::create(&registry, &mm, ByteSize::from_kib(64), 0, false)?;
//! gbo.pin(PlacementFlags::VRAM)?;
//! let scanout = gbo.offset()?;
//! gbo.unpin()?;
//! ```

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod config;
pub mod device;
pub mod driver;
pub mod dumb;
pub mod kmap;
pub mod object;
mod pin;
pub mod placement;
pub mod prime;

#[cfg(test)]
mod mock;

pub use config::VramConfig;
pub use device::VramDevice;
pub use driver::{
    as_gem_vram, bo_driver_evict_flags, bo_driver_verify_access, GemVramFuncs, GEM_VRAM_MM_FUNCS,
};
pub use dumb::{
    driver_dumb_create, driver_dumb_mmap_offset, driver_gem_free_object, fill_create_dumb,
    CreateDumb, GemHandle, HandleTable,
};
pub use kmap::{Kmap, Mapped};
pub use object::{GemVram, GemVramObject, Lifecycle, PinState, ReservedBo};
pub use prime::{gem_prime_mmap, gem_prime_pin, gem_prime_unpin, gem_prime_vmap, gem_prime_vunmap};

pub use magma_core::{ByteSize, Error, FileId, GpuAddr, PlacementFlags, Result, VirtAddr};
