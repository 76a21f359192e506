//! # MAGMA Core
//!
//! Foundational types and traits shared by the MAGMA memory manager and the
//! drivers that place buffer objects through it.
//!
//! This crate has no execution logic of its own. It defines the vocabulary
//! the buffer-object helpers speak with the memory manager: where an object
//! may live, how its mutable state is reserved, and which callbacks flow in
//! each direction.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      magma-core                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │   Traits    │  │   Memory    │  │     Error           │  │
//! │  │ (Manager,   │  │ (Place,     │  │   Handling          │  │
//! │  │  Registry)  │  │  Placement) │  │                     │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! │  ┌─────────────┐  ┌─────────────────────────────────────┐   │
//! │  │   Types     │  │   Sync (per-object reservation)     │   │
//! │  └─────────────┘  └─────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod error;
pub mod memory;
pub mod sync;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use error::{Error, Result};
pub use memory::{CachingFlags, MemoryType, Place, Placement, PlacementFlags, MAX_PLACEMENTS};
pub use sync::{NoSignals, Reservation, ReservationGuard, SignalPending, WaitPolicy};
pub use traits::*;
pub use types::*;

#[doc(hidden)]
pub use log as __log;

// =============================================================================
// DIAGNOSTICS
// =============================================================================

/// Emit a warning the first time a condition holds at this call site.
///
/// Evaluates to the condition, so it can guard an early return.
#[macro_export]
macro_rules! warn_on_once {
    ($cond:expr, $($arg:tt)*) => {{
        static WARNED: ::core::sync::atomic::AtomicBool =
            ::core::sync::atomic::AtomicBool::new(false);
        let hit: bool = $cond;
        if hit && !WARNED.swap(true, ::core::sync::atomic::Ordering::Relaxed) {
            $crate::__log::warn!($($arg)*);
        }
        hit
    }};
}
