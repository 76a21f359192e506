//! # Reservation Primitive
//!
//! Advisory per-object mutual exclusion over the mutable state of a buffer
//! object (placement, pin count, mapping).
//!
//! A reservation is held by at most one mutator at a time. There is no
//! global lock across objects. Waiting is a busy wait that can be aborted
//! by a pending signal when the caller asked for interruptible behaviour,
//! or skipped entirely with `no_wait` in contexts that must not block.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

// =============================================================================
// WAIT POLICY
// =============================================================================

/// How a caller is willing to wait for a contended reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// A pending signal aborts the wait with [`Error::Interrupted`]
    pub interruptible: bool,
    /// Fail with [`Error::WouldBlock`] instead of waiting
    pub no_wait: bool,
}

impl WaitPolicy {
    /// Wait until the reservation is free, ignoring signals
    pub const UNINTERRUPTIBLE: Self = Self {
        interruptible: false,
        no_wait: false,
    };

    /// Wait until the reservation is free or a signal arrives
    pub const INTERRUPTIBLE: Self = Self {
        interruptible: true,
        no_wait: false,
    };

    /// Never wait
    pub const NO_WAIT: Self = Self {
        interruptible: true,
        no_wait: true,
    };

    /// Interruptible policy with an optional no-wait
    pub const fn interruptible(no_wait: bool) -> Self {
        Self {
            interruptible: true,
            no_wait,
        }
    }
}

// =============================================================================
// SIGNALS
// =============================================================================

/// Source of "a signal is pending for the current task"
pub trait SignalPending: Send + Sync {
    /// Check if the waiting task should abort
    fn signal_pending(&self) -> bool;
}

/// Signal source that never interrupts
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSignals;

impl SignalPending for NoSignals {
    fn signal_pending(&self) -> bool {
        false
    }
}

// =============================================================================
// RESERVATION
// =============================================================================

/// Guard proving a reservation is held
pub type ReservationGuard<'a, T> = spin::MutexGuard<'a, T>;

/// Per-object reservation lock
#[derive(Debug)]
pub struct Reservation<T> {
    inner: spin::Mutex<T>,
    /// Number of acquisitions that found the reservation busy
    contended: AtomicU64,
}

impl<T> Reservation<T> {
    /// Create an unreserved reservation around `value`
    pub const fn new(value: T) -> Self {
        Self {
            inner: spin::Mutex::new(value),
            contended: AtomicU64::new(0),
        }
    }

    /// Acquire the reservation according to `policy`
    pub fn reserve(
        &self,
        policy: WaitPolicy,
        signals: &dyn SignalPending,
    ) -> Result<ReservationGuard<'_, T>> {
        if let Some(guard) = self.inner.try_lock() {
            return Ok(guard);
        }

        self.contended.fetch_add(1, Ordering::Relaxed);
        if policy.no_wait {
            return Err(Error::WouldBlock);
        }

        loop {
            if policy.interruptible && signals.signal_pending() {
                return Err(Error::Interrupted);
            }
            if let Some(guard) = self.inner.try_lock() {
                return Ok(guard);
            }
            relax();
        }
    }

    /// Acquire only if currently free
    pub fn try_reserve(&self) -> Option<ReservationGuard<'_, T>> {
        self.inner.try_lock()
    }

    /// Check if someone holds the reservation (advisory)
    pub fn is_reserved(&self) -> bool {
        self.inner.is_locked()
    }

    /// Number of contended acquisitions so far
    pub fn contended(&self) -> u64 {
        self.contended.load(Ordering::Relaxed)
    }
}

#[cfg(any(test, feature = "std"))]
#[inline]
fn relax() {
    std::thread::yield_now();
}

#[cfg(not(any(test, feature = "std")))]
#[inline]
fn relax() {
    core::hint::spin_loop();
}
