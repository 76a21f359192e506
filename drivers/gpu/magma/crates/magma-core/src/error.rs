//! # MAGMA Error Handling
//!
//! Error taxonomy for buffer-object placement, reservation and mapping.
//!
//! Error handling in MAGMA follows these principles:
//! - Errors are typed and categorized
//! - No panics in production code paths
//! - Failed operations unwind their partial state before returning
//! - Errors are `no_std` compatible

use core::fmt;

// =============================================================================
// RESULT TYPE
// =============================================================================

/// MAGMA Result type alias
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// ERRNO VALUES
// =============================================================================

const EINVAL: i32 = 22;
const ENOMEM: i32 = 12;
const EBUSY: i32 = 16;
const ERESTARTSYS: i32 = 512;
const ENODEV: i32 = 19;
const ENOENT: i32 = 2;
const EACCES: i32 = 13;
const EFAULT: i32 = 14;

// =============================================================================
// ERROR ENUM
// =============================================================================

/// MAGMA unified error type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Error {
    /// Zero or otherwise invalid size, missing memory manager
    InvalidArgument,
    /// Allocation or migration into the requested placement failed
    OutOfMemory,
    /// Reservation is contended and the caller asked not to wait
    WouldBlock,
    /// A pending signal aborted an interruptible wait
    Interrupted,
    /// Device offset requested for an object that is not pinned
    NotPinned,
    /// Handle lookup missed
    NotFound,
    /// Caller is not allowed to access the object
    PermissionDenied,
    /// Kernel mapping of the object failed
    MappingFailed,
}

impl Error {
    /// Negative errno reported on the driver-facing surface
    pub const fn errno(self) -> i32 {
        -match self {
            Self::InvalidArgument => EINVAL,
            Self::OutOfMemory => ENOMEM,
            Self::WouldBlock => EBUSY,
            Self::Interrupted => ERESTARTSYS,
            Self::NotPinned => ENODEV,
            Self::NotFound => ENOENT,
            Self::PermissionDenied => EACCES,
            Self::MappingFailed => EFAULT,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::WouldBlock => write!(f, "reservation busy"),
            Self::Interrupted => write!(f, "wait interrupted by signal"),
            Self::NotPinned => write!(f, "buffer object is not pinned"),
            Self::NotFound => write!(f, "object not found"),
            Self::PermissionDenied => write!(f, "access denied"),
            Self::MappingFailed => write!(f, "kernel mapping failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
