//! # MAGMA Core Types
//!
//! Fundamental type definitions used across the buffer-object stack.
//!
//! These types provide:
//! - Strong typing for addresses (CPU mapping vs GPU offset)
//! - Opaque identities for objects and client files
//! - Page-granular size arithmetic

use core::fmt;

// =============================================================================
// PAGE GEOMETRY
// =============================================================================

/// log2 of the allocation granularity
pub const PAGE_SHIFT: u32 = 12;

/// Allocation granularity in bytes
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

static_assertions::const_assert!(PAGE_SIZE.is_power_of_two());

// =============================================================================
// GPU ADDRESS
// =============================================================================

/// Offset of an object inside device memory
///
/// This is NOT a CPU pointer and cannot be dereferenced directly.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct GpuAddr(u64);

impl GpuAddr {
    /// Create a new GPU address
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Get the raw u64 value
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for GpuAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GpuAddr(0x{:016x})", self.0)
    }
}

// =============================================================================
// KERNEL VIRTUAL ADDRESS
// =============================================================================

/// CPU-visible address of a kernel mapping
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct VirtAddr(usize);

impl VirtAddr {
    /// Create a new virtual address
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw value
    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr(0x{:x})", self.0)
    }
}

// =============================================================================
// SIZE TYPES
// =============================================================================

/// Size in bytes
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct ByteSize(u64);

impl ByteSize {
    /// Zero size
    pub const ZERO: Self = Self(0);
    /// One page
    pub const PAGE: Self = Self(PAGE_SIZE);

    /// Create from bytes
    #[inline]
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Create from KiB
    #[inline]
    pub const fn from_kib(kib: u64) -> Self {
        Self(kib * 1024)
    }

    /// Get as bytes
    #[inline]
    pub const fn as_bytes(self) -> u64 {
        self.0
    }

    /// Check if zero
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Round up to the page size, `None` on overflow
    #[inline]
    pub const fn page_align(self) -> Option<Self> {
        match self.0.checked_add(PAGE_SIZE - 1) {
            Some(v) => Some(Self(v & !(PAGE_SIZE - 1))),
            None => None,
        }
    }

    /// Number of pages covered (rounded up)
    #[inline]
    pub const fn pages(self) -> u64 {
        self.0.div_ceil(PAGE_SIZE)
    }
}

impl fmt::Debug for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1024 * 1024 * 1024 {
            write!(f, "{} GiB", self.0 / (1024 * 1024 * 1024))
        } else if self.0 >= 1024 * 1024 {
            write!(f, "{} MiB", self.0 / (1024 * 1024))
        } else if self.0 >= 1024 {
            write!(f, "{} KiB", self.0 / 1024)
        } else {
            write!(f, "{} B", self.0)
        }
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// HANDLE TYPES
// =============================================================================

/// Opaque identity of a resource
///
/// Handles are type-safe wrappers that prevent mixing different resource types.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Handle<T> {
    id: u64,
    _marker: core::marker::PhantomData<T>,
}

impl<T> Handle<T> {
    /// Create a new handle
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self {
            id,
            _marker: core::marker::PhantomData,
        }
    }

    /// Get the raw ID
    #[inline]
    pub const fn id(self) -> u64 {
        self.id
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = core::any::type_name::<T>();
        let short = name.rsplit("::").next().unwrap_or(name);
        write!(f, "{}(0x{:x})", short, self.id)
    }
}

// Marker types for handles
/// Marker for buffer object identities
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectMarker;
/// Marker for client file identities
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileMarker;

/// Identity of a buffer object, stable for its lifetime
pub type ObjectId = Handle<ObjectMarker>;
/// Identity of a client (an open device file)
pub type FileId = Handle<FileMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_align() {
        assert_eq!(ByteSize::from_bytes(1).page_align(), Some(ByteSize::PAGE));
        assert_eq!(ByteSize::from_bytes(4096).page_align(), Some(ByteSize::PAGE));
        assert_eq!(
            ByteSize::from_bytes(4097).page_align(),
            Some(ByteSize::from_kib(8))
        );
        assert_eq!(ByteSize::ZERO.page_align(), Some(ByteSize::ZERO));
        assert_eq!(ByteSize::from_bytes(u64::MAX).page_align(), None);
    }

    #[test]
    fn test_pages() {
        assert_eq!(ByteSize::from_kib(4).pages(), 1);
        assert_eq!(ByteSize::from_bytes(4097).pages(), 2);
        assert_eq!(ByteSize::ZERO.pages(), 0);
    }

    #[test]
    fn test_handle_debug() {
        let id = ObjectId::new(0x2a);
        assert_eq!(alloc::format!("{:?}", id), "ObjectMarker(0x2a)");
    }
}
