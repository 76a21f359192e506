//! # Dumb Buffers
//!
//! Scanout buffers allocated through the generic create-dumb path: a
//! width/height/bpp triple in, a handle, pitch and size out.

use alloc::sync::Arc;

use magma_core::{ByteSize, Error, FileId, MemoryManager, Result};

use crate::device::VramDevice;
use crate::object::GemVram;

/// Per-file handle of a buffer object
pub type GemHandle = u32;

/// The per-file handle table of a device
pub trait HandleTable: Send + Sync {
    /// Publish `object` to `file` under a new handle.
    ///
    /// The table takes its own reference and grants `file` access to the
    /// object's mmap node.
    fn create(&self, file: FileId, object: &GemVram) -> Result<GemHandle>;

    /// Look up a handle, taking a reference on the object
    fn lookup(&self, file: FileId, handle: GemHandle) -> Option<GemVram>;
}

/// Arguments and results of a create-dumb request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateDumb {
    /// Height in pixels
    pub height: u32,
    /// Width in pixels
    pub width: u32,
    /// Bits per pixel
    pub bpp: u32,
    /// Request flags (unused)
    pub flags: u32,
    /// Out: handle of the new buffer
    pub handle: GemHandle,
    /// Out: bytes per scanline
    pub pitch: u32,
    /// Out: buffer size in bytes
    pub size: u64,
}

impl CreateDumb {
    /// Create a request for a `width`×`height` buffer at `bpp`
    pub const fn new(width: u32, height: u32, bpp: u32) -> Self {
        Self {
            height,
            width,
            bpp,
            flags: 0,
            handle: 0,
            pitch: 0,
            size: 0,
        }
    }
}

/// Pitch and page-rounded size of a dumb buffer
fn dumb_layout(args: &CreateDumb) -> Result<(u32, ByteSize)> {
    let pitch = args
        .width
        .checked_mul(args.bpp.div_ceil(8))
        .ok_or(Error::InvalidArgument)?;
    let size = ByteSize::from_bytes(u64::from(pitch) * u64::from(args.height))
        .page_align()
        .ok_or(Error::InvalidArgument)?;

    if size.is_zero() {
        return Err(Error::InvalidArgument);
    }
    Ok((pitch, size))
}

/// Create a dumb buffer in `mm` and publish it to `file`.
///
/// On success `args` carries the handle, pitch and size; the handle is
/// then the only reference to the object.
pub fn fill_create_dumb(
    file: FileId,
    device: &VramDevice,
    mm: &Arc<dyn MemoryManager>,
    page_alignment: u64,
    interruptible: bool,
    args: &mut CreateDumb,
) -> Result<()> {
    let (pitch, size) = dumb_layout(args)?;

    let gbo = GemVram::create(device.registry(), mm, size, page_alignment, interruptible)?;

    // Dropping `gbo` on either path releases the creation reference.
    let handle = device.handles().create(file, &gbo)?;
    log::debug!(
        "magma-vram: dumb {}x{}@{} -> handle {} ({:?})",
        args.width,
        args.height,
        args.bpp,
        handle,
        gbo.id()
    );

    args.pitch = pitch;
    args.size = size.as_bytes();
    args.handle = handle;

    Ok(())
}

/// Create a dumb buffer in the device's VRAM memory manager
pub fn driver_dumb_create(file: FileId, device: &VramDevice, args: &mut CreateDumb) -> Result<()> {
    let Some(mm) = device.vram_mm() else {
        magma_core::warn_on_once!(true, "magma-vram: VRAM memory manager not initialized");
        return Err(Error::InvalidArgument);
    };

    let config = device.config();
    fill_create_dumb(
        file,
        device,
        mm,
        config.page_alignment,
        config.interruptible,
        args,
    )
}

/// mmap offset of the buffer behind `handle`
pub fn driver_dumb_mmap_offset(file: FileId, device: &VramDevice, handle: GemHandle) -> Result<u64> {
    let gbo = device
        .handles()
        .lookup(file, handle)
        .ok_or(Error::NotFound)?;
    Ok(gbo.mmap_offset())
}

/// Free hook of the identity service: drops the reference it owned
pub fn driver_gem_free_object(gbo: GemVram) {
    log::trace!("magma-vram: free {:?}", gbo.id());
    gbo.release();
}
