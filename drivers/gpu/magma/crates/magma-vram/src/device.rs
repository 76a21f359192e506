//! # Device Context
//!
//! What the dumb-buffer and PRIME entry points need to know about the
//! device they serve: its identity service, its handle table, the VRAM
//! memory manager (if one was set up) and the helper configuration.

use alloc::sync::Arc;
use core::fmt;

use magma_core::{MemoryManager, ObjectRegistry};

use crate::config::VramConfig;
use crate::dumb::HandleTable;

/// A device using VRAM-backed buffer objects
#[derive(Clone)]
pub struct VramDevice {
    registry: Arc<dyn ObjectRegistry>,
    handles: Arc<dyn HandleTable>,
    vram_mm: Option<Arc<dyn MemoryManager>>,
    config: VramConfig,
}

impl VramDevice {
    /// Create a device without a VRAM memory manager
    pub fn new(registry: Arc<dyn ObjectRegistry>, handles: Arc<dyn HandleTable>) -> Self {
        Self {
            registry,
            handles,
            vram_mm: None,
            config: VramConfig::default(),
        }
    }

    /// Attach the device's VRAM memory manager
    pub fn with_vram_mm(mut self, mm: Arc<dyn MemoryManager>) -> Self {
        self.vram_mm = Some(mm);
        self
    }

    /// Replace the helper configuration
    pub fn with_config(mut self, config: VramConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the identity service
    pub fn registry(&self) -> &Arc<dyn ObjectRegistry> {
        &self.registry
    }

    /// Get the handle table
    pub fn handles(&self) -> &Arc<dyn HandleTable> {
        &self.handles
    }

    /// Get the VRAM memory manager, if initialized
    pub fn vram_mm(&self) -> Option<&Arc<dyn MemoryManager>> {
        self.vram_mm.as_ref()
    }

    /// Get the configuration
    pub fn config(&self) -> &VramConfig {
        &self.config
    }
}

impl fmt::Debug for VramDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VramDevice")
            .field("vram_mm", &self.vram_mm.is_some())
            .field("config", &self.config)
            .finish()
    }
}
