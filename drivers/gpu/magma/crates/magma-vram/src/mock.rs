//! In-memory collaborators for unit tests.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use magma_core::{
    BoDriver, ByteSize, Error, FileId, GpuAddr, KernelMapping, ManagedObject, MemoryManager,
    MemoryType, ObjectId, ObjectKind, ObjectRegistry, OperationCtx, Placement, Result,
    SignalPending, VirtAddr, PAGE_SHIFT,
};

use crate::config::VramConfig;
use crate::device::VramDevice;
use crate::dumb::{GemHandle, HandleTable};
use crate::object::GemVram;

const MMAP_BASE: u64 = 0x1_0000_0000;
const KMAP_BASE: usize = 0x4000_0000;

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    live: BTreeSet<ObjectId>,
    access: BTreeMap<ObjectId, Vec<FileId>>,
    allocated: usize,
    released: usize,
    fail_next_init: bool,
}

/// Identity service with per-object access lists
#[derive(Default)]
pub struct MockRegistry {
    state: Mutex<RegistryState>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocated(&self) -> usize {
        self.state.lock().allocated
    }

    pub fn released(&self) -> usize {
        self.state.lock().released
    }

    pub fn fail_next_init(&self) {
        self.state.lock().fail_next_init = true;
    }

    pub fn is_live(&self, id: ObjectId) -> bool {
        self.state.lock().live.contains(&id)
    }

    pub fn grant(&self, id: ObjectId, file: FileId) {
        self.state.lock().access.entry(id).or_default().push(file);
    }
}

impl ObjectRegistry for MockRegistry {
    fn object_init(&self, _size: ByteSize) -> Result<ObjectId> {
        let mut state = self.state.lock();
        if core::mem::take(&mut state.fail_next_init) {
            return Err(Error::OutOfMemory);
        }
        state.next_id += 1;
        let id = ObjectId::new(state.next_id);
        state.live.insert(id);
        state.allocated += 1;
        Ok(id)
    }

    fn object_release(&self, object: ObjectId) {
        let mut state = self.state.lock();
        assert!(state.live.remove(&object), "double release of {:?}", object);
        state.access.remove(&object);
        state.released += 1;
    }

    fn verify_access(&self, object: ObjectId, file: FileId) -> bool {
        self.state
            .lock()
            .access
            .get(&object)
            .is_some_and(|files| files.contains(&file))
    }
}

// =============================================================================
// MEMORY MANAGER
// =============================================================================

struct MockBo {
    object: Arc<dyn ManagedObject>,
    pool: MemoryType,
    no_evict: bool,
    gpu_offset: u64,
}

#[derive(Default)]
struct ManagerState {
    objects: BTreeMap<ObjectId, MockBo>,
    pending: Vec<Arc<dyn ManagedObject>>,
    next_offset: u64,
    fail_next_init: bool,
    fail_next_validate: bool,
    fail_next_kmap: bool,
    validate_calls: usize,
    put_calls: usize,
    kmap_calls: usize,
    kunmap_calls: usize,
    destroy_calls: usize,
    last_kmap_pages: Option<u64>,
    last_init_alignment: Option<u64>,
}

/// Memory manager that records calls and places objects in the first
/// acceptable pool
#[derive(Default)]
pub struct MockManager {
    state: Mutex<ManagerState>,
    deferred: bool,
    signal: AtomicBool,
}

fn first_pool(placement: &Placement) -> MemoryType {
    placement
        .places()
        .first()
        .map_or(MemoryType::System, |p| p.mem_type)
}

impl MockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager that runs destroy hooks only from [`MockManager::run_deferred`]
    pub fn deferred() -> Self {
        Self {
            deferred: true,
            ..Self::default()
        }
    }

    pub fn run_deferred(&self) {
        let pending = {
            let mut state = self.state.lock();
            let pending = core::mem::take(&mut state.pending);
            state.destroy_calls += pending.len();
            pending
        };
        for object in pending {
            object.destroy();
        }
    }

    /// Evict an object the way the manager does under memory pressure
    pub fn evict(&self, id: ObjectId, driver: &dyn BoDriver) -> Result<()> {
        let object = {
            let state = self.state.lock();
            let bo = state.objects.get(&id).ok_or(Error::NotFound)?;
            if bo.no_evict {
                return Err(Error::WouldBlock);
            }
            Arc::clone(&bo.object)
        };
        let placement = driver
            .evict_flags(object.as_ref())
            .ok_or(Error::InvalidArgument)?;

        let mut state = self.state.lock();
        let bo = state.objects.get_mut(&id).ok_or(Error::NotFound)?;
        bo.pool = first_pool(&placement);
        Ok(())
    }

    pub fn current_pool(&self, id: ObjectId) -> Option<MemoryType> {
        self.state.lock().objects.get(&id).map(|bo| bo.pool)
    }

    pub fn fail_next_init(&self) {
        self.state.lock().fail_next_init = true;
    }

    pub fn fail_next_validate(&self) {
        self.state.lock().fail_next_validate = true;
    }

    pub fn fail_next_kmap(&self) {
        self.state.lock().fail_next_kmap = true;
    }

    pub fn raise_signal(&self) {
        self.signal.store(true, Ordering::SeqCst);
    }

    pub fn clear_signal(&self) {
        self.signal.store(false, Ordering::SeqCst);
    }

    pub fn live_objects(&self) -> usize {
        self.state.lock().objects.len()
    }

    pub fn validate_calls(&self) -> usize {
        self.state.lock().validate_calls
    }

    pub fn put_calls(&self) -> usize {
        self.state.lock().put_calls
    }

    pub fn kmap_calls(&self) -> usize {
        self.state.lock().kmap_calls
    }

    pub fn kunmap_calls(&self) -> usize {
        self.state.lock().kunmap_calls
    }

    pub fn destroy_calls(&self) -> usize {
        self.state.lock().destroy_calls
    }

    pub fn last_kmap_pages(&self) -> Option<u64> {
        self.state.lock().last_kmap_pages
    }

    pub fn last_init_alignment(&self) -> Option<u64> {
        self.state.lock().last_init_alignment
    }
}

impl SignalPending for MockManager {
    fn signal_pending(&self) -> bool {
        self.signal.load(Ordering::SeqCst)
    }
}

impl MemoryManager for MockManager {
    fn init_object(
        &self,
        object: Arc<dyn ManagedObject>,
        size: ByteSize,
        placement: &Placement,
        page_alignment: u64,
        _ctx: OperationCtx,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.last_init_alignment = Some(page_alignment);
        if core::mem::take(&mut state.fail_next_init) {
            return Err(Error::OutOfMemory);
        }

        let gpu_offset = state.next_offset;
        state.next_offset += size.as_bytes();
        state.objects.insert(
            object.id(),
            MockBo {
                object,
                pool: first_pool(placement),
                no_evict: placement.any_no_evict(),
                gpu_offset,
            },
        );
        Ok(())
    }

    fn validate(&self, object: ObjectId, placement: &Placement, _ctx: OperationCtx) -> Result<()> {
        let mut state = self.state.lock();
        state.validate_calls += 1;
        if core::mem::take(&mut state.fail_next_validate) {
            return Err(Error::OutOfMemory);
        }

        let bo = state.objects.get_mut(&object).ok_or(Error::NotFound)?;
        bo.pool = first_pool(placement);
        bo.no_evict = placement.any_no_evict();
        Ok(())
    }

    fn put(&self, object: ObjectId) {
        let removed = {
            let mut state = self.state.lock();
            state.put_calls += 1;
            match state.objects.remove(&object).map(|bo| bo.object) {
                Some(obj) if self.deferred => {
                    state.pending.push(obj);
                    None
                }
                Some(obj) => {
                    state.destroy_calls += 1;
                    Some(obj)
                }
                None => None,
            }
        };
        // The destroy hook may call back into the registry; run it unlocked.
        if let Some(obj) = removed {
            obj.destroy();
        }
    }

    fn gpu_offset(&self, object: ObjectId) -> GpuAddr {
        let offset = self
            .state
            .lock()
            .objects
            .get(&object)
            .map_or(0, |bo| bo.gpu_offset);
        GpuAddr::new(offset)
    }

    fn mmap_offset(&self, object: ObjectId) -> u64 {
        MMAP_BASE + (object.id() << PAGE_SHIFT)
    }

    fn kmap(&self, object: ObjectId, first_page: u64, num_pages: u64) -> Result<KernelMapping> {
        let mut state = self.state.lock();
        state.kmap_calls += 1;
        if core::mem::take(&mut state.fail_next_kmap) {
            return Err(Error::MappingFailed);
        }

        let pool = state.objects.get(&object).ok_or(Error::NotFound)?.pool;
        state.last_kmap_pages = Some(num_pages);
        Ok(KernelMapping {
            object,
            virt: VirtAddr::new(KMAP_BASE + ((object.id() as usize) << 20)),
            is_iomem: pool.is_iomem(),
            first_page,
            num_pages,
        })
    }

    fn kunmap(&self, _mapping: KernelMapping) {
        self.state.lock().kunmap_calls += 1;
    }
}

// =============================================================================
// HANDLES
// =============================================================================

#[derive(Default)]
struct HandleState {
    next: GemHandle,
    table: BTreeMap<(FileId, GemHandle), GemVram>,
    fail_next_create: bool,
}

/// Handle table that grants access through a [`MockRegistry`]
pub struct MockHandles {
    registry: Arc<MockRegistry>,
    state: Mutex<HandleState>,
}

impl MockHandles {
    pub fn new(registry: Arc<MockRegistry>) -> Self {
        Self {
            registry,
            state: Mutex::new(HandleState::default()),
        }
    }

    pub fn fail_next_create(&self) {
        self.state.lock().fail_next_create = true;
    }

    /// Drop a handle; the object is released outside the table lock
    pub fn close(&self, file: FileId, handle: GemHandle) {
        let removed = self.state.lock().table.remove(&(file, handle));
        drop(removed);
    }
}

impl HandleTable for MockHandles {
    fn create(&self, file: FileId, object: &GemVram) -> Result<GemHandle> {
        let mut state = self.state.lock();
        if core::mem::take(&mut state.fail_next_create) {
            return Err(Error::OutOfMemory);
        }
        state.next += 1;
        let handle = state.next;
        state.table.insert((file, handle), object.retain());
        self.registry.grant(object.id(), file);
        Ok(handle)
    }

    fn lookup(&self, file: FileId, handle: GemHandle) -> Option<GemVram> {
        self.state.lock().table.get(&(file, handle)).cloned()
    }
}

// =============================================================================
// FOREIGN OBJECTS
// =============================================================================

/// Object of another driver sharing the manager
pub struct Foreign {
    id: ObjectId,
}

impl Foreign {
    pub fn new(id: u64) -> Self {
        Self {
            id: ObjectId::new(id),
        }
    }
}

impl ManagedObject for Foreign {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Other(0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn destroy(&self) {}
}

// =============================================================================
// FIXTURES
// =============================================================================

pub fn setup() -> (Arc<MockRegistry>, Arc<MockManager>) {
    (Arc::new(MockRegistry::new()), Arc::new(MockManager::new()))
}

pub fn create(registry: &Arc<MockRegistry>, mm: &Arc<MockManager>, size: u64) -> Result<GemVram> {
    let registry: Arc<dyn ObjectRegistry> = registry.clone();
    let mm: Arc<dyn MemoryManager> = mm.clone();
    GemVram::create(&registry, &mm, ByteSize::from_bytes(size), 0, false)
}

/// A device wired to mock collaborators
pub struct Env {
    pub registry: Arc<MockRegistry>,
    pub mm: Arc<MockManager>,
    pub handles: Arc<MockHandles>,
    pub device: VramDevice,
}

impl Env {
    pub fn new() -> Self {
        Self::with_config(VramConfig::default())
    }

    pub fn with_config(config: VramConfig) -> Self {
        let (registry, mm) = setup();
        let handles = Arc::new(MockHandles::new(Arc::clone(&registry)));
        let device = VramDevice::new(registry.clone(), handles.clone())
            .with_vram_mm(mm.clone())
            .with_config(config);
        Self {
            registry,
            mm,
            handles,
            device,
        }
    }

    pub fn create(&self, size: u64) -> GemVram {
        create(&self.registry, &self.mm, size).unwrap()
    }
}
