//! Resource lifecycle contract
//!
//! Every cacheable kind implements [`Resource`]: a set of hooks for attaching
//! decoded source data and for loading into / unloading from the external
//! interface. The cache wraps each object in a slot that owns the state
//! machine
//!
//! ```text
//! Empty -> SourceAttached -> Loaded -> SourceAttached -> Empty
//! ```
//!
//! so kinds never see an out-of-order call.

pub mod font;
pub mod shader;
pub mod texture;
pub mod track;

pub use font::Font;
pub use shader::{ComputeShader, Shader};
pub use texture::Texture;
pub use track::AudioTrack;

use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::{CacheError, Result};
use crate::source::SourceFile;

/// Opaque, immutable secondary key assigned when a resource is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(Uuid);

impl GlobalId {
    /// A fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// A stable id derived from a name, for ids that come from asset metadata
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for GlobalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where a resource sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Created, no source data
    Empty,
    /// Source data decoded and attached, nothing on the external interface
    SourceAttached,
    /// Materialized on the external interface
    Loaded,
}

impl ResourceState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::SourceAttached,
            2 => Self::Loaded,
            _ => Self::Empty,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::SourceAttached => 1,
            Self::Loaded => 2,
        }
    }
}

/// Where raw bytes came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// A loose file discovered at runtime
    File,
    /// A binary packaged into the executable
    Binary,
}

/// Raw bytes handed to [`Resource::attach_source`]
#[derive(Debug, Clone, Copy)]
pub struct SourceData<'a> {
    /// Stable path-derived key
    pub key: &'a str,
    /// Lowercase extension without the dot
    pub extension: &'a str,
    pub bytes: &'a [u8],
    pub origin: Origin,
}

/// Broad classification used by the bulk populator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture,
    Shader,
    ComputeShader,
    AudioTrack,
    Font,
}

impl ResourceKind {
    /// Classify a file by its extension
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" => Some(Self::Texture),
            "vert" | "vs" | "frag" | "fs" | "geom" | "glsl" | "wgsl" => Some(Self::Shader),
            "comp" | "cs" => Some(Self::ComputeShader),
            "wav" => Some(Self::AudioTrack),
            "ttf" | "otf" => Some(Self::Font),
            _ => None,
        }
    }

    /// Whether decoding is pure computation that may run on worker threads
    ///
    /// Kinds that return `false` must do all of their work against the
    /// external interface and are processed sequentially.
    pub fn decodes_in_parallel(&self) -> bool {
        matches!(self, Self::Texture | Self::AudioTrack)
    }
}

/// Hooks a cacheable kind implements
///
/// The cache calls these only in lifecycle order and never while holding its
/// own index lock. `attach_source` may run on a worker thread; `load` and
/// `unload` run wherever the caller drives the interface from.
pub trait Resource: Default + Send + Sync + 'static {
    /// Interfaces this kind loads into
    type Backend: Backend;

    /// Human-readable kind name for logs
    const KIND: &'static str;

    /// Whether the cache indexes this kind by [`GlobalId`]
    const INDEXED: bool = true;

    /// Decode raw bytes, replacing anything decoded earlier. Must leave
    /// `self` untouched on error.
    fn attach_source(&mut self, source: &SourceData<'_>) -> Result<()>;

    /// Drop decoded source data
    fn detach_source(&mut self);

    /// Materialize into the external interface
    fn load(&mut self, backend: &Self::Backend) -> Result<()>;

    /// Release everything `load` acquired
    fn unload(&mut self, backend: &Self::Backend);
}

/// Identity and bookkeeping shared by all kinds
pub(crate) struct Header {
    id: GlobalId,
    name: RwLock<String>,
    state: AtomicU8,
    binary: AtomicBool,
    file: Mutex<Weak<SourceFile>>,
}

impl Header {
    fn new(name: String, id: GlobalId) -> Self {
        Self {
            id,
            name: RwLock::new(name),
            state: AtomicU8::new(ResourceState::Empty.as_u8()),
            binary: AtomicBool::new(false),
            file: Mutex::new(Weak::new()),
        }
    }

    pub(crate) fn id(&self) -> GlobalId {
        self.id
    }

    pub(crate) fn name(&self) -> String {
        self.name.read().clone()
    }

    pub(crate) fn set_name(&self, name: &str) {
        *self.name.write() = name.to_owned();
    }

    pub(crate) fn state(&self) -> ResourceState {
        ResourceState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ResourceState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn is_binary(&self) -> bool {
        self.binary.load(Ordering::Acquire)
    }

    pub(crate) fn file(&self) -> Option<Arc<SourceFile>> {
        self.file.lock().upgrade()
    }

    pub(crate) fn set_file(&self, file: &Arc<SourceFile>) {
        *self.file.lock() = Arc::downgrade(file);
    }

    pub(crate) fn is_from(&self, file: &SourceFile) -> bool {
        std::ptr::eq(self.file.lock().as_ptr(), file)
    }
}

/// A resource object as owned by the cache
pub(crate) struct Slot<K> {
    header: Header,
    body: RwLock<K>,
}

impl<K> Slot<K> {
    pub(crate) fn new(name: String, id: GlobalId, kind: K) -> Self {
        Self {
            header: Header::new(name, id),
            body: RwLock::new(kind),
        }
    }

    pub(crate) fn header(&self) -> &Header {
        &self.header
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&K) -> R) -> R {
        f(&self.body.read())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut K) -> R) -> R {
        f(&mut self.body.write())
    }
}

impl<K: Resource> Slot<K> {
    pub(crate) fn set_source_data(&self, source: &SourceData<'_>) -> Result<()> {
        let mut body = self.body.write();
        if self.header.state() != ResourceState::Empty {
            let name = self.header.name();
            log::warn!("Source data already set for {} '{}'", K::KIND, name);
            return Err(CacheError::SourceAlreadySet(name));
        }

        body.attach_source(source)?;
        self.header
            .binary
            .store(source.origin == Origin::Binary, Ordering::Release);
        self.header.set_state(ResourceState::SourceAttached);
        Ok(())
    }

    pub(crate) fn load(&self, backend: &K::Backend) -> Result<()> {
        let mut body = self.body.write();
        match self.header.state() {
            ResourceState::Loaded => Ok(()),
            ResourceState::Empty => Err(CacheError::NoSourceData(self.header.name())),
            ResourceState::SourceAttached => {
                body.load(backend)?;
                self.header.set_state(ResourceState::Loaded);
                log::debug!("Loaded {} '{}'", K::KIND, self.header.name());
                Ok(())
            }
        }
    }

    pub(crate) fn unload(&self, backend: &K::Backend) {
        let mut body = self.body.write();
        if self.header.state() == ResourceState::Loaded {
            body.unload(backend);
            self.header.set_state(ResourceState::SourceAttached);
        }
    }

    pub(crate) fn reset_source_data(&self) -> Result<()> {
        let mut body = self.body.write();
        match self.header.state() {
            ResourceState::Empty => Ok(()),
            ResourceState::Loaded => Err(CacheError::StillLoaded(self.header.name())),
            ResourceState::SourceAttached => {
                body.detach_source();
                self.header.binary.store(false, Ordering::Release);
                self.header.set_state(ResourceState::Empty);
                Ok(())
            }
        }
    }

    pub(crate) fn reload(&self, backend: &K::Backend) -> Result<()> {
        let mut body = self.body.write();
        match self.header.state() {
            ResourceState::Empty => return Err(CacheError::NoSourceData(self.header.name())),
            ResourceState::Loaded => {
                body.unload(backend);
                self.header.set_state(ResourceState::SourceAttached);
            }
            ResourceState::SourceAttached => {}
        }
        body.load(backend)?;
        self.header.set_state(ResourceState::Loaded);
        Ok(())
    }

    /// Swap in new source bytes under one lock
    ///
    /// A resource that was loaded before is loaded again afterwards. If the
    /// new bytes fail to decode, the previous data is kept and reloaded.
    pub(crate) fn refresh_source(
        &self,
        source: &SourceData<'_>,
        backend: &K::Backend,
    ) -> Result<()> {
        let mut body = self.body.write();
        let was_loaded = self.header.state() == ResourceState::Loaded;
        if was_loaded {
            body.unload(backend);
            self.header.set_state(ResourceState::SourceAttached);
        }

        let attached = body.attach_source(source);
        if attached.is_ok() {
            self.header
                .binary
                .store(source.origin == Origin::Binary, Ordering::Release);
            self.header.set_state(ResourceState::SourceAttached);
        }

        if was_loaded {
            body.load(backend)?;
            self.header.set_state(ResourceState::Loaded);
        }
        attached
    }
}

/// Kind-erased view of a [`Slot`] used for storage and base handles
pub(crate) trait ErasedSlot<B: Backend>: Send + Sync {
    fn header(&self) -> &Header;
    fn kind(&self) -> &'static str;
    fn set_source_data(&self, source: &SourceData<'_>) -> Result<()>;
    fn load(&self, backend: &B) -> Result<()>;
    fn unload(&self, backend: &B);
    fn reset_source_data(&self) -> Result<()>;
    fn reload(&self, backend: &B) -> Result<()>;
    fn refresh_source(&self, source: &SourceData<'_>, backend: &B) -> Result<()>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<K: Resource> ErasedSlot<K::Backend> for Slot<K> {
    fn header(&self) -> &Header {
        &self.header
    }

    fn kind(&self) -> &'static str {
        K::KIND
    }

    fn set_source_data(&self, source: &SourceData<'_>) -> Result<()> {
        Slot::set_source_data(self, source)
    }

    fn load(&self, backend: &K::Backend) -> Result<()> {
        Slot::load(self, backend)
    }

    fn unload(&self, backend: &K::Backend) {
        Slot::unload(self, backend)
    }

    fn reset_source_data(&self) -> Result<()> {
        Slot::reset_source_data(self)
    }

    fn reload(&self, backend: &K::Backend) -> Result<()> {
        Slot::reload(self, backend)
    }

    fn refresh_source(&self, source: &SourceData<'_>, backend: &K::Backend) -> Result<()> {
        Slot::refresh_source(self, source, backend)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::MockBackend;

    /// Minimal kind that counts hook invocations
    #[derive(Default)]
    pub(crate) struct Probe {
        pub(crate) payload: Vec<u8>,
        pub(crate) loads: usize,
        pub(crate) unloads: usize,
    }

    impl Resource for Probe {
        type Backend = MockBackend;
        const KIND: &'static str = "probe";

        fn attach_source(&mut self, source: &SourceData<'_>) -> Result<()> {
            if source.bytes.is_empty() {
                return Err(CacheError::InvalidData("empty probe".to_string()));
            }
            self.payload = source.bytes.to_vec();
            Ok(())
        }

        fn detach_source(&mut self) {
            self.payload.clear();
        }

        fn load(&mut self, _backend: &MockBackend) -> Result<()> {
            self.loads += 1;
            Ok(())
        }

        fn unload(&mut self, _backend: &MockBackend) {
            self.unloads += 1;
        }
    }

    fn source(bytes: &[u8]) -> SourceData<'_> {
        SourceData {
            key: "probe.bin",
            extension: "bin",
            bytes,
            origin: Origin::File,
        }
    }

    fn slot() -> Slot<Probe> {
        Slot::new("probe".to_string(), GlobalId::new(), Probe::default())
    }

    #[test]
    fn test_full_lifecycle() {
        let backend = MockBackend::new();
        let slot = slot();
        assert_eq!(slot.header().state(), ResourceState::Empty);

        slot.set_source_data(&source(b"abc")).unwrap();
        assert_eq!(slot.header().state(), ResourceState::SourceAttached);

        slot.load(&backend).unwrap();
        assert_eq!(slot.header().state(), ResourceState::Loaded);

        slot.unload(&backend);
        assert_eq!(slot.header().state(), ResourceState::SourceAttached);

        slot.reset_source_data().unwrap();
        assert_eq!(slot.header().state(), ResourceState::Empty);
        assert!(slot.read(|p| p.payload.is_empty()));
    }

    #[test]
    fn test_source_data_cannot_be_set_twice() {
        let slot = slot();
        slot.set_source_data(&source(b"one")).unwrap();

        let second = slot.set_source_data(&source(b"two"));
        assert!(matches!(second, Err(CacheError::SourceAlreadySet(_))));
        assert_eq!(slot.read(|p| p.payload.clone()), b"one");
    }

    #[test]
    fn test_load_and_unload_are_idempotent() {
        let backend = MockBackend::new();
        let slot = slot();
        slot.set_source_data(&source(b"abc")).unwrap();

        slot.load(&backend).unwrap();
        slot.load(&backend).unwrap();
        assert_eq!(slot.read(|p| p.loads), 1);

        slot.unload(&backend);
        slot.unload(&backend);
        assert_eq!(slot.read(|p| p.unloads), 1);
    }

    #[test]
    fn test_load_without_source_is_rejected() {
        let slot = slot();
        let result = slot.load(&MockBackend::new());
        assert!(matches!(result, Err(CacheError::NoSourceData(_))));
        assert_eq!(slot.header().state(), ResourceState::Empty);
    }

    #[test]
    fn test_reset_requires_unload_first() {
        let backend = MockBackend::new();
        let slot = slot();
        slot.set_source_data(&source(b"abc")).unwrap();
        slot.load(&backend).unwrap();

        assert!(matches!(
            slot.reset_source_data(),
            Err(CacheError::StillLoaded(_))
        ));
        assert_eq!(slot.header().state(), ResourceState::Loaded);
    }

    #[test]
    fn test_failed_attach_stays_empty() {
        let slot = slot();
        assert!(slot.set_source_data(&source(b"")).is_err());
        assert_eq!(slot.header().state(), ResourceState::Empty);
    }

    #[test]
    fn test_reload_cycles_through_unload() {
        let backend = MockBackend::new();
        let slot = slot();
        slot.set_source_data(&source(b"abc")).unwrap();
        slot.load(&backend).unwrap();

        slot.reload(&backend).unwrap();
        assert_eq!(slot.read(|p| (p.loads, p.unloads)), (2, 1));
        assert_eq!(slot.header().state(), ResourceState::Loaded);
    }

    #[test]
    fn test_refresh_source_replaces_payload() {
        let backend = MockBackend::new();
        let slot = slot();
        slot.set_source_data(&source(b"old")).unwrap();
        slot.load(&backend).unwrap();

        slot.refresh_source(&source(b"new"), &backend).unwrap();
        assert_eq!(slot.read(|p| p.payload.clone()), b"new");
        assert_eq!(slot.header().state(), ResourceState::Loaded);
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(ResourceKind::from_extension("PNG"), Some(ResourceKind::Texture));
        assert_eq!(ResourceKind::from_extension("comp"), Some(ResourceKind::ComputeShader));
        assert_eq!(ResourceKind::from_extension("txt"), None);
        assert!(ResourceKind::AudioTrack.decodes_in_parallel());
        assert!(!ResourceKind::Font.decodes_in_parallel());
    }

    #[test]
    fn test_global_id_from_name_is_stable() {
        assert_eq!(GlobalId::from_name("a"), GlobalId::from_name("a"));
        assert_ne!(GlobalId::new(), GlobalId::new());
    }
}
