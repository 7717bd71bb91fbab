//! Keyed resource cache
//!
//! The cache is the sole owner of every resource it creates: it keeps one
//! strong handle per entry, keyed by name, plus a secondary index from
//! [`GlobalId`] to name. Callers receive weak handles.
//!
//! One lock covers both indexes and nothing else. Resource hooks (decode,
//! load, unload) always run outside it, so an entry becomes visible to other
//! threads as soon as it is inserted, possibly before its `load` has
//! finished. Check [`Handle::state`] when reading concurrently with
//! population.
//!
//! "Not found" and "already present" are never errors: they are logged and
//! answered with a null handle, the existing entry, or `false`.

pub mod metrics;

use parking_lot::RwLock;
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::backend::{Backend, MockBackend};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::handle::{AnyHandle, Handle, ResourceHandle};
use crate::resource::font::font_key;
use crate::resource::{Font, GlobalId, Resource, Slot};
use crate::source::SourceFile;
use metrics::CacheMetricsHandle;

struct Index<B: Backend> {
    by_name: HashMap<String, AnyHandle<B>>,
    by_id: HashMap<GlobalId, String>,
}

impl<B: Backend> Index<B> {
    fn remove(&mut self, name: &str) -> Option<AnyHandle<B>> {
        let handle = self.by_name.remove(name)?;
        if let Some(id) = handle.id() {
            if self.by_id.get(&id).is_some_and(|indexed| indexed == name) {
                self.by_id.remove(&id);
            }
        }
        Some(handle)
    }

    fn rename(&mut self, handle: AnyHandle<B>, name: &str, new_name: &str) {
        if let Some(id) = handle.id() {
            if let Some(indexed) = self.by_id.get_mut(&id) {
                if indexed.as_str() == name {
                    *indexed = new_name.to_string();
                }
            }
        }
        handle.with_header(|header| header.set_name(new_name));
        self.by_name.insert(new_name.to_string(), handle);
    }
}

enum Inserted<K> {
    Created(Handle<K>),
    Existing(Handle<K>),
}

/// Registry of named resources driven by backend `B`
///
/// Construct one per subsystem and pass it by reference. [`Self::unload_all`]
/// is the teardown; dropping a non-empty cache runs it.
pub struct ResourceCache<B: Backend = MockBackend> {
    index: RwLock<Index<B>>,
    backend: B,
    config: CacheConfig,
    metrics: CacheMetricsHandle,
}

impl<B: Backend> ResourceCache<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, CacheConfig::default())
    }

    pub fn with_config(backend: B, config: CacheConfig) -> Self {
        let config = config.normalized();
        Self {
            index: RwLock::new(Index {
                by_name: HashMap::with_capacity(config.initial_capacity),
                by_id: HashMap::with_capacity(config.initial_capacity),
            }),
            backend,
            config,
            metrics: CacheMetricsHandle::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn metrics(&self) -> &CacheMetricsHandle {
        &self.metrics
    }

    fn insert<K: Resource<Backend = B>>(&self, name: &str, id: GlobalId, kind: K) -> Inserted<K> {
        // Allocate before taking the lock
        let owner = Handle::from_arc(Arc::new(Slot::new(name.to_string(), id, kind)));

        let mut index = self.index.write();
        if let Some(existing) = index.by_name.get(name) {
            let existing = existing.downcast::<K>().downgrade();
            drop(index);
            log::warn!("{} '{}' is already in the cache", K::KIND, name);
            self.metrics.record_duplicate();
            return Inserted::Existing(existing);
        }

        let mut id_taken = false;
        if K::INDEXED {
            match index.by_id.entry(id) {
                MapEntry::Occupied(_) => id_taken = true,
                MapEntry::Vacant(slot) => {
                    slot.insert(name.to_string());
                }
            }
        }
        let observer = owner.downgrade();
        index.by_name.insert(name.to_string(), owner.erase());
        drop(index);

        if id_taken {
            log::error!(
                "Global id {} is already indexed; {} '{}' is reachable by name only",
                id,
                K::KIND,
                name
            );
        }
        Inserted::Created(observer)
    }

    /// Create an empty resource under `name`
    ///
    /// If the name is taken, the existing entry is returned instead (null if
    /// it has another kind).
    pub fn add<K: Resource<Backend = B>>(&self, name: &str) -> Handle<K> {
        self.add_with_id(name, GlobalId::new())
    }

    /// Like [`Self::add`], with an explicit global id
    pub fn add_with_id<K: Resource<Backend = B>>(&self, name: &str, id: GlobalId) -> Handle<K> {
        match self.insert(name, id, K::default()) {
            Inserted::Created(handle) | Inserted::Existing(handle) => handle,
        }
    }

    /// Create a resource from `file`, keyed by the file's key
    ///
    /// With `populate_interface` false, the resource is decoded but not
    /// loaded; finish it later with [`Self::populate_interface`].
    pub fn load<K: Resource<Backend = B>>(
        &self,
        file: &Arc<SourceFile>,
        populate_interface: bool,
    ) -> Handle<K> {
        self.load_named(file.key(), file, populate_interface)
    }

    pub fn load_named<K: Resource<Backend = B>>(
        &self,
        name: &str,
        file: &Arc<SourceFile>,
        populate_interface: bool,
    ) -> Handle<K> {
        self.load_with(name, file, populate_interface, |_| {})
    }

    /// Create a resource from `file`, adjusting it with `configure` before
    /// the source is attached
    ///
    /// Decode and load failures are logged. The entry stays in the cache in
    /// whatever state it reached.
    pub fn load_with<K: Resource<Backend = B>>(
        &self,
        name: &str,
        file: &Arc<SourceFile>,
        populate_interface: bool,
        configure: impl FnOnce(&mut K),
    ) -> Handle<K> {
        let start = Instant::now();
        let mut kind = K::default();
        configure(&mut kind);

        let handle = match self.insert(name, GlobalId::new(), kind) {
            Inserted::Created(handle) => handle,
            Inserted::Existing(handle) => return handle,
        };

        handle.bind_file(file);
        let attached = file
            .with_source(|source| handle.set_source_data(source))
            .and_then(|result| result);
        if let Err(e) = attached {
            log::error!("Failed to decode {} '{}': {}", K::KIND, name, e);
            self.metrics.record_failure();
            return handle;
        }

        if populate_interface {
            if let Err(e) = handle.load(&self.backend) {
                log::error!("Failed to load {} '{}': {}", K::KIND, name, e);
                self.metrics.record_failure();
                return handle;
            }
        }

        self.metrics.record_load_time(name, start.elapsed());
        handle
    }

    /// Create a font instance at `pixel_size`, keyed `"{key}@{size}"`
    pub fn load_font(
        &self,
        file: &Arc<SourceFile>,
        pixel_size: u32,
        populate_interface: bool,
    ) -> Handle<Font<B>> {
        let pixel_size = pixel_size.max(1);
        let name = font_key(file.key(), pixel_size);
        self.load_with(&name, file, populate_interface, |font: &mut Font<B>| {
            font.set_pixel_size(pixel_size)
        })
    }

    /// Run the deferred `load` for an entry created without it
    pub fn populate_interface<K: Resource<Backend = B>>(&self, handle: &Handle<K>) -> bool {
        self.populate_any(&handle.erase())
    }

    pub(crate) fn populate_any(&self, handle: &AnyHandle<B>) -> bool {
        match handle.load(&self.backend) {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "Failed to load {} '{}': {}",
                    handle.kind().unwrap_or("resource"),
                    handle.name().unwrap_or_default(),
                    e
                );
                self.metrics.record_failure();
                false
            }
        }
    }

    /// Weak handle to the entry named `name`
    pub fn get<K: Resource<Backend = B>>(&self, name: &str) -> Handle<K> {
        self.get_any(name).downcast()
    }

    pub fn get_any(&self, name: &str) -> AnyHandle<B> {
        let found = self.index.read().by_name.get(name).map(AnyHandle::downgrade);
        match found {
            Some(handle) => {
                self.metrics.record_hit();
                handle
            }
            None => {
                self.metrics.record_miss();
                log::error!("No resource named '{}' in the cache", name);
                AnyHandle::null()
            }
        }
    }

    /// Entry produced from `file`, falling back to the file's key
    pub fn get_by_source<K: Resource<Backend = B>>(&self, file: &SourceFile) -> Handle<K> {
        let bound = file.resource::<K>();
        if let Some(name) = bound.name() {
            let cached = self
                .index
                .read()
                .by_name
                .get(&name)
                .is_some_and(|handle| handle.same_object(&bound));
            if cached {
                self.metrics.record_hit();
                return bound;
            }
        }
        self.get(file.key())
    }

    /// Entry indexed under `id`. Unknown ids are not logged.
    pub fn get_by_id<K: Resource<Backend = B>>(&self, id: GlobalId) -> Handle<K> {
        let found = {
            let index = self.index.read();
            index
                .by_id
                .get(&id)
                .and_then(|name| index.by_name.get(name))
                .map(AnyHandle::downgrade)
        };
        found.map_or_else(Handle::null, |handle| handle.downcast())
    }

    // Weak handles to every entry, taken under the read lock
    fn snapshot(&self) -> Vec<AnyHandle<B>> {
        self.index
            .read()
            .by_name
            .values()
            .map(AnyHandle::downgrade)
            .collect()
    }

    /// First entry of kind `K` for which `predicate(name, resource)` holds
    ///
    /// The scan runs over a snapshot, outside the cache lock. No order is
    /// guaranteed.
    pub fn find<K: Resource<Backend = B>>(
        &self,
        mut predicate: impl FnMut(&str, &K) -> bool,
    ) -> Handle<K> {
        self.snapshot()
            .iter()
            .map(AnyHandle::downcast::<K>)
            .find(|handle| {
                handle
                    .inspect(|name, kind| predicate(name, kind))
                    .unwrap_or(false)
            })
            .unwrap_or_default()
    }

    /// Every entry of kind `K` for which `predicate(name, resource)` holds
    pub fn find_all<K: Resource<Backend = B>>(
        &self,
        mut predicate: impl FnMut(&str, &K) -> bool,
    ) -> Vec<Handle<K>> {
        self.snapshot()
            .iter()
            .map(AnyHandle::downcast::<K>)
            .filter(|handle| {
                handle
                    .inspect(|name, kind| predicate(name, kind))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Move the entry `name` to `new_name`, keeping its identity and id
    pub fn rename(&self, name: &str, new_name: &str) -> bool {
        self.rename_checked(name, new_name, |_| true)
    }

    /// Move the entry `handle` refers to under `new_name`
    pub fn rename_handle<H: ResourceHandle>(&self, handle: &H, new_name: &str) -> bool {
        let Some(name) = handle.name() else {
            log::warn!("Cannot rename to '{}': handle is stale", new_name);
            return false;
        };
        self.rename_checked(&name, new_name, |entry| entry.same_object(handle))
    }

    fn rename_checked(
        &self,
        name: &str,
        new_name: &str,
        is_target: impl FnOnce(&AnyHandle<B>) -> bool,
    ) -> bool {
        let mut index = self.index.write();
        if !index.by_name.get(name).is_some_and(is_target) {
            drop(index);
            log::warn!("Cannot rename '{}': not in the cache", name);
            return false;
        }
        if name == new_name {
            return true;
        }
        if index.by_name.contains_key(new_name) {
            drop(index);
            log::warn!("Cannot rename '{}' to '{}': name in use", name, new_name);
            return false;
        }

        if let Some(handle) = index.by_name.remove(name) {
            index.rename(handle, name, new_name);
        }
        drop(index);

        self.metrics.rename(name, new_name);
        log::debug!("Renamed '{}' to '{}'", name, new_name);
        true
    }

    /// Remove the entry `name`, unloading it and dropping its source data
    pub fn unload(&self, name: &str) -> bool {
        self.unload_checked(name, |_| true)
    }

    pub fn unload_handle<H: ResourceHandle>(&self, handle: &H) -> bool {
        let Some(name) = handle.name() else {
            log::warn!("Cannot unload: handle is stale");
            return false;
        };
        self.unload_checked(&name, |entry| entry.same_object(handle))
    }

    fn unload_checked(&self, name: &str, is_target: impl FnOnce(&AnyHandle<B>) -> bool) -> bool {
        let removed = {
            let mut index = self.index.write();
            if index.by_name.get(name).is_some_and(is_target) {
                index.remove(name)
            } else {
                None
            }
        };

        match removed {
            Some(owner) => {
                self.metrics.forget(name);
                self.teardown(owner);
                true
            }
            None => {
                log::warn!("Cannot unload '{}': not in the cache", name);
                false
            }
        }
    }

    // Runs without the index lock; the strong handle drops at the end
    fn teardown(&self, owner: AnyHandle<B>) {
        if let Err(e) = owner.unload(&self.backend) {
            log::error!("Failed to unload '{}': {}", owner.name().unwrap_or_default(), e);
        }
        if let Err(e) = owner.reset_source_data() {
            log::error!("Failed to reset '{}': {}", owner.name().unwrap_or_default(), e);
        }
    }

    /// Tear down every entry
    pub fn unload_all(&self) {
        let drained: Vec<AnyHandle<B>> = {
            let mut index = self.index.write();
            index.by_id.clear();
            index.by_name.drain().map(|(_, handle)| handle).collect()
        };
        self.metrics.clear_load_times();

        let count = drained.len();
        for owner in drained {
            self.teardown(owner);
        }
        log::debug!("Unloaded {} resources", count);
    }

    /// Unload and load the entry `name` again from its attached source
    pub fn reload(&self, name: &str) -> bool {
        let handle = self.get_any(name);
        if handle.is_null() {
            return false;
        }
        match handle.reload(&self.backend) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to reload '{}': {}", name, e);
                self.metrics.record_failure();
                false
            }
        }
    }

    /// Pick up new contents of `file` in every entry produced from it
    ///
    /// Files on disk are re-read and skipped if their fingerprint did not
    /// change. In-memory files are re-attached as they are. Entries that were
    /// loaded are loaded again. Returns how many entries were refreshed.
    pub fn reload_file(&self, file: &SourceFile) -> Result<usize> {
        if file.path().is_some() && !file.refresh()? {
            return Ok(0);
        }

        let dependents: Vec<AnyHandle<B>> = self
            .index
            .read()
            .by_name
            .values()
            .filter(|handle| handle.with_header(|header| header.is_from(file)) == Some(true))
            .cloned()
            .collect();

        let mut refreshed = 0;
        for handle in dependents {
            match file.with_source(|source| handle.refresh_source(source, &self.backend))? {
                Ok(()) => refreshed += 1,
                Err(e) => {
                    log::error!(
                        "Failed to reload '{}' from {}: {}",
                        handle.name().unwrap_or_default(),
                        file.key(),
                        e
                    );
                    self.metrics.record_failure();
                }
            }
        }
        log::debug!("Reloaded {} resources from {}", refreshed, file.key());
        Ok(refreshed)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.read().by_name.contains_key(name)
    }

    pub fn contains_id(&self, id: GlobalId) -> bool {
        self.index.read().by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.index.read().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().by_name.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.index.read().by_name.keys().cloned().collect()
    }

    /// Whether `name` was populated from an embedded binary
    pub fn is_binary(&self, name: &str) -> bool {
        self.index
            .read()
            .by_name
            .get(name)
            .is_some_and(AnyHandle::is_binary)
    }
}

impl<B: Backend> Drop for ResourceCache<B> {
    fn drop(&mut self) {
        if !self.index.get_mut().by_name.is_empty() {
            self.unload_all();
        }
    }
}
