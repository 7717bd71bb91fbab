//! Reference-counted handles with explicit strength
//!
//! A handle is either *strong*, keeping its resource alive, or *weak*,
//! observing it without affecting its lifetime. The cache holds the only
//! strong handle to each entry and hands out weak ones; code that needs a
//! resource to outlive a concurrent unload takes a temporary strong
//! reference with [`Handle::create_strong_reference`].
//!
//! Counting is done by `Arc`'s atomic counters, independently of any cache
//! lock. Dereferencing goes through closures ([`Handle::read`],
//! [`Handle::write`]) that return `None` once the resource is gone, so a
//! stale weak handle can never dangle.
//!
//! [`Handle<K>`] is typed. [`AnyHandle<B>`] is the kind-erased form used for
//! storage. Erasing is infallible; [`AnyHandle::downcast`] returns a null
//! handle on a kind mismatch.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use crate::backend::Backend;
use crate::error::{CacheError, Result};
use crate::resource::{ErasedSlot, GlobalId, Header, Resource, ResourceState, Slot, SourceData};
use crate::source::SourceFile;

/// Ownership strength of a non-null handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strength {
    Strong,
    Weak,
}

enum Link<S: ?Sized> {
    Null,
    Strong(Arc<S>),
    Weak(Weak<S>),
}

impl<S: ?Sized> Clone for Link<S> {
    fn clone(&self) -> Self {
        match self {
            Link::Null => Link::Null,
            Link::Strong(strong) => Link::Strong(Arc::clone(strong)),
            Link::Weak(weak) => Link::Weak(Weak::clone(weak)),
        }
    }
}

impl<S: ?Sized> Link<S> {
    fn strength(&self) -> Option<Strength> {
        match self {
            Link::Null => None,
            Link::Strong(_) => Some(Strength::Strong),
            Link::Weak(_) => Some(Strength::Weak),
        }
    }

    fn upgrade(&self) -> Option<Arc<S>> {
        match self {
            Link::Null => None,
            Link::Strong(strong) => Some(Arc::clone(strong)),
            Link::Weak(weak) => weak.upgrade(),
        }
    }

    fn to_strong(&self) -> Self {
        self.upgrade().map_or(Link::Null, Link::Strong)
    }

    fn to_weak(&self) -> Self {
        match self {
            Link::Null => Link::Null,
            Link::Strong(strong) => Link::Weak(Arc::downgrade(strong)),
            Link::Weak(weak) => Link::Weak(Weak::clone(weak)),
        }
    }

    fn is_valid(&self) -> bool {
        match self {
            Link::Null => false,
            Link::Strong(_) => true,
            Link::Weak(weak) => weak.strong_count() > 0,
        }
    }

    fn strong_count(&self) -> usize {
        match self {
            Link::Null => 0,
            Link::Strong(strong) => Arc::strong_count(strong),
            Link::Weak(weak) => weak.strong_count(),
        }
    }

    // A weak handle keeps the allocation (not the object) alive, so the
    // address stays unique for as long as the handle exists.
    fn address(&self) -> Option<usize> {
        match self {
            Link::Null => None,
            Link::Strong(strong) => Some(Arc::as_ptr(strong) as *const () as usize),
            Link::Weak(weak) => Some(weak.as_ptr() as *const () as usize),
        }
    }

    /// Run `f` against the target, holding a strong reference for the duration
    fn with<R>(&self, f: impl FnOnce(&S) -> R) -> Option<R> {
        match self {
            Link::Null => None,
            Link::Strong(strong) => Some(f(strong)),
            Link::Weak(weak) => weak.upgrade().map(|strong| f(&strong)),
        }
    }
}

/// Queries shared by typed and kind-erased handles
pub trait ResourceHandle {
    /// Current cache key, `None` if null or expired
    fn name(&self) -> Option<String>;

    fn id(&self) -> Option<GlobalId>;

    fn state(&self) -> Option<ResourceState>;

    /// Whether the handle references a live object
    fn is_valid(&self) -> bool;

    /// Identity of the referenced allocation
    #[doc(hidden)]
    fn address(&self) -> Option<usize>;

    /// Whether both handles reference the same object
    fn same_object<H: ResourceHandle + ?Sized>(&self, other: &H) -> bool
    where
        Self: Sized,
    {
        self.address().is_some() && self.address() == other.address()
    }
}

/// A typed handle to a resource of kind `K`
pub struct Handle<K> {
    link: Link<Slot<K>>,
}

impl<K> Handle<K> {
    /// A handle that references nothing
    pub fn null() -> Self {
        Self { link: Link::Null }
    }

    pub(crate) fn from_arc(slot: Arc<Slot<K>>) -> Self {
        Self {
            link: Link::Strong(slot),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.link, Link::Null)
    }

    /// Whether the handle references a live object
    pub fn is_valid(&self) -> bool {
        self.link.is_valid()
    }

    /// `None` for a null handle
    pub fn strength(&self) -> Option<Strength> {
        self.link.strength()
    }

    pub fn is_strong(&self) -> bool {
        self.strength() == Some(Strength::Strong)
    }

    /// Number of strong handles keeping the object alive
    pub fn strong_count(&self) -> usize {
        self.link.strong_count()
    }

    /// A new strong handle to the same object
    ///
    /// Yields a null handle when this one is null or its target is gone.
    pub fn create_strong_reference(&self) -> Self {
        Self {
            link: self.link.to_strong(),
        }
    }

    /// A weak copy of this handle
    pub fn downgrade(&self) -> Self {
        Self {
            link: self.link.to_weak(),
        }
    }

    /// Turn this handle into a weak one, giving up its own strong claim
    pub fn to_weak_reference(&mut self) {
        self.link = self.link.to_weak();
    }

    pub fn name(&self) -> Option<String> {
        self.link.with(|slot| slot.header().name())
    }

    pub fn id(&self) -> Option<GlobalId> {
        self.link.with(|slot| slot.header().id())
    }

    /// Lifecycle state; never blocks on an in-progress load
    pub fn state(&self) -> Option<ResourceState> {
        self.link.with(|slot| slot.header().state())
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == Some(ResourceState::Loaded)
    }

    /// Whether the source came from an embedded binary
    pub fn is_binary(&self) -> bool {
        self.link
            .with(|slot| slot.header().is_binary())
            .unwrap_or(false)
    }

    /// The file that supplied this resource's bytes, if it still exists
    pub fn originating_file(&self) -> Option<Arc<SourceFile>> {
        self.link.with(|slot| slot.header().file()).flatten()
    }

    /// Shared access to the resource
    pub fn read<R>(&self, f: impl FnOnce(&K) -> R) -> Option<R> {
        self.link.with(|slot| slot.read(f))
    }

    /// Exclusive access to the resource
    pub fn write<R>(&self, f: impl FnOnce(&mut K) -> R) -> Option<R> {
        self.link.with(|slot| slot.write(f))
    }

    /// Shared access together with the current name
    pub fn inspect<R>(&self, f: impl FnOnce(&str, &K) -> R) -> Option<R> {
        self.link.with(|slot| {
            let name = slot.header().name();
            slot.read(|kind| f(&name, kind))
        })
    }
}

impl<K: Resource> Handle<K> {
    pub(crate) fn from_any(resource: &Weak<dyn Any + Send + Sync>) -> Self {
        resource
            .upgrade()
            .and_then(|any| any.downcast::<Slot<K>>().ok())
            .map_or_else(Self::null, |slot| Self::from_arc(slot).downgrade())
    }

    /// Kind-erased copy with the same strength
    pub fn erase(&self) -> AnyHandle<K::Backend> {
        let link = match &self.link {
            Link::Null => Link::Null,
            Link::Strong(strong) => {
                let erased: Arc<dyn ErasedSlot<K::Backend>> = strong.clone();
                Link::Strong(erased)
            }
            Link::Weak(weak) => {
                let erased: Weak<dyn ErasedSlot<K::Backend>> = weak.clone();
                Link::Weak(erased)
            }
        };
        AnyHandle { link }
    }

    /// Record the file↔resource back-references, both weak
    pub(crate) fn bind_file(&self, file: &Arc<SourceFile>) {
        if let Some(slot) = self.link.upgrade() {
            slot.header().set_file(file);
            let weak = Arc::downgrade(&slot);
            let resource: Weak<dyn Any + Send + Sync> = weak;
            file.bind_resource(resource);
        }
    }

    pub fn set_source_data(&self, source: &SourceData<'_>) -> Result<()> {
        self.link
            .with(|slot| slot.set_source_data(source))
            .unwrap_or(Err(CacheError::Expired))
    }

    pub fn load(&self, backend: &K::Backend) -> Result<()> {
        self.link
            .with(|slot| slot.load(backend))
            .unwrap_or(Err(CacheError::Expired))
    }

    pub fn unload(&self, backend: &K::Backend) -> Result<()> {
        self.link
            .with(|slot| slot.unload(backend))
            .ok_or(CacheError::Expired)
    }

    pub fn reset_source_data(&self) -> Result<()> {
        self.link
            .with(|slot| slot.reset_source_data())
            .unwrap_or(Err(CacheError::Expired))
    }

    /// Unload then load again from the attached source
    pub fn reload(&self, backend: &K::Backend) -> Result<()> {
        self.link
            .with(|slot| slot.reload(backend))
            .unwrap_or(Err(CacheError::Expired))
    }
}

impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        Self {
            link: self.link.clone(),
        }
    }
}

impl<K> Default for Handle<K> {
    fn default() -> Self {
        Self::null()
    }
}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.link.address() == other.link.address()
    }
}

impl<K> Eq for Handle<K> {}

impl<K> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.link.address().hash(state);
    }
}

impl<K> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("strength", &self.strength())
            .field("name", &self.name())
            .finish()
    }
}

impl<K> ResourceHandle for Handle<K> {
    fn name(&self) -> Option<String> {
        Handle::name(self)
    }

    fn id(&self) -> Option<GlobalId> {
        Handle::id(self)
    }

    fn state(&self) -> Option<ResourceState> {
        Handle::state(self)
    }

    fn is_valid(&self) -> bool {
        Handle::is_valid(self)
    }

    fn address(&self) -> Option<usize> {
        self.link.address()
    }
}

impl<K: Resource> From<Handle<K>> for AnyHandle<K::Backend> {
    fn from(handle: Handle<K>) -> Self {
        handle.erase()
    }
}

/// A kind-erased handle to any resource driven by backend `B`
pub struct AnyHandle<B: Backend> {
    link: Link<dyn ErasedSlot<B>>,
}

impl<B: Backend> AnyHandle<B> {
    pub fn null() -> Self {
        Self { link: Link::Null }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.link, Link::Null)
    }

    pub fn is_valid(&self) -> bool {
        self.link.is_valid()
    }

    pub fn strength(&self) -> Option<Strength> {
        self.link.strength()
    }

    pub fn is_strong(&self) -> bool {
        self.strength() == Some(Strength::Strong)
    }

    pub fn strong_count(&self) -> usize {
        self.link.strong_count()
    }

    pub fn create_strong_reference(&self) -> Self {
        Self {
            link: self.link.to_strong(),
        }
    }

    pub fn downgrade(&self) -> Self {
        Self {
            link: self.link.to_weak(),
        }
    }

    pub fn to_weak_reference(&mut self) {
        self.link = self.link.to_weak();
    }

    pub fn name(&self) -> Option<String> {
        self.link.with(|slot| slot.header().name())
    }

    pub fn id(&self) -> Option<GlobalId> {
        self.link.with(|slot| slot.header().id())
    }

    pub fn state(&self) -> Option<ResourceState> {
        self.link.with(|slot| slot.header().state())
    }

    pub fn is_binary(&self) -> bool {
        self.link
            .with(|slot| slot.header().is_binary())
            .unwrap_or(false)
    }

    /// Kind name of the referenced resource
    pub fn kind(&self) -> Option<&'static str> {
        self.link.with(|slot| slot.kind())
    }

    pub fn originating_file(&self) -> Option<Arc<SourceFile>> {
        self.link.with(|slot| slot.header().file()).flatten()
    }

    /// Typed view of this handle, null if the kind does not match
    ///
    /// The result keeps this handle's strength.
    pub fn downcast<K: Resource<Backend = B>>(&self) -> Handle<K> {
        let Some(erased) = self.link.upgrade() else {
            return Handle::null();
        };

        match erased.into_any().downcast::<Slot<K>>() {
            Ok(slot) => {
                let handle = Handle::from_arc(slot);
                match self.strength() {
                    Some(Strength::Weak) => handle.downgrade(),
                    _ => handle,
                }
            }
            Err(_) => Handle::null(),
        }
    }

    pub(crate) fn with_header<R>(&self, f: impl FnOnce(&Header) -> R) -> Option<R> {
        self.link.with(|slot| f(slot.header()))
    }

    pub fn set_source_data(&self, source: &SourceData<'_>) -> Result<()> {
        self.link
            .with(|slot| slot.set_source_data(source))
            .unwrap_or(Err(CacheError::Expired))
    }

    pub fn load(&self, backend: &B) -> Result<()> {
        self.link
            .with(|slot| slot.load(backend))
            .unwrap_or(Err(CacheError::Expired))
    }

    pub fn unload(&self, backend: &B) -> Result<()> {
        self.link
            .with(|slot| slot.unload(backend))
            .ok_or(CacheError::Expired)
    }

    pub fn reset_source_data(&self) -> Result<()> {
        self.link
            .with(|slot| slot.reset_source_data())
            .unwrap_or(Err(CacheError::Expired))
    }

    pub fn reload(&self, backend: &B) -> Result<()> {
        self.link
            .with(|slot| slot.reload(backend))
            .unwrap_or(Err(CacheError::Expired))
    }

    pub(crate) fn refresh_source(&self, source: &SourceData<'_>, backend: &B) -> Result<()> {
        self.link
            .with(|slot| slot.refresh_source(source, backend))
            .unwrap_or(Err(CacheError::Expired))
    }
}

impl<B: Backend> Clone for AnyHandle<B> {
    fn clone(&self) -> Self {
        Self {
            link: self.link.clone(),
        }
    }
}

impl<B: Backend> Default for AnyHandle<B> {
    fn default() -> Self {
        Self::null()
    }
}

impl<B: Backend> PartialEq for AnyHandle<B> {
    fn eq(&self, other: &Self) -> bool {
        self.link.address() == other.link.address()
    }
}

impl<B: Backend> Eq for AnyHandle<B> {}

impl<B: Backend> Hash for AnyHandle<B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.link.address().hash(state);
    }
}

impl<B: Backend> fmt::Debug for AnyHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyHandle")
            .field("strength", &self.strength())
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

impl<B: Backend> ResourceHandle for AnyHandle<B> {
    fn name(&self) -> Option<String> {
        AnyHandle::name(self)
    }

    fn id(&self) -> Option<GlobalId> {
        AnyHandle::id(self)
    }

    fn state(&self) -> Option<ResourceState> {
        AnyHandle::state(self)
    }

    fn is_valid(&self) -> bool {
        AnyHandle::is_valid(self)
    }

    fn address(&self) -> Option<usize> {
        self.link.address()
    }
}
