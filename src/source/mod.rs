//! Source files and listings the cache is populated from
//!
//! A [`SourceFile`] carries a stable key, its extension and, once read, its
//! bytes. Bytes from disk are read lazily so that the I/O happens on whichever
//! thread first decodes the file. Each file keeps a weak back-reference to the
//! resource it produced, so hot-reload code can walk from a changed file to
//! its cache entry without holding it alive.

pub mod binary;
pub mod directory;

pub use binary::{BinaryListing, EmbeddedBinaries};
pub use directory::DirectoryListing;

use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{CacheError, Result};
use crate::handle::Handle;
use crate::resource::{Origin, Resource, SourceData};

/// Lowercase extension of a key, without the dot
pub fn extension_of(key: &str) -> String {
    Path::new(key)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// A unit of raw bytes with a stable, path-derived identity
pub struct SourceFile {
    key: String,
    extension: String,
    origin: Origin,
    path: Option<PathBuf>,
    bytes: RwLock<Option<Arc<[u8]>>>,
    // 0 until the bytes have been read once
    fingerprint: AtomicU64,
    resource: Mutex<Option<Weak<dyn Any + Send + Sync>>>,
}

impl SourceFile {
    fn with_parts(
        key: String,
        origin: Origin,
        path: Option<PathBuf>,
        bytes: Option<Arc<[u8]>>,
    ) -> Arc<Self> {
        let fingerprint = bytes.as_deref().map_or(0, xxh3_64);
        Arc::new(Self {
            extension: extension_of(&key),
            key,
            origin,
            path,
            bytes: RwLock::new(bytes),
            fingerprint: AtomicU64::new(fingerprint),
            resource: Mutex::new(None),
        })
    }

    /// A loose file on disk, read on first use
    pub fn on_disk(key: impl Into<String>, path: impl Into<PathBuf>) -> Arc<Self> {
        Self::with_parts(key.into(), Origin::File, Some(path.into()), None)
    }

    /// A loose file whose bytes are already in memory
    pub fn in_memory(key: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Arc<Self> {
        Self::with_parts(key.into(), Origin::File, None, Some(bytes.into()))
    }

    /// A binary packaged into the executable
    pub fn embedded(key: impl Into<String>, bytes: &[u8]) -> Arc<Self> {
        Self::with_parts(key.into(), Origin::Binary, None, Some(Arc::from(bytes)))
    }

    /// Default cache key for resources made from this file
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_binary(&self) -> bool {
        self.origin == Origin::Binary
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// File contents, read from disk the first time they are needed
    pub fn bytes(&self) -> Result<Arc<[u8]>> {
        if let Some(bytes) = self.bytes.read().as_ref() {
            return Ok(Arc::clone(bytes));
        }

        let path = self.path.as_ref().ok_or_else(|| {
            CacheError::InvalidData(format!("{}: no bytes and no path", self.key))
        })?;
        let data: Arc<[u8]> = std::fs::read(path)?.into();

        let mut slot = self.bytes.write();
        // Another thread may have read it in the meantime
        if let Some(bytes) = slot.as_ref() {
            return Ok(Arc::clone(bytes));
        }
        self.fingerprint.store(xxh3_64(&data), Ordering::Release);
        *slot = Some(Arc::clone(&data));
        Ok(data)
    }

    /// xxh3 hash of the contents as last read
    pub fn fingerprint(&self) -> Result<u64> {
        self.bytes()?;
        Ok(self.fingerprint.load(Ordering::Acquire))
    }

    /// Re-read from disk. Returns whether the contents changed.
    ///
    /// Files without a path never change this way; see [`Self::replace_bytes`].
    pub fn refresh(&self) -> Result<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        let data: Arc<[u8]> = std::fs::read(path)?.into();
        Ok(self.store(data))
    }

    /// Swap in new contents. Returns whether they differ from the old ones.
    pub fn replace_bytes(&self, bytes: impl Into<Arc<[u8]>>) -> bool {
        self.store(bytes.into())
    }

    fn store(&self, data: Arc<[u8]>) -> bool {
        let hash = xxh3_64(&data);
        let mut slot = self.bytes.write();
        let previous = self.fingerprint.swap(hash, Ordering::AcqRel);
        *slot = Some(data);
        previous != hash
    }

    /// Run `f` with this file's contents as [`SourceData`]
    pub(crate) fn with_source<R>(&self, f: impl FnOnce(&SourceData<'_>) -> R) -> Result<R> {
        let bytes = self.bytes()?;
        Ok(f(&SourceData {
            key: &self.key,
            extension: &self.extension,
            bytes: &bytes,
            origin: self.origin,
        }))
    }

    /// Whether a live resource was produced from this file
    pub fn has_resource(&self) -> bool {
        self.resource
            .lock()
            .as_ref()
            .is_some_and(|resource| resource.strong_count() > 0)
    }

    /// Weak handle to the resource produced from this file, null if there
    /// is none or it has another kind
    pub fn resource<K: Resource>(&self) -> Handle<K> {
        match self.resource.lock().as_ref() {
            Some(resource) => Handle::from_any(resource),
            None => Handle::null(),
        }
    }

    pub(crate) fn bind_resource(&self, resource: Weak<dyn Any + Send + Sync>) {
        *self.resource.lock() = Some(resource);
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("key", &self.key)
            .field("origin", &self.origin)
            .field("path", &self.path)
            .finish()
    }
}

/// Something that can enumerate source files
pub trait FileListing {
    fn files(&self) -> Result<Vec<Arc<SourceFile>>>;
}

/// A fixed set of in-memory files
#[derive(Debug, Default)]
pub struct MemoryListing {
    files: Vec<Arc<SourceFile>>,
}

impl MemoryListing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file and return it
    pub fn push(&mut self, key: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Arc<SourceFile> {
        let file = SourceFile::in_memory(key, bytes);
        self.files.push(Arc::clone(&file));
        file
    }

    pub fn with_file(mut self, key: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.push(key, bytes);
        self
    }
}

impl FileListing for MemoryListing {
    fn files(&self) -> Result<Vec<Arc<SourceFile>>> {
        Ok(self.files.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::tests::Probe;
    use std::io::Write;

    #[test]
    fn test_extension_is_lowercased() {
        assert_eq!(extension_of("textures/Wall.PNG"), "png");
        assert_eq!(extension_of("Makefile"), "");
    }

    #[test]
    fn test_in_memory_bytes_and_fingerprint() {
        let file = SourceFile::in_memory("a.txt", b"hello".to_vec());
        assert_eq!(&*file.bytes().unwrap(), b"hello");
        assert_eq!(file.fingerprint().unwrap(), xxh3_64(b"hello"));
        assert!(!file.is_binary());
        assert!(!file.refresh().unwrap());
    }

    #[test]
    fn test_disk_bytes_are_lazy_and_refreshable() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"one").unwrap();

        let file = SourceFile::on_disk("tmp.bin", tmp.path());
        assert_eq!(&*file.bytes().unwrap(), b"one");

        std::fs::write(tmp.path(), b"two").unwrap();
        assert_eq!(&*file.bytes().unwrap(), b"one");
        assert!(file.refresh().unwrap());
        assert_eq!(&*file.bytes().unwrap(), b"two");
        assert!(!file.refresh().unwrap());
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let file = SourceFile::on_disk("gone.png", "/definitely/not/here.png");
        assert!(matches!(file.bytes(), Err(CacheError::Io(_))));
    }

    #[test]
    fn test_replace_bytes_reports_change() {
        let file = SourceFile::in_memory("a.txt", b"x".to_vec());
        assert!(!file.replace_bytes(b"x".to_vec()));
        assert!(file.replace_bytes(b"y".to_vec()));
    }

    #[test]
    fn test_resource_back_reference_is_weak() {
        use crate::resource::{GlobalId, Slot};

        let file = SourceFile::in_memory("probe.bin", b"x".to_vec());
        assert!(!file.has_resource());
        assert!(file.resource::<Probe>().is_null());

        let slot = Arc::new(Slot::new("probe".to_string(), GlobalId::new(), Probe::default()));
        let owner = Handle::from_arc(slot);
        owner.bind_file(&file);

        assert!(file.has_resource());
        assert_eq!(file.resource::<Probe>(), owner);
        assert_eq!(owner.originating_file().map(|f| f.key().to_string()).as_deref(), Some("probe.bin"));

        drop(owner);
        assert!(!file.has_resource());
    }

    #[test]
    fn test_memory_listing() {
        let listing = MemoryListing::new()
            .with_file("a.png", vec![1u8])
            .with_file("b.wav", vec![2u8]);
        let files = listing.files().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].extension(), "wav");
    }
}
