//! Two-phase bulk population
//!
//! Decoding images and audio is pure computation, so the first phase runs it
//! on a rayon pool with `populate_interface = false`. The second phase runs
//! on the calling thread: it uploads what the first phase decoded, then
//! creates shaders, compute shaders and fonts one at a time, since those do
//! all of their work against the device. Devices are therefore only touched
//! from the thread that called [`Populator::populate_files`] or
//! [`Populator::populate_binaries`].

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

use crate::backend::Backend;
use crate::cache::ResourceCache;
use crate::error::{CacheError, Result};
use crate::handle::AnyHandle;
use crate::resource::font::font_key;
use crate::resource::{AudioTrack, ComputeShader, ResourceKind, ResourceState, Shader, Texture};
use crate::source::{extension_of, BinaryListing, FileListing, SourceFile};

/// Outcome of one population pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulateReport {
    /// Entries whose source data was attached
    pub decoded: usize,
    /// Entries loaded into their device
    pub uploaded: usize,
    /// Files already cached or of an unknown kind
    pub skipped: usize,
    /// Entries that failed to decode or load
    pub failed: usize,
}

impl PopulateReport {
    fn record(&mut self, state: Option<ResourceState>) {
        match state {
            Some(ResourceState::Loaded) => {
                self.decoded += 1;
                self.uploaded += 1;
            }
            Some(ResourceState::SourceAttached) => {
                self.decoded += 1;
                self.failed += 1;
            }
            _ => self.failed += 1,
        }
    }
}

type Pending = Vec<(ResourceKind, Arc<SourceFile>)>;

/// Populates a cache from file or binary listings
pub struct Populator<'a, B: Backend> {
    cache: &'a ResourceCache<B>,
    pool: Option<ThreadPool>,
}

impl<'a, B: Backend> Populator<'a, B> {
    /// Uses a dedicated pool when the cache config asks for decode threads,
    /// rayon's global pool otherwise
    pub fn new(cache: &'a ResourceCache<B>) -> Result<Self> {
        let threads = cache.config().decode_threads;
        let pool = if threads == 0 {
            None
        } else {
            let pool = ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("decode-{i}"))
                .build()
                .map_err(|e| CacheError::ThreadPool(e.to_string()))?;
            Some(pool)
        };

        Ok(Self { cache, pool })
    }

    pub fn cache(&self) -> &'a ResourceCache<B> {
        self.cache
    }

    // Cache key the populator will use for `key`
    fn entry_name(&self, kind: ResourceKind, key: &str) -> String {
        match kind {
            ResourceKind::Font => font_key(key, self.cache.config().default_font_size),
            _ => key.to_string(),
        }
    }

    /// Populate from every file in `listing` that has no resource yet
    pub fn populate_files(&self, listing: &dyn FileListing) -> Result<PopulateReport> {
        let mut report = PopulateReport::default();
        let mut parallel = Pending::new();
        let mut serial = Pending::new();

        for file in listing.files()? {
            let kind = ResourceKind::from_extension(file.extension());
            match kind {
                Some(kind)
                    if !file.has_resource()
                        && !self.cache.contains(&self.entry_name(kind, file.key())) =>
                {
                    if kind.decodes_in_parallel() {
                        parallel.push((kind, file));
                    } else {
                        serial.push((kind, file));
                    }
                }
                Some(_) => report.skipped += 1,
                None => {
                    log::debug!("Skipping {}: unknown extension", file.key());
                    report.skipped += 1;
                }
            }
        }

        Ok(self.run(parallel, serial, report))
    }

    /// Populate from packaged binaries whose names are not cached yet
    pub fn populate_binaries(&self, listing: &dyn BinaryListing) -> Result<PopulateReport> {
        let mut report = PopulateReport::default();
        let mut parallel = Pending::new();
        let mut serial = Pending::new();

        for name in listing.names() {
            let Some(kind) = ResourceKind::from_extension(&extension_of(&name)) else {
                log::debug!("Skipping binary {}: unknown extension", name);
                report.skipped += 1;
                continue;
            };
            if self.cache.contains(&self.entry_name(kind, &name)) {
                report.skipped += 1;
                continue;
            }
            let Some(bytes) = listing.fetch(&name) else {
                log::error!("Binary '{}' is listed but cannot be fetched", name);
                report.failed += 1;
                continue;
            };

            let file = SourceFile::embedded(name, &bytes);
            if kind.decodes_in_parallel() {
                parallel.push((kind, file));
            } else {
                serial.push((kind, file));
            }
        }

        Ok(self.run(parallel, serial, report))
    }

    fn run(&self, parallel: Pending, serial: Pending, mut report: PopulateReport) -> PopulateReport {
        log::debug!("Decoding {} files in parallel", parallel.len());
        let decode = || -> Vec<AnyHandle<B>> {
            parallel
                .par_iter()
                .map(|(kind, file)| self.decode(*kind, file))
                .collect()
        };
        let deferred = match &self.pool {
            Some(pool) => pool.install(decode),
            None => decode(),
        };

        log::debug!(
            "Loading {} decoded and {} device-bound files",
            deferred.len(),
            serial.len()
        );
        for handle in deferred {
            if handle.state() == Some(ResourceState::SourceAttached) {
                self.cache.populate_any(&handle);
            }
            report.record(handle.state());
        }

        for (kind, file) in serial {
            let state = self.load_in_place(kind, &file);
            report.record(state);
        }

        log::debug!("Population finished: {:?}", report);
        report
    }

    // Runs on decode workers; must not reach the devices
    fn decode(&self, kind: ResourceKind, file: &Arc<SourceFile>) -> AnyHandle<B> {
        match kind {
            ResourceKind::Texture => self.cache.load::<Texture<B>>(file, false).erase(),
            ResourceKind::AudioTrack => self.cache.load::<AudioTrack<B>>(file, false).erase(),
            ResourceKind::Shader | ResourceKind::ComputeShader | ResourceKind::Font => {
                AnyHandle::null()
            }
        }
    }

    fn load_in_place(&self, kind: ResourceKind, file: &Arc<SourceFile>) -> Option<ResourceState> {
        match kind {
            ResourceKind::Texture => self.cache.load::<Texture<B>>(file, true).state(),
            ResourceKind::AudioTrack => self.cache.load::<AudioTrack<B>>(file, true).state(),
            ResourceKind::Shader => self.cache.load::<Shader<B>>(file, true).state(),
            ResourceKind::ComputeShader => self.cache.load::<ComputeShader<B>>(file, true).state(),
            ResourceKind::Font => {
                let size = self.cache.config().default_font_size;
                self.cache.load_font(file, size, true).state()
            }
        }
    }
}
