//! Directory scanning with walkdir

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use super::{FileListing, SourceFile};
use crate::error::{CacheError, Result};

/// Lists every regular file under a root directory
///
/// Keys are forward-slash paths relative to the root. A file seen on an
/// earlier scan is returned as the same [`SourceFile`], so its resource
/// back-reference survives rescans.
#[derive(Debug)]
pub struct DirectoryListing {
    root: PathBuf,
    known: Mutex<HashMap<String, Arc<SourceFile>>>,
}

impl DirectoryListing {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            known: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_for(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl FileListing for DirectoryListing {
    fn files(&self) -> Result<Vec<Arc<SourceFile>>> {
        let mut known = self.known.lock();
        let mut seen = HashMap::with_capacity(known.len());

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| CacheError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let key = self.key_for(entry.path());
            let file = known
                .remove(&key)
                .unwrap_or_else(|| SourceFile::on_disk(key.clone(), entry.path()));
            seen.insert(key, file);
        }

        // Files that disappeared since the last scan are forgotten
        *known = seen;

        let mut files: Vec<_> = known.values().cloned().collect();
        files.sort_by(|a, b| a.key().cmp(b.key()));
        log::debug!("Found {} files under {}", files.len(), self.root.display());
        Ok(files)
    }
}
