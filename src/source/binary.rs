//! Binaries packaged into the executable

use std::borrow::Cow;
use std::collections::HashMap;

/// A listing of packaged binaries, fetched by name
pub trait BinaryListing {
    /// Every packaged name
    fn names(&self) -> Vec<String>;

    /// Bytes for `name`, if packaged
    fn fetch(&self, name: &str) -> Option<Cow<'_, [u8]>>;
}

/// A static `(name, bytes)` table, usually built from `include_bytes!`
///
/// ```ignore
/// static PACK: &[(&str, &[u8])] = &[
///     ("ui/cursor.png", include_bytes!("../assets/ui/cursor.png")),
/// ];
/// let binaries = EmbeddedBinaries::new(PACK);
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddedBinaries {
    entries: &'static [(&'static str, &'static [u8])],
    index: HashMap<&'static str, usize>,
}

impl EmbeddedBinaries {
    pub fn new(entries: &'static [(&'static str, &'static [u8])]) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (*name, i))
            .collect();
        Self { entries, index }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BinaryListing for EmbeddedBinaries {
    fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.to_string()).collect()
    }

    fn fetch(&self, name: &str) -> Option<Cow<'_, [u8]>> {
        self.index
            .get(name)
            .map(|&i| Cow::Borrowed(self.entries[i].1))
    }
}
