//! Cache configuration.
//!
//! Defaults are usable as-is; a JSON document may override any subset of fields.

use serde::{Deserialize, Serialize};

/// Tuning knobs for a [`ResourceCache`](crate::ResourceCache) and its populator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Worker threads for the parallel decode phase. `0` uses rayon's global pool.
    pub decode_threads: usize,
    /// Pixel size used when fonts are populated without an explicit size.
    pub default_font_size: u32,
    /// Number of entries the name index reserves up front.
    pub initial_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            decode_threads: 0,
            default_font_size: 16,
            initial_capacity: 256,
        }
    }
}

impl CacheConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Self>(s).map(Self::normalized)
    }

    /// Clamps fields that have no meaningful zero value.
    pub fn normalized(self) -> Self {
        let size = self.default_font_size;
        self.with_default_font_size(size)
    }

    /// Sets the number of decode workers.
    pub fn with_decode_threads(mut self, threads: usize) -> Self {
        self.decode_threads = threads;
        self
    }

    /// Sets the default font pixel size.
    pub fn with_default_font_size(mut self, size: u32) -> Self {
        self.default_font_size = size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = CacheConfig::from_json_str(r#"{ "decode_threads": 4 }"#).unwrap();
        assert_eq!(config.decode_threads, 4);
        assert_eq!(config.default_font_size, 16);
        assert_eq!(config.initial_capacity, 256);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(CacheConfig::from_json_str("{ decode_threads: }").is_err());
    }

    #[test]
    fn test_builder_clamps_font_size() {
        let config = CacheConfig::default().with_default_font_size(0);
        assert_eq!(config.default_font_size, 1);
    }

    #[test]
    fn test_json_clamps_font_size() {
        let config = CacheConfig::from_json_str(r#"{ "default_font_size": 0 }"#).unwrap();
        assert_eq!(config.default_font_size, 1);
    }
}
