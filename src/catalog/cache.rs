//! Per-file cache entries used to skip reparsing unchanged sources.
use super::{CatalogError, Declaration, read_artifact, write_artifact};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Hex-encoded SHA-256 of file content.
pub fn fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub fingerprint: String,
    pub declarations: Vec<Declaration>,
}

impl CacheEntry {
    /// Cheap pre-check. A match still has to be confirmed by the fingerprint.
    pub fn matches_stat(&self, size: u64, modified: DateTime<Utc>) -> bool {
        self.size == size && self.modified == modified
    }
}

/// Cache entries keyed by `/`-separated source path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheFile {
    pub entries: BTreeMap<String, CacheEntry>,
}

impl CacheFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        read_artifact(path.as_ref())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CatalogError> {
        write_artifact(path.as_ref(), self)
    }

    pub fn get(&self, path: &str) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
