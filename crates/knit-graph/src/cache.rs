//! Reuse of parsed units across builds.
//!
//! A long-lived bundler keeps one [`UnitCache`]. Each build still creates a
//! fresh module graph; the cache only skips re-parsing files whose text is
//! unchanged, and hands the same immutable `Arc<SourceUnit>` back out.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::module_id::ModuleId;
use crate::unit::SourceUnit;

/// blake3 digest of a unit's loaded text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of(text: &str) -> Self {
        Self(*blake3::hash(text.as_bytes()).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, truncated to `len` characters.
    pub fn to_hex(&self, len: usize) -> String {
        let mut hex = String::with_capacity(64);
        for byte in self.0 {
            hex.push_str(&format!("{byte:02x}"));
        }
        hex.truncate(len);
        hex
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex(16))
    }
}

/// Parsed units keyed by identity, validated by content hash.
#[derive(Debug, Default, Clone)]
pub struct UnitCache {
    entries: Arc<RwLock<FxHashMap<ModuleId, Arc<SourceUnit>>>>,
}

impl UnitCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached unit for `id`, if it was parsed from text hashing to `hash`.
    pub fn get(&self, id: &ModuleId, hash: ContentHash) -> Option<Arc<SourceUnit>> {
        self.entries
            .read()
            .get(id)
            .filter(|unit| unit.content_hash == hash)
            .cloned()
    }

    pub fn insert(&self, unit: Arc<SourceUnit>) {
        self.entries.write().insert(unit.id.clone(), unit);
    }

    /// Drop one unit, e.g. after a watcher reported its deletion.
    pub fn invalidate(&self, id: &ModuleId) -> bool {
        self.entries.write().remove(id).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
