//! Chunk → ids memo shared by concurrent encodes.

use lru::LruCache;
use rustc_hash::FxBuildHasher;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use super::vocab::TokenId;

/// Retention policy for the encode cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Every chunk goes through the merge loop.
    Disabled,
    /// Keep every chunk ever seen. Memory grows with the number of distinct
    /// chunks, which is bounded in practice by natural-language vocabulary.
    #[default]
    Unbounded,
    /// Keep at most this many chunks, evicting the least recently used.
    Bounded(NonZeroUsize),
}

impl CachePolicy {
    /// `Bounded(n)`, or `Disabled` for zero.
    pub fn bounded(capacity: usize) -> Self {
        NonZeroUsize::new(capacity).map_or(CachePolicy::Disabled, CachePolicy::Bounded)
    }
}

type ChunkCache = LruCache<String, Vec<TokenId>, FxBuildHasher>;

/// Thread-safe encode cache.
///
/// A poisoned lock is treated as a cache miss.
pub struct EncodeCache {
    policy: CachePolicy,
    entries: Option<Mutex<ChunkCache>>,
}

impl EncodeCache {
    pub fn new(policy: CachePolicy) -> Self {
        let entries = match policy {
            CachePolicy::Disabled => None,
            CachePolicy::Unbounded => Some(LruCache::unbounded_with_hasher(FxBuildHasher)),
            CachePolicy::Bounded(capacity) => Some(LruCache::with_hasher(capacity, FxBuildHasher)),
        };
        Self {
            policy,
            entries: entries.map(Mutex::new),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn get(&self, chunk: &str) -> Option<Vec<TokenId>> {
        let mut entries = self.entries.as_ref()?.lock().ok()?;
        entries.get(chunk).cloned()
    }

    pub fn insert(&self, chunk: &str, ids: &[TokenId]) {
        if let Some(Ok(mut entries)) = self.entries.as_ref().map(Mutex::lock) {
            entries.put(chunk.to_string(), ids.to_vec());
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .and_then(|m| m.lock().ok())
            .map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(Ok(mut entries)) = self.entries.as_ref().map(Mutex::lock) {
            entries.clear();
        }
    }
}

impl std::fmt::Debug for EncodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodeCache")
            .field("policy", &self.policy)
            .field("len", &self.len())
            .finish()
    }
}
