//! File metadata cache (component D) — bounded LRU over parsed
//! header+footer+IndexSection bundles, keyed by absolute path and validated
//! against the file's mtime on every probe.
//!
//! Grounded in the `lru` crate's `LruCache` (as used for a similar
//! parsed-file-index cache in the broader pack) plus an atomic byte budget so
//! a directory with many large `FinalResourceStates` maps can't blow past
//! `metadata_cache_max_mb`. Stats are lock-free atomics so a hot query path
//! never contends with the RwLock just to bump a counter.

use crate::error::{Result, StoreError};
use crate::format::{FileHeader, IndexSection};
use crate::reader::FileReader;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::SystemTime;

/// One cached, parsed file bundle — everything `FileReader::open` produces
/// except the ability to read further blocks (a fresh `FileReader` is opened
/// for that; this struct is a read-only snapshot of cheap-to-parse metadata).
#[derive(Clone)]
pub struct CachedFile {
    pub header: FileHeader,
    pub index:  IndexSection,
    mtime:      SystemTime,
}

impl CachedFile {
    /// Rough resident-memory estimate: fixed header/footer cost plus a
    /// per-entry constant for blocks and final states. Not exact — it only
    /// needs to be monotone in what actually grows memory.
    fn estimated_bytes(&self) -> i64 {
        let blocks = self.index.blocks.len() as i64;
        let states = self.index.final_states.len() as i64;
        (crate::format::HEADER_SIZE as i64 + crate::format::FOOTER_SIZE as i64)
            + blocks * 100
            + states * 500
    }
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits:          u64,
    pub misses:        u64,
    pub invalidations: u64,
}

struct Inner {
    lru: LruCache<PathBuf, CachedFile>,
}

/// Bounded, mtime-validated cache of parsed file metadata.
///
/// `maxMemoryMB` is enforced on a best-effort basis: the LRU evicts from the
/// tail until the tracked estimate is back under budget after every insert,
/// rather than bounding entry count directly.
pub struct MetadataCache {
    inner:         RwLock<Inner>,
    max_bytes:     i64,
    used_bytes:    AtomicI64,
    hits:          AtomicU64,
    misses:        AtomicU64,
    invalidations: AtomicU64,
}

impl MetadataCache {
    /// `max_memory_mb` must be positive; a non-positive budget makes the
    /// cache unable to hold even one entry, which is never useful.
    pub fn new(max_memory_mb: i64) -> Result<Self> {
        if max_memory_mb <= 0 {
            return Err(StoreError::InvalidArg(format!(
                "metadata_cache_max_mb must be positive, got {max_memory_mb}"
            )));
        }
        Ok(Self {
            // Unbounded entry count by construction; `max_bytes` does the
            // real bounding via `evict_to_budget`.
            inner: RwLock::new(Inner { lru: LruCache::new(NonZeroUsize::new(usize::MAX).unwrap()) }),
            max_bytes: max_memory_mb.saturating_mul(1024 * 1024),
            used_bytes: AtomicI64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        })
    }

    /// Look up a path, validating the cached entry's mtime against the file
    /// currently on disk. A stale entry counts as an invalidation and a miss,
    /// and is evicted so the next caller's fresh insert takes its place.
    pub fn get(&self, path: &Path) -> Option<CachedFile> {
        let current_mtime = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;

        {
            let inner = self.inner.read().unwrap();
            if let Some(entry) = inner.lru.peek(path) {
                if entry.mtime == current_mtime {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    let entry = entry.clone();
                    drop(inner);
                    // Promote on hit — needs the write lock since `LruCache::get`
                    // (not `peek`) is what reorders the recency list.
                    let mut inner = self.inner.write().unwrap();
                    inner.lru.get(path);
                    return Some(entry);
                }
            }
        }

        let mut inner = self.inner.write().unwrap();
        if let Some(stale) = inner.lru.pop(path) {
            self.used_bytes.fetch_sub(stale.estimated_bytes(), Ordering::Relaxed);
            self.invalidations.fetch_add(1, Ordering::Relaxed);
            log::debug!("invalidated stale cache entry for {path:?} (mtime changed)");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Cache-first lookup: return the cached entry if its mtime still
    /// matches the file on disk, otherwise parse fresh and insert.
    pub fn get_or_load(&self, path: &Path) -> Result<CachedFile> {
        if let Some(hit) = self.get(path) {
            return Ok(hit);
        }
        self.load_and_insert(path)
    }

    /// Parse `path` fresh (bypassing any cached entry) and insert it.
    pub fn load_and_insert(&self, path: &Path) -> Result<CachedFile> {
        let mtime = std::fs::metadata(path)?.modified()?;
        let reader = FileReader::open(path)?;
        let entry = CachedFile { header: reader.header().clone(), index: reader.index().clone(), mtime };
        self.insert(path.to_owned(), entry.clone());
        Ok(entry)
    }

    fn insert(&self, path: PathBuf, entry: CachedFile) {
        let bytes = entry.estimated_bytes();
        let mut inner = self.inner.write().unwrap();
        if let Some(old) = inner.lru.put(path, entry) {
            self.used_bytes.fetch_sub(old.estimated_bytes(), Ordering::Relaxed);
        }
        self.used_bytes.fetch_add(bytes, Ordering::Relaxed);
        Self::evict_to_budget(&mut inner, &self.used_bytes, self.max_bytes);
    }

    fn evict_to_budget(inner: &mut Inner, used_bytes: &AtomicI64, max_bytes: i64) {
        while used_bytes.load(Ordering::Relaxed) > max_bytes {
            match inner.lru.pop_lru() {
                Some((_, evicted)) => {
                    used_bytes.fetch_sub(evicted.estimated_bytes(), Ordering::Relaxed);
                }
                None => break,
            }
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.lru.clear();
        self.used_bytes.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.invalidations.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    pub fn used_bytes(&self) -> i64 {
        self.used_bytes.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().lru.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nonpositive_budget() {
        assert!(MetadataCache::new(0).is_err());
        assert!(MetadataCache::new(-1).is_err());
    }

    #[test]
    fn miss_then_insert_then_hit() {
        let cache = MetadataCache::new(64).unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("missing.bin");
        std::fs::write(&path, b"placeholder").unwrap();

        assert!(cache.get(&path).is_none());
        let header = FileHeader { version: crate::format::FORMAT_VERSION, hour_start: 0 };
        let entry = CachedFile {
            header,
            index: IndexSection::default(),
            mtime: std::fs::metadata(&path).unwrap().modified().unwrap(),
        };
        cache.insert(path.clone(), entry);
        assert!(cache.get(&path).is_some());
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }
}
