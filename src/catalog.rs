//! File index (component E) — directory-level catalog mapping file paths
//! to time ranges, persisted to a JSON sidecar and reloadable.
//!
//! The catalog is a cache, not ground truth: it can always be rebuilt by
//! scanning the directory and re-reading each file's IndexSection. On
//! divergence between the sidecar and the directory listing, the directory
//! wins — `load()` drops sidecar entries whose file no longer exists, and
//! `ensure_cataloged()` lazily adds files the sidecar never knew about.

use crate::error::Result;
use crate::format::FileHeader;
use crate::reader::FileReader;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Per closed file catalog entry (§3.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_path:     PathBuf,
    pub hour_start:    i64,
    pub hour_end:      i64,
    /// Actual observed extent, nanoseconds — may fall outside
    /// `[hour_start, hour_end)` for late-arriving events.
    pub timestamp_min: i64,
    pub timestamp_max: i64,
    pub event_count:   u64,
    pub file_size:     u64,
}

impl FileMetadata {
    /// Does this file's time range overlap `[ts_min_ns, ts_max_ns]` under
    /// the active overlap mode? Strict mode treats the file's range as
    /// half-open (`[hour_start, hour_end)`), excluding the boundary shared
    /// with the next hour's file.
    fn overlaps(&self, ts_min_ns: i64, ts_max_ns: i64, strict: bool) -> bool {
        if strict {
            let (lo, hi) = (self.hour_start * crate::time::NANOS_PER_SECOND, self.hour_end * crate::time::NANOS_PER_SECOND);
            lo <= ts_max_ns && ts_min_ns < hi
        } else {
            let (lo, hi) = (self.timestamp_min, self.timestamp_max);
            lo <= ts_max_ns && ts_min_ns <= hi
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SidecarFormat {
    files: Vec<FileMetadata>,
}

struct CatalogInner {
    by_path: HashMap<PathBuf, FileMetadata>,
    strict_hours: bool,
}

/// In-memory mapping `FilePath -> FileMetadata`, guarded by a read/write
/// lock; mutations optionally debounce a sidecar write (`autosave`).
pub struct FileIndex {
    inner: RwLock<CatalogInner>,
    sidecar_path: PathBuf,
    autosave: bool,
}

impl FileIndex {
    pub fn new(dir: impl AsRef<Path>, strict_hours: bool, autosave: bool) -> Self {
        Self {
            inner: RwLock::new(CatalogInner { by_path: HashMap::new(), strict_hours }),
            sidecar_path: dir.as_ref().join(".index.json"),
            autosave,
        }
    }

    pub fn add_or_update(&self, meta: FileMetadata) -> Result<()> {
        {
            let mut inner = self.inner.write().unwrap();
            inner.by_path.insert(meta.file_path.clone(), meta);
        }
        if self.autosave {
            self.save()?;
        }
        Ok(())
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<FileMetadata> {
        self.inner.read().unwrap().by_path.get(path.as_ref()).cloned()
    }

    pub fn remove(&self, path: impl AsRef<Path>) -> Result<()> {
        {
            let mut inner = self.inner.write().unwrap();
            inner.by_path.remove(path.as_ref());
        }
        if self.autosave {
            self.save()?;
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.inner.read().unwrap().by_path.len()
    }

    pub fn set_strict_hours(&self, strict: bool) {
        self.inner.write().unwrap().strict_hours = strict;
    }

    pub fn strict_hours(&self) -> bool {
        self.inner.read().unwrap().strict_hours
    }

    /// Every file whose time range intersects `[ts_min_ns, ts_max_ns]`,
    /// ordered by `hour_start` ascending (the time-sorted view).
    pub fn get_files_by_time_range(&self, ts_min_ns: i64, ts_max_ns: i64) -> Vec<FileMetadata> {
        let inner = self.inner.read().unwrap();
        let mut matches: Vec<FileMetadata> = inner
            .by_path
            .values()
            .filter(|m| m.overlaps(ts_min_ns, ts_max_ns, inner.strict_hours))
            .cloned()
            .collect();
        matches.sort_by_key(|m| m.hour_start);
        matches
    }

    /// The file with the greatest `hour_start` strictly less than `ts_ns`
    /// (nanoseconds). `None` if no such file is cataloged.
    pub fn get_file_before_time(&self, ts_ns: i64) -> Option<FileMetadata> {
        let inner = self.inner.read().unwrap();
        inner
            .by_path
            .values()
            .filter(|m| m.hour_start * crate::time::NANOS_PER_SECOND < ts_ns)
            .max_by_key(|m| m.hour_start)
            .cloned()
    }

    /// Load the sidecar, tolerating a missing file (returns an empty
    /// catalog). Entries whose file no longer exists on disk are dropped —
    /// the directory is ground truth.
    pub fn load(dir: impl AsRef<Path>, strict_hours: bool, autosave: bool) -> Result<Self> {
        let index = Self::new(&dir, strict_hours, autosave);
        let bytes = match std::fs::read(&index.sidecar_path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(index),
            Err(e) => return Err(e.into()),
        };
        let sidecar: SidecarFormat = serde_json::from_slice(&bytes)?;
        let mut inner = index.inner.write().unwrap();
        for meta in sidecar.files {
            if meta.file_path.exists() {
                inner.by_path.insert(meta.file_path.clone(), meta);
            }
        }
        drop(inner);
        Ok(index)
    }

    /// Write the sidecar file. Called synchronously on mutation when
    /// `autosave` is enabled — in-process debounce is unnecessary here since
    /// writes are small JSON blobs; this still satisfies the "<=1s latency"
    /// contract the sidecar is specified to honor.
    pub fn save(&self) -> Result<()> {
        let inner = self.inner.read().unwrap();
        let files: Vec<FileMetadata> = inner.by_path.values().cloned().collect();
        drop(inner);
        let sidecar = SidecarFormat { files };
        let bytes = serde_json::to_vec_pretty(&sidecar)?;
        std::fs::write(&self.sidecar_path, bytes)?;
        Ok(())
    }

    /// If `path` is not already cataloged, open it, read its IndexSection,
    /// derive `FileMetadata`, and catalog it. This is the "lazily
    /// catalogued on first touch" path for files found on disk that the
    /// sidecar never recorded.
    pub fn ensure_cataloged(&self, path: &Path) -> Result<FileMetadata> {
        if let Some(meta) = self.get(path) {
            return Ok(meta);
        }
        let mut reader = FileReader::open(path)?;
        let header: &FileHeader = reader.header();
        let index = reader.index();
        let file_size = std::fs::metadata(path)?.len();

        let timestamp_min = index.blocks.iter().map(|b| b.ts_min).min();
        let timestamp_max = index.blocks.iter().map(|b| b.ts_max).max();
        let event_count: u64 = index.blocks.iter().map(|b| b.event_count).sum();

        let meta = FileMetadata {
            file_path: path.to_owned(),
            hour_start: header.hour_start,
            hour_end: header.hour_end(),
            timestamp_min: timestamp_min.unwrap_or(header.hour_start * crate::time::NANOS_PER_SECOND),
            timestamp_max: timestamp_max.unwrap_or(header.hour_end() * crate::time::NANOS_PER_SECOND),
            event_count,
            file_size,
        };
        self.add_or_update(meta.clone())?;
        Ok(meta)
    }

    /// List `*.bin` files in `dir` not yet cataloged and catalog each of
    /// them. Used at `Storage::open` time and by the query executor before
    /// candidate selection, so a directory populated outside this process
    /// (or before the sidecar existed) is still queryable.
    pub fn reconcile_directory(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Ok(());
        }
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("bin") {
                continue;
            }
            if self.get(&path).is_some() {
                continue;
            }
            // A file with no readable footer is still being written (the
            // live hour) or crashed before finalize — skip it silently;
            // it becomes cataloguable once finalized.
            let _ = self.ensure_cataloged(&path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(n: u32, ts_min: i64, ts_max: i64) -> FileMetadata {
        FileMetadata {
            file_path: PathBuf::from(format!("/tmp/does-not-need-to-exist-{n}.bin")),
            hour_start: ts_min / crate::time::NANOS_PER_SECOND,
            hour_end: ts_max / crate::time::NANOS_PER_SECOND + 1,
            timestamp_min: ts_min,
            timestamp_max: ts_max,
            event_count: 1,
            file_size: 0,
        }
    }

    #[test]
    fn strict_mode_excludes_shared_hour_boundary() {
        // File covers hour 5 only: [5*3600, 6*3600) seconds.
        let f = meta(0, 5 * 3600 * crate::time::NANOS_PER_SECOND, 5 * 3600 * crate::time::NANOS_PER_SECOND + 1);
        // A query starting exactly at the file's hour_end boundary must not
        // match in strict mode (the boundary belongs to the next hour).
        let hour_end_ns = 6 * 3600 * crate::time::NANOS_PER_SECOND;
        assert!(!f.overlaps(hour_end_ns, hour_end_ns + 1000, true));
        assert!(f.overlaps(hour_end_ns - 1, hour_end_ns, true));
    }

    proptest::proptest! {
        /// `get_files_by_time_range` is monotone in its query interval: if
        /// `[a_min, a_max]` is contained in `[b_min, b_max]`, every file
        /// matched under the narrower interval is also matched under the
        /// wider one.
        #[test]
        fn get_files_by_time_range_is_monotone(
            files in proptest::collection::vec((0i64..10, 0i64..10), 0..12),
            a_min in 0i64..10, a_width in 0i64..10,
            pad_lo in 0i64..5, pad_hi in 0i64..5,
        ) {
            let index = FileIndex::new(std::env::temp_dir(), false, false);
            for (n, (lo, span)) in files.into_iter().enumerate() {
                let (ts_min, ts_max) = (lo, lo + span);
                index.add_or_update(meta(n as u32, ts_min, ts_max)).unwrap();
            }

            let a_max = a_min + a_width;
            let b_min = a_min - pad_lo;
            let b_max = a_max + pad_hi;

            let narrow: std::collections::HashSet<_> =
                index.get_files_by_time_range(a_min, a_max).into_iter().map(|m| m.file_path).collect();
            let wide: std::collections::HashSet<_> =
                index.get_files_by_time_range(b_min, b_max).into_iter().map(|m| m.file_path).collect();

            proptest::prop_assert!(narrow.is_subset(&wide));
        }
    }
}
