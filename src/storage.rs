//! Storage facade (component G) — the single entry point embedders use:
//! opens a directory, accepts writes from one producer, answers queries from
//! any number of readers.
//!
//! Concurrency model (§5): writes are serialized through `writer_state`
//! (a single active writer, consistent with a single producer appending
//! events); `FileIndex` and `MetadataCache` are independently thread-safe and
//! may be read concurrently with an in-progress write.

use crate::cache::MetadataCache;
use crate::catalog::{FileIndex, FileMetadata};
use crate::config::StoreConfig;
use crate::error::Result;
use crate::query::{self, CancellationToken, QueryResult};
use crate::resource::{Event, EventFilters};
use crate::writer::FileWriter;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

struct WriterState {
    writer: Option<FileWriter>,
    /// Rollover sequence within the current hour, bumped when `max_file_bytes`
    /// forces an early finalize before the hour rolls over.
    sequence: u32,
}

pub struct Storage {
    dir:     PathBuf,
    config:  StoreConfig,
    catalog: FileIndex,
    cache:   MetadataCache,
    writer_state: Mutex<WriterState>,
}

impl Storage {
    pub fn open(dir: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let dir = dir.as_ref().to_owned();
        std::fs::create_dir_all(&dir)?;

        let catalog = FileIndex::load(&dir, config.strict_hours, config.autosave_index)?;
        catalog.reconcile_directory(&dir)?;
        let cache = MetadataCache::new(config.metadata_cache_max_mb)?;

        Ok(Self {
            dir,
            config,
            catalog,
            cache,
            writer_state: Mutex::new(WriterState { writer: None, sequence: 0 }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one event, routing it to the hour-bucketed file it belongs to.
    /// Finalizes and catalogs the previous file on hour rollover or when
    /// `max_file_bytes` forces an early rotation.
    pub fn write_event(&self, event: Event) -> Result<()> {
        let hour_start = crate::time::hour_start_for_ns(event.timestamp_ns);
        let mut state = self.writer_state.lock().unwrap();

        let needs_new_file = match &state.writer {
            None => true,
            Some(w) => w.hour_start() != hour_start,
        };
        if needs_new_file {
            self.finalize_active(&mut state)?;
            state.sequence = 0;
            state.writer = Some(self.create_writer(hour_start, 0)?);
        }

        state.writer.as_mut().unwrap().append(event)?;

        if self.config.max_file_bytes > 0 {
            let size = state.writer.as_mut().unwrap().current_size_estimate()?;
            if size >= self.config.max_file_bytes {
                self.finalize_active(&mut state)?;
                state.sequence += 1;
                let seq = state.sequence;
                state.writer = Some(self.create_writer(hour_start, seq)?);
            }
        }
        Ok(())
    }

    fn create_writer(&self, hour_start: i64, sequence: u32) -> Result<FileWriter> {
        let path = self.file_path_for(hour_start, sequence);
        FileWriter::create(
            path,
            hour_start,
            self.config.inline_data_threshold_bytes,
            self.config.block_target_bytes,
            self.config.block_target_events,
        )
    }

    fn file_path_for(&self, hour_start: i64, sequence: u32) -> PathBuf {
        let base = crate::time::file_name_for_hour(hour_start);
        let name = if sequence == 0 {
            base
        } else {
            base.replace(".bin", &format!(".{sequence}.bin"))
        };
        self.dir.join(name)
    }

    fn finalize_active(&self, state: &mut WriterState) -> Result<()> {
        if let Some(writer) = state.writer.take() {
            if !writer.is_empty() {
                let meta = writer.finalize()?;
                self.catalog.add_or_update(meta)?;
            }
        }
        Ok(())
    }

    /// Finalize and catalog the active file, if any, and flush the sidecar.
    pub fn close(&self) -> Result<()> {
        let mut state = self.writer_state.lock().unwrap();
        self.finalize_active(&mut state)?;
        self.catalog.save()
    }

    pub fn query(
        &self,
        ts_min_ns: i64,
        ts_max_ns: i64,
        filters: &EventFilters,
        cancel: Option<&CancellationToken>,
    ) -> Result<QueryResult> {
        query::execute(&self.catalog, &self.cache, ts_min_ns, ts_max_ns, filters, cancel)
    }

    /// Cached lookup of one file's parsed header + index, bypassing a fresh
    /// parse when the mtime on disk hasn't changed.
    pub fn file_metadata(&self, path: &Path) -> Result<crate::cache::CachedFile> {
        self.cache.get_or_load(path)
    }

    pub fn cataloged_files(&self) -> Vec<FileMetadata> {
        self.catalog.get_files_by_time_range(i64::MIN, i64::MAX)
    }

    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.cache.stats()
    }

    pub fn catalog_count(&self) -> usize {
        self.catalog.count()
    }
}
