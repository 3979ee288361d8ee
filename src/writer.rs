//! File writer (component B) — accumulates one hour's events into
//! in-memory blocks, flushes them to disk as they fill, and finalizes the
//! file (IndexSection + Footer) on hour rollover or explicit close.
//!
//! # The `TestDebugFinalResourceStates` invariant
//!
//! After `finalize()`, `FinalResourceStates` MUST be non-empty if any event
//! was written. This holds here because `pending_latest` tracks the latest
//! event for every UID ever appended, independent of which in-memory block
//! buffer it currently lives in — flushing a buffer never discards that
//! bookkeeping, only the raw event payloads it no longer needs to hold.

use crate::catalog::FileMetadata;
use crate::error::Result;
use crate::format::{encode_block, BlockMetadata, FileFooter, FileHeader, FinalState, IndexSection, HEADER_SIZE};
use crate::resource::{Event, ResourceKey};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub struct FileWriter {
    path:   PathBuf,
    file:   File,
    header: FileHeader,

    buffer:         Vec<Event>,
    buffer_bytes_estimate: usize,
    blocks:         Vec<BlockMetadata>,

    /// Latest-seen event per resource, with the index into `blocks` it will
    /// land in once its buffer is flushed (`blocks.len()` at append time).
    pending_latest: BTreeMap<ResourceKey, (Event, usize)>,

    event_count:    u64,
    timestamp_min:  Option<i64>,
    timestamp_max:  Option<i64>,

    inline_threshold_bytes: usize,
    block_target_bytes:     usize,
    block_target_events:    usize,
}

impl FileWriter {
    pub fn create<P: AsRef<Path>>(
        path: P,
        hour_start: i64,
        inline_threshold_bytes: usize,
        block_target_bytes: usize,
        block_target_events: usize,
    ) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let mut file = File::create(&path)?;
        let header = FileHeader::new(hour_start);
        header.write(&mut file)?;
        debug_assert_eq!(file.stream_position()?, HEADER_SIZE as u64);

        Ok(Self {
            path,
            file,
            header,
            buffer: Vec::new(),
            buffer_bytes_estimate: 0,
            blocks: Vec::new(),
            pending_latest: BTreeMap::new(),
            event_count: 0,
            timestamp_min: None,
            timestamp_max: None,
            inline_threshold_bytes,
            block_target_bytes,
            block_target_events,
        })
    }

    pub fn hour_start(&self) -> i64 {
        self.header.hour_start
    }

    /// Append one event. May trigger a block flush, never a file finalize —
    /// callers (the storage facade) decide hour-boundary rollover.
    pub fn append(&mut self, event: Event) -> Result<()> {
        let ts = event.timestamp_ns;
        self.timestamp_min = Some(self.timestamp_min.map_or(ts, |m| m.min(ts)));
        self.timestamp_max = Some(self.timestamp_max.map_or(ts, |m| m.max(ts)));

        let key = ResourceKey::from_meta(&event.resource);
        let block_seq = self.blocks.len();
        let replace = match self.pending_latest.get(&key) {
            None => true,
            // Strictly newer wins; ties broken by insertion order — the
            // later call (this one) wins a tie.
            Some((prev, _)) => ts >= prev.timestamp_ns,
        };
        if replace {
            self.pending_latest.insert(key, (event.clone(), block_seq));
        }

        self.buffer_bytes_estimate += estimate_event_bytes(&event);
        self.buffer.push(event);

        if self.buffer.len() >= self.block_target_events
            || self.buffer_bytes_estimate >= self.block_target_bytes
        {
            self.flush_block()?;
        }
        Ok(())
    }

    /// Write the current buffer as one on-disk block, if non-empty.
    pub fn flush_block(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let offset = self.file.stream_position()?;
        let encoded = encode_block(&self.buffer)?;
        self.file.write_all(&encoded)?;

        let ts_min = self.buffer.iter().map(|e| e.timestamp_ns).min().unwrap();
        let ts_max = self.buffer.iter().map(|e| e.timestamp_ns).max().unwrap();

        self.blocks.push(BlockMetadata {
            offset,
            length: encoded.len() as u64,
            event_count: self.buffer.len() as u64,
            ts_min,
            ts_max,
        });
        self.event_count += self.buffer.len() as u64;
        self.buffer.clear();
        self.buffer_bytes_estimate = 0;
        Ok(())
    }

    /// Flush the tail block, write IndexSection + Footer, fsync, close.
    /// Returns the `FileMetadata` to publish into the file index.
    pub fn finalize(mut self) -> Result<FileMetadata> {
        self.flush_block()?;

        let mut final_states: BTreeMap<ResourceKey, FinalState> = BTreeMap::new();
        for (key, (event, block_seq)) in &self.pending_latest {
            // Resolved only after step 1 (tail flush) — every block_seq now
            // has a corresponding entry in `self.blocks`.
            let block = &self.blocks[*block_seq];
            let data_bytes = serde_json::to_vec(&event.data)?;
            let state = FinalState::new(
                &event.resource.uid,
                event.event_type(),
                event.timestamp_ns,
                &data_bytes,
                block.offset,
                self.inline_threshold_bytes,
            );
            final_states.insert(key.clone(), state);
        }

        let index = IndexSection { blocks: self.blocks.clone(), final_states };
        let index_bytes = index.to_bytes()?;
        let index_offset = self.file.stream_position()?;
        self.file.write_all(&index_bytes)?;

        let footer = FileFooter::for_index(index_offset, &index_bytes);
        footer.write(&mut self.file)?;
        self.file.sync_all()?;

        let file_size = self.file.stream_position()?;

        log::debug!(
            "finalized {:?}: {} event(s), {} block(s), {} resource(s), {file_size} B",
            self.path,
            self.event_count,
            self.blocks.len(),
            self.pending_latest.len(),
        );

        Ok(FileMetadata {
            file_path: self.path.clone(),
            hour_start: self.header.hour_start,
            hour_end: self.header.hour_end(),
            timestamp_min: self.timestamp_min.unwrap_or(self.header.hour_start * crate::time::NANOS_PER_SECOND),
            timestamp_max: self.timestamp_max.unwrap_or(self.header.hour_end() * crate::time::NANOS_PER_SECOND),
            event_count: self.event_count,
            file_size,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.event_count == 0 && self.buffer.is_empty()
    }

    /// Current on-disk size plus the unflushed buffer, used to enforce
    /// `max_file_bytes` without forcing a flush just to measure.
    pub fn current_size_estimate(&mut self) -> Result<u64> {
        let on_disk = self.file.stream_position()?;
        Ok(on_disk + self.buffer_bytes_estimate as u64)
    }
}

/// Rough size estimate used only to decide when to flush a block — does not
/// need to be exact, only monotone in the real cost (mirrors the cache's
/// memory-estimation constants in `cache.rs`).
fn estimate_event_bytes(e: &Event) -> usize {
    e.id.len()
        + e.resource.uid.len()
        + e.resource.group.len()
        + e.resource.version.len()
        + e.resource.kind.len()
        + e.resource.namespace.len()
        + e.resource.name.len()
        + e.data.to_string().len()
        + 32 // fixed-width fields + length-prefix overhead
}
