//! Forward-scan recovery for a file whose footer is missing or unreadable
//! (`StoreError::Incomplete`) — a writer crash before `finalize()` wrote the
//! IndexSection and Footer.
//!
//! The scanner does not need the IndexSection. Every block is self-describing
//! via its 4-byte length prefix, so recovery reads forward from immediately
//! after the header, decoding one block at a time, and stops at the first
//! block that doesn't decode — either real corruption, or (the common case)
//! the unwritten tail of a live file. It never needs the INDEX block itself,
//! unlike a scanner, only the sequence of block prefixes.

use crate::error::Result;
use crate::format::{BlockMetadata, FileHeader, HEADER_SIZE};
use crate::resource::Event;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Refuse to allocate a block body larger than this from an unverified
/// length prefix — a sane block is at most `block_target_bytes`-ish; this is
/// a generous ceiling meant only to catch garbage being misread as a length.
const MAX_PLAUSIBLE_BLOCK_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryQuality {
    /// Every block from the header to EOF decoded cleanly.
    Full,
    /// At least one block recovered, but scanning stopped before EOF.
    Partial,
    /// No blocks recovered — only the header was usable.
    HeaderOnly,
}

pub struct RecoveryReport {
    pub header:        FileHeader,
    pub blocks:        Vec<BlockMetadata>,
    pub events:        Vec<Event>,
    pub bytes_scanned: u64,
    pub quality:       RecoveryQuality,
}

impl RecoveryReport {
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

/// Scan `path` forward from the header, recovering as many complete blocks
/// as decode cleanly. Only a genuine I/O error propagates; a corrupt or
/// truncated block simply ends the scan and is reflected in `quality`.
pub fn scan_file(path: &Path) -> Result<RecoveryReport> {
    let mut file = File::open(path)?;
    let header = FileHeader::read(&mut file)?;

    let mut blocks = Vec::new();
    let mut events = Vec::new();
    let mut offset = HEADER_SIZE as u64;

    loop {
        file.seek(SeekFrom::Start(offset))?;
        let mut len_buf = [0u8; 4];
        match file.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(_) => break, // fewer than 4 bytes left — end of usable data
        };
        let declared_length = u32::from_le_bytes(len_buf) as u64;
        if declared_length > MAX_PLAUSIBLE_BLOCK_BYTES {
            break;
        }

        file.seek(SeekFrom::Start(offset))?;
        let block_events = match crate::format::decode_block(&mut file) {
            Ok(events) => events,
            Err(_) => break,
        };

        let block_total = 4 + declared_length;
        let ts_min = block_events.iter().map(|e| e.timestamp_ns).min().unwrap_or(header.hour_start * crate::time::NANOS_PER_SECOND);
        let ts_max = block_events.iter().map(|e| e.timestamp_ns).max().unwrap_or(ts_min);

        blocks.push(BlockMetadata {
            offset,
            length: block_total,
            event_count: block_events.len() as u64,
            ts_min,
            ts_max,
        });
        events.extend(block_events);
        offset += block_total;
    }

    let file_size = std::fs::metadata(path)?.len();
    let quality = if blocks.is_empty() {
        RecoveryQuality::HeaderOnly
    } else if offset >= file_size {
        RecoveryQuality::Full
    } else {
        RecoveryQuality::Partial
    };

    Ok(RecoveryReport { header, blocks, events, bytes_scanned: offset, quality })
}
