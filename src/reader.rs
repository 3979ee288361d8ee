//! File reader (component C) — random-access decode of one finalized file:
//! stream all events, read the index only, or read one block.
//!
//! `open()` seeks to the footer, parses the index, then the caller decides
//! how much more to read. It validates that the sum of block lengths plus
//! header, index, and footer sizes equals the file size — a cheap
//! consistency check that catches a silently truncated or padded file.

use crate::error::{Result, StoreError};
use crate::format::{
    FileFooter, FileHeader, FinalState, FinalStatePayload, IndexSection, FOOTER_SIZE, HEADER_SIZE,
};
use crate::resource::Event;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub struct FileReader {
    path:   PathBuf,
    file:   File,
    header: FileHeader,
    footer: Option<FileFooter>,
    index:  IndexSection,
}

impl FileReader {
    /// Open a finalized file and parse header + footer + IndexSection.
    /// Does not load any block payload.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let mut file = File::open(&path)?;

        let header = FileHeader::read(&mut file)?;

        let footer = FileFooter::read_from_tail(&mut file)?;
        file.seek(SeekFrom::Start(footer.index_offset))?;
        let mut index_bytes = vec![0u8; footer.index_length as usize];
        file.read_exact(&mut index_bytes)?;
        footer.verify_crc(&index_bytes)?;
        let index = IndexSection::from_bytes(&index_bytes)?;

        let reader = Self { path, file, header, footer: Some(footer), index };
        reader.validate_sizes()?;
        Ok(reader)
    }

    /// Open a finalized file for block reads only, reusing an already
    /// parsed header + IndexSection (the metadata cache's entry) instead of
    /// re-reading the footer and re-parsing the IndexSection from disk.
    /// Skips `validate_sizes` — the caller trusts the cached metadata.
    pub fn from_cached(path: impl AsRef<Path>, header: FileHeader, index: IndexSection) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let file = File::open(&path)?;
        Ok(Self { path, file, header, footer: None, index })
    }

    fn validate_sizes(&self) -> Result<()> {
        // Only called from `open()`, which always populates `footer`.
        let footer = self.footer.as_ref().expect("validate_sizes called without a parsed footer");
        let file_size = std::fs::metadata(&self.path)?.len();
        let blocks_total: u64 = self.index.blocks.iter().map(|b| b.length).sum();
        let expected = HEADER_SIZE as u64 + blocks_total + footer.index_length + FOOTER_SIZE as u64;
        if expected != file_size {
            return Err(StoreError::Corrupt(format!(
                "size mismatch: header+blocks+index+footer = {expected}, file size = {file_size}"
            )));
        }
        Ok(())
    }

    pub fn header(&self) -> &FileHeader { &self.header }
    pub fn footer(&self) -> Option<&FileFooter> { self.footer.as_ref() }
    pub fn index(&self) -> &IndexSection { &self.index }
    pub fn path(&self) -> &Path { &self.path }

    /// Decode the events of one block by its index into `index().blocks`.
    pub fn read_block(&mut self, block_idx: usize) -> Result<Vec<Event>> {
        let meta = self
            .index
            .blocks
            .get(block_idx)
            .ok_or_else(|| StoreError::NotFound(format!("block index {block_idx}")))?
            .clone();
        self.file.seek(SeekFrom::Start(meta.offset))?;
        crate::format::decode_block(&mut self.file)
    }

    /// Decode the block starting at the given absolute file offset
    /// (used when resolving a `FinalStatePayload::Reference`).
    fn read_block_at_offset(&mut self, offset: u64) -> Result<Vec<Event>> {
        self.file.seek(SeekFrom::Start(offset))?;
        crate::format::decode_block(&mut self.file)
    }

    /// Stream every event in the file, in block-then-insertion order.
    pub fn read_all_events(&mut self) -> Result<Vec<Event>> {
        let mut all = Vec::new();
        for i in 0..self.index.blocks.len() {
            all.extend(self.read_block(i)?);
        }
        Ok(all)
    }

    /// Resolve a `FinalState`'s payload to its JSON value, loading the
    /// owning block if the state was stored by reference.
    pub fn resolve_final_state_data(&mut self, state: &FinalState) -> Result<serde_json::Value> {
        match &state.payload {
            FinalStatePayload::Inline(bytes) => Ok(serde_json::from_slice(bytes)?),
            FinalStatePayload::Reference { block_offset, uid, timestamp_ns } => {
                let events = self.read_block_at_offset(*block_offset)?;
                events
                    .into_iter()
                    .find(|e| &e.resource.uid == uid && e.timestamp_ns == *timestamp_ns)
                    .map(|e| e.data)
                    .ok_or_else(|| {
                        StoreError::Corrupt(format!(
                            "referenced event uid={uid} ts={timestamp_ns} not found in block at offset {block_offset}"
                        ))
                    })
            }
        }
    }
}
