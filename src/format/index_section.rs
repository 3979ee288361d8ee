//! IndexSection — the per-file index at the tail of the file: block
//! metadata plus `FinalResourceStates`.
//!
//! # Embedded map, not a sidecar
//!
//! `FinalResourceStates` is part of the IndexSection, not a separate file.
//! A file's state is self-contained — losing the directory-level sidecar
//! (`.index.json`, see `catalog.rs`) never loses recoverability of this map.
//!
//! # On-disk layout
//!
//! ```text
//! varint        block_count
//! BlockMetadata[block_count]
//! varint        state_count
//! FinalState[state_count]     (sorted by composite key for determinism)
//! ```
//!
//! `BlockMetadata`: offset (u64 LE), length (u64 LE), event_count (varint),
//! ts_min (i64 LE), ts_max (i64 LE).
//!
//! `FinalState` entry: ResourceKey (6 strings) + event_type (u8) +
//! timestamp_ns (i64 LE) + inline_flag (u8) + payload, where payload is
//! either `bytes(data)` (inline_flag=1) or `block_offset (u64 LE) + uid
//! (string) + timestamp_ns (i64 LE)` (inline_flag=0) locating the owning
//! event for re-extraction.

use crate::error::Result;
use crate::format::varint::{
    read_bytes, read_string, read_uvarint, write_bytes, write_string, write_uvarint,
};
use crate::resource::{EventType, ResourceKey};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Default inline/reference threshold per §4.A: inline if `len(data) <= 4 KiB`.
pub const DEFAULT_INLINE_THRESHOLD_BYTES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMetadata {
    pub offset:      u64,
    pub length:      u64,
    pub event_count: u64,
    pub ts_min:      i64,
    pub ts_max:      i64,
}

impl BlockMetadata {
    pub fn overlaps(&self, ts_min: i64, ts_max: i64) -> bool {
        self.ts_min <= ts_max && ts_min <= self.ts_max
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u64::<LittleEndian>(self.offset)?;
        w.write_u64::<LittleEndian>(self.length)?;
        write_uvarint(w, self.event_count)?;
        w.write_i64::<LittleEndian>(self.ts_min)?;
        w.write_i64::<LittleEndian>(self.ts_max)?;
        Ok(())
    }

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        let offset = r.read_u64::<LittleEndian>()?;
        let length = r.read_u64::<LittleEndian>()?;
        let event_count = read_uvarint(r)?;
        let ts_min = r.read_i64::<LittleEndian>()?;
        let ts_max = r.read_i64::<LittleEndian>()?;
        Ok(Self { offset, length, event_count, ts_min, ts_max })
    }
}

/// Where to find a `FinalState`'s payload. Avoid a nullable-field design —
/// this is a tagged variant so callers cannot forget to check which case
/// applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalStatePayload {
    /// Small payload (`<= inline threshold`), stored directly in the index.
    Inline(Vec<u8>),
    /// Large payload: locate the owning event inside the named block by
    /// `(uid, timestamp_ns)` and copy its `data` out.
    Reference { block_offset: u64, uid: String, timestamp_ns: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalState {
    pub uid:          String,
    pub event_type:   EventType,
    pub timestamp_ns: i64,
    pub payload:      FinalStatePayload,
}

impl FinalState {
    /// Build a `FinalState`, applying the inline-vs-reference policy.
    pub fn new(
        uid: &str,
        event_type: EventType,
        timestamp_ns: i64,
        data_bytes: &[u8],
        block_offset: u64,
        inline_threshold_bytes: usize,
    ) -> Self {
        let payload = if data_bytes.len() <= inline_threshold_bytes {
            FinalStatePayload::Inline(data_bytes.to_vec())
        } else {
            FinalStatePayload::Reference {
                block_offset,
                uid: uid.to_owned(),
                timestamp_ns,
            }
        };
        Self { uid: uid.to_owned(), event_type, timestamp_ns, payload }
    }

    fn write<W: Write>(&self, key: &ResourceKey, w: &mut W) -> Result<()> {
        write_string(w, &key.group)?;
        write_string(w, &key.version)?;
        write_string(w, &key.kind)?;
        write_string(w, &key.namespace)?;
        write_string(w, &key.name)?;
        write_string(w, &key.uid)?;
        w.write_u8(self.event_type as u8)?;
        w.write_i64::<LittleEndian>(self.timestamp_ns)?;
        match &self.payload {
            FinalStatePayload::Inline(data) => {
                w.write_u8(1)?;
                write_bytes(w, data)?;
            }
            FinalStatePayload::Reference { block_offset, uid, timestamp_ns } => {
                w.write_u8(0)?;
                w.write_u64::<LittleEndian>(*block_offset)?;
                write_string(w, uid)?;
                w.write_i64::<LittleEndian>(*timestamp_ns)?;
            }
        }
        Ok(())
    }

    fn read<R: Read>(r: &mut R) -> Result<(ResourceKey, Self)> {
        let group = read_string(r)?;
        let version = read_string(r)?;
        let kind = read_string(r)?;
        let namespace = read_string(r)?;
        let name = read_string(r)?;
        let uid = read_string(r)?;
        let key = ResourceKey { group, version, kind, namespace, name, uid: uid.clone() };

        let type_byte = r.read_u8()?;
        let event_type = crate::error::StoreError::Corrupt(format!(
            "unknown event type byte {type_byte}"
        ));
        let event_type = EventType::from_u8(type_byte).ok_or(event_type)?;
        let timestamp_ns = r.read_i64::<LittleEndian>()?;

        let inline_flag = r.read_u8()?;
        let payload = if inline_flag == 1 {
            FinalStatePayload::Inline(read_bytes(r)?)
        } else {
            let block_offset = r.read_u64::<LittleEndian>()?;
            let ref_uid = read_string(r)?;
            let ref_ts = r.read_i64::<LittleEndian>()?;
            FinalStatePayload::Reference { block_offset, uid: ref_uid, timestamp_ns: ref_ts }
        };

        Ok((key, Self { uid, event_type, timestamp_ns, payload }))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSection {
    pub blocks:        Vec<BlockMetadata>,
    /// Sorted (`BTreeMap`) so on-disk bytes are deterministic — required for
    /// the round-trip invariant and reproducible CRCs across identical runs.
    pub final_states:  BTreeMap<ResourceKey, FinalState>,
}

impl IndexSection {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        write_uvarint(&mut out, self.blocks.len() as u64)?;
        for b in &self.blocks {
            b.write(&mut out)?;
        }
        write_uvarint(&mut out, self.final_states.len() as u64)?;
        for (key, state) in &self.final_states {
            state.write(key, &mut out)?;
        }
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = std::io::Cursor::new(bytes);
        let block_count = read_uvarint(&mut cursor)?;
        let mut blocks = Vec::with_capacity(block_count as usize);
        for _ in 0..block_count {
            blocks.push(BlockMetadata::read(&mut cursor)?);
        }
        let state_count = read_uvarint(&mut cursor)?;
        let mut final_states = BTreeMap::new();
        for _ in 0..state_count {
            let (key, state) = FinalState::read(&mut cursor)?;
            final_states.insert(key, state);
        }
        Ok(Self { blocks, final_states })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(uid: &str) -> ResourceKey {
        ResourceKey {
            group: "apps".into(),
            version: "v1".into(),
            kind: "Deployment".into(),
            namespace: "default".into(),
            name: "web".into(),
            uid: uid.into(),
        }
    }

    #[test]
    fn inline_threshold_policy() {
        let small = FinalState::new("u1", EventType::Update, 1, b"tiny", 0, 4096);
        assert!(matches!(small.payload, FinalStatePayload::Inline(_)));

        let big_data = vec![0u8; 5000];
        let big = FinalState::new("u2", EventType::Update, 1, &big_data, 128, 4096);
        assert!(matches!(big.payload, FinalStatePayload::Reference { .. }));
    }

    #[test]
    fn index_section_roundtrip() {
        let mut final_states = BTreeMap::new();
        final_states.insert(key("u1"), FinalState::new("u1", EventType::Create, 10, b"{}", 0, 4096));
        let section = IndexSection {
            blocks: vec![BlockMetadata { offset: 64, length: 100, event_count: 2, ts_min: 1, ts_max: 10 }],
            final_states,
        };
        let bytes = section.to_bytes().unwrap();
        let decoded = IndexSection::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, section);
    }
}
