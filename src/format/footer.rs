//! FileFooter — fixed-size trailer enabling O(1) seek to the IndexSection.
//!
//! # On-disk layout (32 bytes, all numeric fields little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      8   index_offset  byte offset of IndexSection (LE u64)
//!    8      8   index_length  byte length of IndexSection (LE u64)
//!   16      4   crc32         CRC32 of the IndexSection bytes (LE u32)
//!   20      8   magic         = "KEVTEOF!" (8 ASCII bytes)
//!   28      4   reserved      zero padding
//! ```
//!
//! A reader seeks to `file_size - FOOTER_SIZE`, parses this struct, then
//! seeks to `index_offset` to read the IndexSection without touching any
//! event block. If the footer itself is unreadable (truncated file), that
//! is `ErrIncomplete` — the writer crashed before `finalize()` completed.

use crate::error::{Result, StoreError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use std::io::{self, Read, Seek, SeekFrom, Write};

pub const FOOTER_MAGIC: &[u8; 8] = b"KEVTEOF!";
pub const FOOTER_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFooter {
    pub index_offset: u64,
    pub index_length: u64,
    pub crc32:        u32,
}

impl FileFooter {
    pub fn for_index(index_offset: u64, index_bytes: &[u8]) -> Self {
        let mut h = Hasher::new();
        h.update(index_bytes);
        Self {
            index_offset,
            index_length: index_bytes.len() as u64,
            crc32: h.finalize(),
        }
    }

    pub fn write<W: Write>(&self, mut w: W) -> Result<()> {
        w.write_u64::<LittleEndian>(self.index_offset)?;
        w.write_u64::<LittleEndian>(self.index_length)?;
        w.write_u32::<LittleEndian>(self.crc32)?;
        w.write_all(FOOTER_MAGIC)?;
        w.write_all(&[0u8; 4])?;
        Ok(())
    }

    pub fn read<R: Read>(mut r: R) -> Result<Self> {
        let index_offset = r.read_u64::<LittleEndian>()?;
        let index_length = r.read_u64::<LittleEndian>()?;
        let crc32        = r.read_u32::<LittleEndian>()?;
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != FOOTER_MAGIC {
            return Err(StoreError::Corrupt("footer magic mismatch".into()));
        }
        let mut reserved = [0u8; 4];
        r.read_exact(&mut reserved)?;
        Ok(Self { index_offset, index_length, crc32 })
    }

    /// Read the trailing `FOOTER_SIZE` bytes of a seekable stream.
    /// A short/truncated file surfaces as `ErrIncomplete` rather than a raw
    /// io error, since the caller's usual response (forward-scan salvage)
    /// differs from a generic I/O failure.
    pub fn read_from_tail<R: Read + Seek>(mut r: R) -> Result<Self> {
        let size = r.seek(SeekFrom::End(0))?;
        if size < FOOTER_SIZE as u64 {
            return Err(StoreError::Incomplete);
        }
        r.seek(SeekFrom::Start(size - FOOTER_SIZE as u64))?;
        match Self::read(&mut r) {
            Ok(f) => Ok(f),
            Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(StoreError::Incomplete)
            }
            Err(e) => Err(e),
        }
    }

    pub fn verify_crc(&self, index_bytes: &[u8]) -> Result<()> {
        let mut h = Hasher::new();
        h.update(index_bytes);
        if h.finalize() != self.crc32 {
            return Err(StoreError::Corrupt("IndexSection CRC32 mismatch".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_and_crc_check() {
        let index_bytes = b"some index section bytes";
        let footer = FileFooter::for_index(64, index_bytes);
        footer.verify_crc(index_bytes).unwrap();

        let mut buf = Vec::new();
        footer.write(&mut buf).unwrap();
        assert_eq!(buf.len(), FOOTER_SIZE);
        let read = FileFooter::read(&buf[..]).unwrap();
        assert_eq!(read, footer);
    }

    #[test]
    fn truncated_file_is_incomplete() {
        let mut cursor = Cursor::new(vec![0u8; FOOTER_SIZE - 1]);
        assert!(matches!(FileFooter::read_from_tail(&mut cursor), Err(StoreError::Incomplete)));
    }

    #[test]
    fn tampered_index_fails_crc() {
        let footer = FileFooter::for_index(0, b"original bytes");
        assert!(footer.verify_crc(b"tampered bytes").is_err());
    }
}
