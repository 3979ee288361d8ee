//! FileHeader — format anchor at offset 0.
//!
//! # On-disk layout (64 bytes, all numeric fields little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      8   magic        = "KEVTS000"  (8 ASCII bytes, not LE)
//!    8      4   version      = 1            (LE u32)
//!   12      8   hour_start   seconds since epoch, UTC (LE i64)
//!   20     44   reserved     zero padding
//! ```

use crate::error::{Result, StoreError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub const MAGIC: &[u8; 8] = b"KEVTS000";
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version:    u32,
    /// Nominal hour bucket this file belongs to, UTC seconds since epoch.
    pub hour_start: i64,
}

impl FileHeader {
    pub fn new(hour_start: i64) -> Self {
        Self { version: FORMAT_VERSION, hour_start }
    }

    pub fn write<W: Write>(&self, mut w: W) -> Result<()> {
        w.write_all(MAGIC)?;
        w.write_u32::<LittleEndian>(self.version)?;
        w.write_i64::<LittleEndian>(self.hour_start)?;
        w.write_all(&[0u8; HEADER_SIZE - 20])?;
        Ok(())
    }

    pub fn read<R: Read>(mut r: R) -> Result<Self> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(StoreError::BadFormat);
        }
        let version = r.read_u32::<LittleEndian>()?;
        if version > FORMAT_VERSION {
            return Err(StoreError::Version(version));
        }
        let hour_start = r.read_i64::<LittleEndian>()?;
        let mut reserved = [0u8; HEADER_SIZE - 20];
        r.read_exact(&mut reserved)?;
        Ok(Self { version, hour_start })
    }

    /// Exclusive upper bound of this file's nominal hour, seconds since epoch.
    pub fn hour_end(&self) -> i64 {
        self.hour_start + 3600
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let h = FileHeader::new(1_700_000_400);
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);
        let read = FileHeader::read(&buf[..]).unwrap();
        assert_eq!(read, h);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[..8].copy_from_slice(b"NOTKEVT!");
        assert!(matches!(FileHeader::read(&buf[..]), Err(StoreError::BadFormat)));
    }
}
