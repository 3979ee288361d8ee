//! Binary file format (component A): header, block-structured body, index
//! section, footer.
//!
//! ```text
//! [ FileHeader (64 bytes) ]
//! [ Block 0 ] [ Block 1 ] ... [ Block N-1 ]
//! [ IndexSection (variable) ]
//! [ FileFooter (32 bytes) ]
//! ```
//!
//! All numeric fields are little-endian. Variable-length fields are
//! varint-length-prefixed. Timestamps are signed 64-bit nanoseconds.

pub mod event_codec;
pub mod footer;
pub mod header;
pub mod index_section;
pub mod varint;

pub use event_codec::{decode_block, decode_event, encode_block, encode_event, peek_block_length};
pub use footer::{FileFooter, FOOTER_MAGIC, FOOTER_SIZE};
pub use header::{FileHeader, FORMAT_VERSION, HEADER_SIZE, MAGIC};
pub use index_section::{
    BlockMetadata, FinalState, FinalStatePayload, IndexSection, DEFAULT_INLINE_THRESHOLD_BYTES,
};
