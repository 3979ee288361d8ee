//! # kevents — append-only, time-partitioned event store for Kubernetes
//! resource change events
//!
//! Format guarantees:
//! - All numeric fields are little-endian; timestamps are signed 64-bit
//!   nanoseconds
//! - Every block is self-describing: a 4-byte length prefix lets a reader
//!   skip it without parsing the events inside
//! - The IndexSection carries a mandatory CRC32; a bad footer marks the file
//!   `ErrIncomplete` rather than `ErrCorrupt` — the writer crashed before
//!   `finalize()`, not after
//! - `FinalResourceStates` is embedded in the IndexSection, not a sidecar —
//!   a file's last-known-state map survives even if `.index.json` is lost
//! - The directory-level catalog is a cache, not ground truth: on divergence,
//!   the directory wins

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod format;
pub mod query;
pub mod reader;
pub mod recovery;
pub mod resource;
pub mod storage;
pub mod time;
pub mod writer;

pub use cache::{CacheStats, CachedFile, MetadataCache};
pub use catalog::{FileIndex, FileMetadata};
pub use config::{StoreConfig, StoreConfigArgs};
pub use error::{Result, StoreError};
pub use query::{CancellationToken, QueryEvent, QueryResult};
pub use reader::FileReader;
pub use recovery::{scan_file, RecoveryQuality, RecoveryReport};
pub use resource::{Event, EventFilters, EventType, EventTypeWire, ResourceKey, ResourceMeta};
pub use storage::Storage;
pub use writer::FileWriter;
