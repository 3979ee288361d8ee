//! Error taxonomy shared by every component.
//!
//! Reads are best-effort across files — callers log and skip a bad file
//! rather than failing the whole query. Writes are fail-fast: a single
//! failed write aborts the active file's session.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("bad file format — not a kevents file")]
    BadFormat,

    #[error("unsupported format version {0}")]
    Version(u32),

    #[error("file is corrupt: {0}")]
    Corrupt(String),

    #[error("file is incomplete (footer missing — crash before finalize?)")]
    Incomplete,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArg(String),

    #[error("query cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
