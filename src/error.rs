//! Error taxonomy shared by every layer of the store.
//!
//! Layering mirrors the call stack: the codec raises framing/checksum/header
//! errors, the index raises `CorruptSidecar`, the container adds `ReadOnly`,
//! `Poisoned`, and I/O, and the façade adds the configuration-time variants
//! (`ConfigError`) that are programming mistakes rather than runtime data
//! problems and so are never returned from a path that only touched on-disk
//! bytes.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid magic number — not a store file")]
    InvalidMagic,

    #[error("unsupported store format version {0}")]
    InvalidVersion(u16),

    #[error("malformed store header: {0}")]
    InvalidHeader(&'static str),

    #[error("needle framing invalid: declared dataSize {declared} would overflow a {available}-byte buffer")]
    InvalidFraming { declared: u32, available: usize },

    #[error("needle checksum mismatch: expected {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("store is read-only")]
    ReadOnly,

    #[error("needle {0} not found")]
    NotFound(u64),

    #[error("index sidecar is corrupt: {0}")]
    CorruptSidecar(String),

    #[error("container is poisoned by a prior failed write")]
    Poisoned,

    #[error("store id mismatch: on-disk id {on_disk:?} does not match requested id {requested:?}")]
    StoreIdMismatch { on_disk: String, requested: String },

    #[error("configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
