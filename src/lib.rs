//! # haystore — append-only blob store
//!
//! Format guarantees:
//! - All numeric fields are little-endian.
//! - The 80-byte store header never moves and its magic is never rewritten;
//!   only the flags/version/maxSize/storeId region is ever patched in place.
//! - Every needle carries a CRC-32 over its payload; there is no inter-needle
//!   magic, so integrity is the checksum's job alone.
//! - Once a store's read-only flag is set, no further bytes are ever
//!   appended — this transition is one-way.
//! - The in-memory index can always be rebuilt deterministically by scanning
//!   the log from the first needle onward, independent of the sidecar file.

pub mod config;
pub mod container;
pub mod delegate;
pub mod error;
pub mod header;
pub mod http;
pub mod index;
pub mod needle;
pub mod recovery;
pub mod store;

pub use config::StoreConfig;
pub use container::{Container, OwnedNeedle};
pub use delegate::{Cluster, NodeDelegate, NodeType};
pub use error::{Result, StoreError};
pub use header::{Header, CURRENT_VERSION, HEADER_SIZE};
pub use index::{Index, IndexEntry};
pub use needle::{decode_needle, encode_needle, Needle};
pub use store::Store;
