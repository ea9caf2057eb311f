//! In-memory needle index, reconstructible by scanning the log.
//!
//! Unlike the JSON-serialized `FileIndex` this module's ancestor used, the
//! sidecar here is a flat stream of fixed 20-byte little-endian records —
//! there is no metadata worth naming in a store whose only key is a `u64`,
//! so a self-describing format buys nothing and costs an allocation per
//! record on every load.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::error::{Result, StoreError};

/// Byte size of one on-disk index record: id(8) + offset(8) + size(4).
pub const RECORD_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub offset: i64,
    pub size: u32,
}

#[derive(Debug, Default)]
pub struct Index {
    entries: HashMap<u64, IndexEntry>,
}

impl Index {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<IndexEntry> {
        self.entries.get(&id).copied()
    }

    /// Last-writer-wins-by-offset: a `put` for an `id` that already has an
    /// entry with a greater-or-equal offset is a no-op. This makes replaying
    /// the on-disk log in order idempotent regardless of how it interleaves
    /// with a concurrent sidecar load.
    pub fn put(&mut self, id: u64, offset: i64, size: u32) {
        match self.entries.get(&id) {
            Some(existing) if existing.offset >= offset => {}
            _ => {
                self.entries.insert(id, IndexEntry { offset, size });
            }
        }
    }

    pub fn delete(&mut self, id: u64) {
        self.entries.remove(&id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, IndexEntry)> + '_ {
        self.entries.iter().map(|(&id, &e)| (id, e))
    }

    /// Write every entry as a fixed 20-byte record, truncating any prior
    /// contents, then fsync.
    pub fn dump(&self, path: &Path) -> Result<()> {
        let mut f = File::create(path)?;
        let mut buf = Vec::with_capacity(self.entries.len() * RECORD_SIZE);
        for (&id, entry) in &self.entries {
            buf.extend_from_slice(&id.to_le_bytes());
            buf.extend_from_slice(&entry.offset.to_le_bytes());
            buf.extend_from_slice(&entry.size.to_le_bytes());
        }
        f.write_all(&buf)?;
        f.sync_all()?;
        Ok(())
    }

    /// Load a sidecar written by [`Index::dump`]. A file whose length is not
    /// a multiple of [`RECORD_SIZE`] is a corrupt sidecar — the caller should
    /// fall back to a full log scan rather than trust a partial index.
    pub fn load(path: &Path) -> Result<Self> {
        let mut f = File::open(path)?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;

        if buf.len() % RECORD_SIZE != 0 {
            return Err(StoreError::CorruptSidecar(format!(
                "sidecar length {} is not a multiple of {RECORD_SIZE}",
                buf.len()
            )));
        }

        let mut index = Index::new();
        for chunk in buf.chunks_exact(RECORD_SIZE) {
            let id = u64::from_le_bytes(chunk[0..8].try_into().unwrap());
            let offset = i64::from_le_bytes(chunk[8..16].try_into().unwrap());
            let size = u32::from_le_bytes(chunk[16..20].try_into().unwrap());
            index.put(id, offset, size);
        }
        Ok(index)
    }
}

/// Distinguish "file does not exist" (expected on first open) from any other
/// I/O failure when probing for a sidecar.
pub fn sidecar_missing(err: &StoreError) -> bool {
    matches!(err, StoreError::Io(e) if e.kind() == io::ErrorKind::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn put_get_delete() {
        let mut idx = Index::new();
        idx.put(1, 78, 30);
        assert_eq!(idx.get(1), Some(IndexEntry { offset: 78, size: 30 }));
        idx.delete(1);
        assert_eq!(idx.get(1), None);
    }

    #[test]
    fn put_is_monotonic_by_offset() {
        let mut idx = Index::new();
        idx.put(1, 100, 10);
        idx.put(1, 50, 99); // stale, earlier offset — must be ignored
        assert_eq!(idx.get(1), Some(IndexEntry { offset: 100, size: 10 }));
        idx.put(1, 200, 11); // newer offset wins
        assert_eq!(idx.get(1), Some(IndexEntry { offset: 200, size: 11 }));
    }

    #[test]
    fn dump_and_load_round_trip_1000_random_ids() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.idx");

        let mut idx = Index::new();
        let mut state = 0x2545F4914F6CDD1Du64;
        let mut next_rand = || {
            // xorshift64*, deterministic and dependency-free
            state ^= state >> 12;
            state ^= state << 25;
            state ^= state >> 27;
            state.wrapping_mul(0x2545F4914F6CDD1D)
        };

        for i in 0..1000u64 {
            let id = next_rand();
            idx.put(id, (i * 100) as i64, 64);
        }

        idx.dump(&path).unwrap();
        let loaded = Index::load(&path).unwrap();
        assert_eq!(loaded.len(), idx.len());
        for (id, entry) in idx.iter() {
            assert_eq!(loaded.get(id), Some(entry));
        }
    }

    #[test]
    fn truncated_sidecar_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.idx");
        std::fs::write(&path, vec![0u8; RECORD_SIZE + 3]).unwrap();
        let err = Index::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::CorruptSidecar(_)));
    }
}
