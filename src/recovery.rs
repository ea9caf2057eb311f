//! Index-bypass recovery — rebuild the in-memory index by scanning the log
//! sequentially when no usable sidecar is available.
//!
//! Unlike the block-format scanner this module's ancestor used, a needle log
//! carries no inter-record magic, so there is nothing to hunt for after a
//! corrupt record: every needle's size is only knowable by decoding the one
//! before it. The scan therefore advances strictly in order and stops
//! cleanly at the first needle it cannot frame at all (truncated tail from a
//! torn write); a needle that frames correctly but fails its checksum is
//! recorded as absent from the index and the scan continues past it, since
//! its size is still known.

use std::fs::File;

use crate::container::positional_read;
use crate::error::{Result, StoreError};
use crate::header::HEADER_SIZE;
use crate::index::Index;
use crate::needle::{self, NEEDLE_HEADER_SIZE, NEEDLE_TRAILER_SIZE};

/// Rebuild an [`Index`] by scanning `file` from the first needle onward.
pub fn scan_log(file: &File) -> Result<Index> {
    let len = file.metadata()?.len();
    let mut index = Index::new();
    // The container pads the first needle to `align8` of the header length,
    // not the raw header length itself — the scan's starting offset must
    // match wherever the writer actually placed the first needle.
    let mut offset = needle::align8(HEADER_SIZE as u64);

    while offset + NEEDLE_HEADER_SIZE as u64 <= len {
        let mut head = [0u8; NEEDLE_HEADER_SIZE];
        positional_read(file, &mut head, offset)?;
        let data_size = u32::from_le_bytes(head[12..16].try_into().unwrap());

        let total_len = match (NEEDLE_HEADER_SIZE as u64)
            .checked_add(data_size as u64)
            .and_then(|n| n.checked_add(NEEDLE_TRAILER_SIZE as u64))
        {
            Some(n) => n,
            None => break,
        };

        if offset + total_len > len {
            // Truncated trailing needle — almost certainly a torn write at
            // the moment of a crash. Stop; the index is authoritative up to
            // this point.
            break;
        }

        let mut buf = vec![0u8; total_len as usize];
        positional_read(file, &mut buf, offset)?;

        match needle::decode_needle(&buf) {
            Ok(decoded) => {
                index.put(decoded.id, offset as i64, total_len as u32);
            }
            Err(StoreError::ChecksumMismatch { .. }) => {
                // Framing was sound (we know its size) but the payload is
                // corrupt. Leave it out of the index and keep scanning.
            }
            Err(_) => break,
        }

        offset = needle::align8(offset + total_len);
    }

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::pwrite;
    use crate::header::{self, Header};
    use std::io::Write as _;
    use tempfile::tempdir;

    fn fresh_file(dir: &std::path::Path, name: &str) -> File {
        let path = dir.join(name);
        let header = Header::new("scan-test", 1024 * 1024).unwrap();
        let mut f = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .unwrap();
        f.write_all(&header::encode_header(&header)).unwrap();
        f
    }

    #[test]
    fn scans_multiple_needles() {
        let dir = tempdir().unwrap();
        let f = fresh_file(dir.path(), "a.dat");

        let mut offset = HEADER_SIZE as u64;
        for id in [1u64, 2, 3] {
            let encoded = needle::encode_needle(id, 0, b"payload");
            pwrite(&f, &encoded, offset).unwrap();
            offset = needle::align8(offset + encoded.len() as u64);
        }

        let index = scan_log(&f).unwrap();
        assert_eq!(index.len(), 3);
        assert!(index.get(1).is_some());
        assert!(index.get(2).is_some());
        assert!(index.get(3).is_some());
    }

    #[test]
    fn stops_at_truncated_tail() {
        let dir = tempdir().unwrap();
        let f = fresh_file(dir.path(), "b.dat");

        let encoded = needle::encode_needle(1, 0, b"payload");
        pwrite(&f, &encoded, HEADER_SIZE as u64).unwrap();

        // Append a truncated second needle: a full header claiming more
        // data than actually follows.
        let mut partial_head = [0u8; NEEDLE_HEADER_SIZE];
        partial_head[0..8].copy_from_slice(&2u64.to_le_bytes());
        partial_head[12..16].copy_from_slice(&100u32.to_le_bytes());
        let second_offset = needle::align8(HEADER_SIZE as u64 + encoded.len() as u64);
        pwrite(&f, &partial_head, second_offset).unwrap();

        let index = scan_log(&f).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.get(1).is_some());
        assert!(index.get(2).is_none());
    }
}
