//! Store header — format anchor at offset 0.
//!
//! # On-disk layout (80 bytes, all numeric fields little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      2   magic      = 0xC4 0xC4
//!    2      2   version    (LE u16)
//!    4      8   max_size   soft capacity in bytes (LE u64)
//!   12      4   flags      bit 0 = read-only (LE u32)
//!   16     64   store_id   UTF-8, NUL-terminated or NUL-padded
//! ```
//!
//! Unlike the block formats this crate's ancestor used, there is no header
//! CRC: the 80 bytes are small and rewritten in place only for the single
//! `flags` field, so a torn write here would already show up as a magic or
//! version mismatch on the next open. Integrity of the payload lives on the
//! needle, not the header.

use crate::error::{Result, StoreError};

pub const MAGIC: [u8; 2] = [0xC4, 0xC4];
pub const HEADER_SIZE: usize = 80;
pub const CURRENT_VERSION: u16 = 1;
pub const STORE_ID_SIZE: usize = 64;

/// Header flag: the store accepts no further writes.
pub const FLAG_READ_ONLY: u32 = 1 << 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub max_size: u64,
    pub flags: u32,
    pub store_id: String,
}

impl Header {
    pub fn new(store_id: impl Into<String>, max_size: u64) -> Result<Self> {
        let store_id = store_id.into();
        if store_id.len() > STORE_ID_SIZE {
            return Err(StoreError::ConfigError(format!(
                "store id {store_id:?} exceeds {STORE_ID_SIZE} bytes"
            )));
        }
        Ok(Self {
            version: CURRENT_VERSION,
            max_size,
            flags: 0,
            store_id,
        })
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.flags & FLAG_READ_ONLY != 0
    }

    #[inline]
    pub fn set_read_only(&mut self) {
        self.flags |= FLAG_READ_ONLY;
    }
}

/// Encode a [`Header`] into exactly [`HEADER_SIZE`] bytes.
pub fn encode_header(h: &Header) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    buf[0..2].copy_from_slice(&MAGIC);
    buf[2..4].copy_from_slice(&h.version.to_le_bytes());
    buf[4..12].copy_from_slice(&h.max_size.to_le_bytes());
    buf[12..16].copy_from_slice(&h.flags.to_le_bytes());

    let id_bytes = h.store_id.as_bytes();
    buf[16..16 + id_bytes.len()].copy_from_slice(id_bytes);
    // Remaining store_id bytes are already zero (NUL padding).

    buf
}

/// Decode and validate a [`Header`] from an 80-byte slice.
pub fn decode_header(buf: &[u8]) -> Result<Header> {
    if buf.len() < HEADER_SIZE {
        return Err(StoreError::InvalidHeader("buffer shorter than 80 bytes"));
    }

    if buf[0..2] != MAGIC {
        return Err(StoreError::InvalidMagic);
    }

    let version = u16::from_le_bytes(buf[2..4].try_into().unwrap());
    if version != CURRENT_VERSION {
        return Err(StoreError::InvalidVersion(version));
    }

    let max_size = u64::from_le_bytes(buf[4..12].try_into().unwrap());
    let flags = u32::from_le_bytes(buf[12..16].try_into().unwrap());

    let id_field = &buf[16..16 + STORE_ID_SIZE];
    let id_len = id_field.iter().position(|&b| b == 0).unwrap_or(STORE_ID_SIZE);
    let store_id = std::str::from_utf8(&id_field[..id_len])
        .map_err(|_| StoreError::InvalidHeader("store_id is not valid UTF-8"))?
        .to_owned();

    Ok(Header {
        version,
        max_size,
        flags,
        store_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let h = Header::new("hello", 100 * 1024 * 1024 * 1024).unwrap();
        let buf = encode_header(&h);
        assert_eq!(buf.len(), HEADER_SIZE);
        let decoded = decode_header(&buf).unwrap();
        assert_eq!(decoded, h);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..2].copy_from_slice(&[0x00, 0x00]);
        assert!(matches!(decode_header(&buf), Err(StoreError::InvalidMagic)));
    }

    #[test]
    fn rejects_unknown_version() {
        let h = Header::new("s", 1024).unwrap();
        let mut buf = encode_header(&h);
        buf[2..4].copy_from_slice(&99u16.to_le_bytes());
        assert!(matches!(decode_header(&buf), Err(StoreError::InvalidVersion(99))));
    }

    #[test]
    fn read_only_flag_is_nonzero_test_not_equality() {
        let mut h = Header::new("s", 1024).unwrap();
        assert!(!h.is_read_only());
        h.set_read_only();
        assert!(h.is_read_only());
        // A second, unrelated flag bit must not be mistaken for read-only.
        h.flags |= 1 << 3;
        assert!(h.is_read_only());
    }

    #[test]
    fn store_id_too_long_is_rejected() {
        let long = "x".repeat(STORE_ID_SIZE + 1);
        assert!(Header::new(long, 1024).is_err());
    }
}
