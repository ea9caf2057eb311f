//! Needle format — the unit of storage appended to the log.
//!
//! # On-disk layout (variable length, all numeric fields little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      8   id         caller-supplied identifier (LE u64)
//!    8      4   flags      bit 0 = tombstone (LE u32)
//!   12      4   dataSize   length of `data` (LE u32)
//!   16      n   data       raw payload
//!  16+n      4   checksum   CRC-32 (IEEE) over `data` only (LE u32)
//! ```
//!
//! There is no inter-needle magic; integrity relies entirely on the trailing
//! checksum. Needles are written back to back, each padded up to the next
//! 8-byte boundary by the container — the padding itself is not part of the
//! needle encoding and is not covered by any field here.

use crc32fast::Hasher;

use crate::error::{Result, StoreError};

/// Fixed bytes before the payload: id(8) + flags(4) + dataSize(4).
pub const NEEDLE_HEADER_SIZE: usize = 16;
/// Bytes after the payload: checksum(4).
pub const NEEDLE_TRAILER_SIZE: usize = 4;
/// Minimum encoded size of a needle with an empty payload.
pub const MIN_NEEDLE_SIZE: usize = NEEDLE_HEADER_SIZE + NEEDLE_TRAILER_SIZE;

/// Needle flag: this record logically deletes a prior entry for the same id.
pub const FLAG_TOMBSTONE: u32 = 1 << 0;

/// A decoded needle. `data` borrows from the buffer it was decoded out of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Needle<'a> {
    pub id: u64,
    pub flags: u32,
    pub data: &'a [u8],
}

impl<'a> Needle<'a> {
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.flags & FLAG_TOMBSTONE != 0
    }

    /// Total encoded length of this needle, including header and checksum.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        NEEDLE_HEADER_SIZE + self.data.len() + NEEDLE_TRAILER_SIZE
    }
}

/// Encode a needle. Returns the full on-disk bytes (no padding appended).
pub fn encode_needle(id: u64, flags: u32, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(NEEDLE_HEADER_SIZE + data.len() + NEEDLE_TRAILER_SIZE);

    buf.extend_from_slice(&id.to_le_bytes());
    buf.extend_from_slice(&flags.to_le_bytes());
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(data);

    let mut h = Hasher::new();
    h.update(data);
    buf.extend_from_slice(&h.finalize().to_le_bytes());

    buf
}

/// Decode a needle out of `buf`, borrowing its `data` slice.
///
/// Distinguishes a framing failure (the declared `dataSize` would run past
/// the end of `buf`) from a checksum failure (the bytes are all present but
/// the CRC does not match) — callers care which one happened: the former
/// usually means a truncated read or a torn write, the latter means the
/// bytes themselves are corrupt.
pub fn decode_needle(buf: &[u8]) -> Result<Needle<'_>> {
    if buf.len() < NEEDLE_HEADER_SIZE {
        return Err(StoreError::InvalidFraming {
            declared: 0,
            available: buf.len(),
        });
    }

    let id = u64::from_le_bytes(buf[0..8].try_into().unwrap());
    let flags = u32::from_le_bytes(buf[8..12].try_into().unwrap());
    let data_size = u32::from_le_bytes(buf[12..16].try_into().unwrap());

    let data_end = NEEDLE_HEADER_SIZE
        .checked_add(data_size as usize)
        .ok_or(StoreError::InvalidFraming {
            declared: data_size,
            available: buf.len(),
        })?;
    let total_len = data_end + NEEDLE_TRAILER_SIZE;

    if total_len > buf.len() {
        return Err(StoreError::InvalidFraming {
            declared: data_size,
            available: buf.len(),
        });
    }

    let data = &buf[NEEDLE_HEADER_SIZE..data_end];
    let stored_checksum = u32::from_le_bytes(buf[data_end..total_len].try_into().unwrap());

    let mut h = Hasher::new();
    h.update(data);
    let actual_checksum = h.finalize();

    if actual_checksum != stored_checksum {
        return Err(StoreError::ChecksumMismatch {
            expected: stored_checksum,
            actual: actual_checksum,
        });
    }

    Ok(Needle { id, flags, data })
}

/// Round a byte offset up to the next 8-byte boundary, the padding rule the
/// container applies between consecutive needles.
#[inline]
pub fn align8(offset: u64) -> u64 {
    (offset + 7) & !7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let encoded = encode_needle(42, 0, b"foobar");
        let decoded = decode_needle(&encoded).unwrap();
        assert_eq!(decoded.id, 42);
        assert_eq!(decoded.flags, 0);
        assert_eq!(decoded.data, b"foobar");
        assert!(!decoded.is_tombstone());
    }

    #[test]
    fn empty_payload_is_20_bytes_and_round_trips() {
        let encoded = encode_needle(1, 0, b"");
        assert_eq!(encoded.len(), MIN_NEEDLE_SIZE);
        let decoded = decode_needle(&encoded).unwrap();
        assert_eq!(decoded.data, b"");
    }

    #[test]
    fn bit_flip_yields_checksum_mismatch() {
        let mut encoded = encode_needle(7, 0, &[0, 1, 2, 3]);
        let data_byte_index = NEEDLE_HEADER_SIZE + 2;
        encoded[data_byte_index] ^= 0xFF;
        let err = decode_needle(&encoded).unwrap_err();
        assert!(matches!(err, StoreError::ChecksumMismatch { .. }));
    }

    #[test]
    fn truncated_data_size_yields_invalid_framing_not_checksum_mismatch() {
        let mut encoded = encode_needle(7, 0, &[0, 1, 2, 3]);
        // Declare one more byte of payload than is actually present.
        encoded[12..16].copy_from_slice(&5u32.to_le_bytes());
        let err = decode_needle(&encoded).unwrap_err();
        assert!(matches!(err, StoreError::InvalidFraming { .. }));
    }

    #[test]
    fn tombstone_flag_round_trips() {
        let encoded = encode_needle(5, FLAG_TOMBSTONE, b"");
        let decoded = decode_needle(&encoded).unwrap();
        assert!(decoded.is_tombstone());
    }

    #[test]
    fn align8_rounds_up() {
        assert_eq!(align8(78), 80);
        assert_eq!(align8(80), 80);
        assert_eq!(align8(81), 88);
    }
}
