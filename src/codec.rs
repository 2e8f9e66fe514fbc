//! Byte-level conventions shared by the header and entry codecs.
//!
//! Every multi-byte integer of the GPT is stored little endian. The bincode options returned by
//! [`options`] make this explicit instead of relying on the defaults of `bincode::serialize`.

use bincode::Options;
use crc::{Crc, CRC_32_ISO_HDLC};
use thiserror::Error;

/// The CRC-32 used for both the header checksum and the partition entry array checksum.
pub const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// An error that occurs when bytes cannot be turned into a header or partition entries.
///
/// Decoding never looks at the meaning of the fields (signature, checksums); it only rejects
/// structurally malformed input.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The buffer is shorter than the structure it should contain.
    #[error("buffer too short ({actual} < {expected} bytes)")]
    TooShort {
        /// Number of bytes required.
        expected: usize,
        /// Number of bytes available.
        actual: usize,
    },
    /// Partition entries must be at least 128 bytes long.
    #[error("unsupported partition entry size: {0}")]
    UnsupportedEntrySize(u32),
    /// Deserialization errors.
    #[error("deserialization failed")]
    Deserialize(#[from] bincode::Error),
}

/// Fixed-width, little-endian bincode options. Trailing bytes are allowed because headers are
/// decoded out of whole blocks.
pub(crate) fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .allow_trailing_bytes()
}

/// Number of blocks needed to hold `bytes` bytes.
pub(crate) fn blocks_for(bytes: u64, block_size: u32) -> u64 {
    let block_size = u64::from(block_size);
    (bytes + block_size - 1) / block_size
}

/// Copy `data` into a zero-filled buffer rounded up to a whole number of blocks.
pub(crate) fn pad_to_blocks(data: &[u8], block_size: u32) -> Vec<u8> {
    let len = blocks_for(data.len() as u64, block_size) * u64::from(block_size);
    let mut buf = vec![0; len as usize];
    buf[..data.len()].copy_from_slice(data);
    buf
}
