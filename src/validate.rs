//! Pure checks over decoded headers and raw partition entry arrays.

use crate::entry::GPTPartitionEntry;
use crate::header::{GPTHeader, HEADER_SIZE, IGNORE_SIGNATURE, MAX_HEADER_SIZE, SIGNATURE};
use thiserror::Error;

/// The reason a header or a partition entry array failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// An error that occurs when the signature of the GPT isn't what would be expected ("EFI
    /// PART").
    #[error("invalid signature")]
    BadSignature,
    /// An error that occurs when the header's size (in bytes) is lesser than 92 or doesn't fit in
    /// a block.
    #[error("invalid header size ({0})")]
    BadHeaderSize(u32),
    /// An error that occurs when a CRC32 checksum doesn't match the data it covers.
    #[error("corrupted CRC32 checksum ({stored:#010x} != {computed:#010x})")]
    BadChecksum {
        /// Checksum stored in the header.
        stored: u32,
        /// Checksum computed from the data.
        computed: u32,
    },
    /// An error that occurs when the header doesn't know where it is located.
    #[error("header claims to be at LBA {actual} but was read from LBA {expected}")]
    BadSelfReference {
        /// LBA the header was read from.
        expected: u64,
        /// LBA stored in the header.
        actual: u64,
    },
    /// An error that occurs when the usable area doesn't fit on the device.
    #[error(
        "usable blocks {first_usable_lba}-{last_usable_lba} do not fit on a device whose last \
        LBA is {last_lba}"
    )]
    OutOfRange {
        /// First usable LBA stored in the header.
        first_usable_lba: u64,
        /// Last usable LBA stored in the header.
        last_usable_lba: u64,
        /// Last LBA of the device.
        last_lba: u64,
    },
    /// An error that occurs when fewer bytes than the header describes were given as the entry
    /// array.
    #[error("partition entry array truncated ({actual} < {expected} bytes)")]
    EntryArrayTruncated {
        /// Size of the array according to the header.
        expected: u64,
        /// Number of bytes available.
        actual: u64,
    },
}

/// The outcome of validating a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    /// The header can be trusted.
    Valid,
    /// The header carries the "IGNOREME" signature: it has been suppressed on purpose and the
    /// other copy should be used without alarming anyone.
    Ignored,
    /// The header is corrupted.
    Invalid(ValidationError),
}

impl Validity {
    /// Returns `true` if the header can be trusted.
    pub fn is_valid(&self) -> bool {
        *self == Validity::Valid
    }
}

/// Validate a header read from `read_lba` on a device of `device_block_count` blocks.
///
/// Checks are done in this order: signature, header size, checksum, self reference, usable
/// range. The first failing check is reported.
pub fn validate_header(header: &GPTHeader, read_lba: u64, device_block_count: u64) -> Validity {
    if header.signature == IGNORE_SIGNATURE {
        return Validity::Ignored;
    }

    match check_header(header, read_lba, device_block_count) {
        Ok(()) => Validity::Valid,
        Err(err) => Validity::Invalid(err),
    }
}

fn check_header(
    header: &GPTHeader,
    read_lba: u64,
    device_block_count: u64,
) -> Result<(), ValidationError> {
    if header.signature != SIGNATURE {
        return Err(ValidationError::BadSignature);
    }

    if (header.header_size as usize) < HEADER_SIZE || header.header_size > MAX_HEADER_SIZE {
        return Err(ValidationError::BadHeaderSize(header.header_size));
    }

    let computed = header.generate_crc32_checksum();
    if header.crc32_checksum != computed {
        return Err(ValidationError::BadChecksum {
            stored: header.crc32_checksum,
            computed,
        });
    }

    if header.my_lba != read_lba {
        return Err(ValidationError::BadSelfReference {
            expected: read_lba,
            actual: header.my_lba,
        });
    }

    let last_lba = device_block_count.saturating_sub(1);
    if header.first_usable_lba > last_lba
        || header.last_usable_lba > last_lba
        || header.first_usable_lba > header.last_usable_lba
    {
        return Err(ValidationError::OutOfRange {
            first_usable_lba: header.first_usable_lba,
            last_usable_lba: header.last_usable_lba,
            last_lba,
        });
    }

    Ok(())
}

/// Validate the checksum of a raw partition entry array against its header.
///
/// Only the first `number_of_partition_entries * size_of_partition_entry` bytes are covered;
/// the rest of the last block is ignored.
pub fn validate_entries(header: &GPTHeader, entry_bytes: &[u8]) -> Result<(), ValidationError> {
    let expected = header.partition_entry_array_len();
    let data = entry_bytes
        .get(..expected as usize)
        .ok_or(ValidationError::EntryArrayTruncated {
            expected,
            actual: entry_bytes.len() as u64,
        })?;

    let computed = GPTHeader::generate_partition_entry_array_crc32(data);
    if header.partition_entry_array_crc32 != computed {
        return Err(ValidationError::BadChecksum {
            stored: header.partition_entry_array_crc32,
            computed,
        });
    }

    Ok(())
}

/// Returns `true` if the entry describes a partition (its type GUID is not all zeroes).
pub fn is_entry_in_use(entry: &GPTPartitionEntry) -> bool {
    entry.is_used()
}
