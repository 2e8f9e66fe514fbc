use crate::codec::{options, DecodeError};
use crate::Error;
use bincode::Options;
use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Size (in bytes) of a partition entry.
pub const ENTRY_SIZE: usize = 128;
/// Number of UTF-16LE code units in a partition name.
pub const NAME_LEN: usize = 36;

/// Attribute bit 0: the platform requires the partition to function properly.
pub const REQUIRED_PARTITION: u64 = 1 << 0;
/// Attribute bit 1: firmware must not produce a block I/O protocol for the partition.
pub const NO_BLOCK_IO_PROTOCOL: u64 = 1 << 1;
/// Attribute bit 2: the partition may be booted by legacy BIOS firmware.
pub const LEGACY_BIOS_BOOTABLE: u64 = 1 << 2;
/// Attribute bit 60: type-specific flag, also read as a bootable marker.
pub const TYPE_SPECIFIC_BOOTABLE: u64 = 1 << 60;

/// A wrapper type for `String` that represents a partition's name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartitionName(String);

impl PartitionName {
    /// Extracts a string slice containing the entire `PartitionName`.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for PartitionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PartitionName {
    fn from(value: &str) -> PartitionName {
        PartitionName(value.to_string())
    }
}

struct UTF16LEVisitor;

impl<'de> Visitor<'de> for UTF16LEVisitor {
    type Value = PartitionName;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("36 UTF-16LE code units (72 bytes)")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<PartitionName, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut v = Vec::new();
        let mut end = false;
        loop {
            match seq.next_element()? {
                Some(0) => end = true,
                Some(x) if !end => v.push(x),
                Some(_) => {}
                None => break,
            }
        }

        Ok(PartitionName(String::from_utf16_lossy(&v)))
    }
}

impl<'de> Deserialize<'de> for PartitionName {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_tuple(NAME_LEN, UTF16LEVisitor)
    }
}

impl Serialize for PartitionName {
    // Names longer than 36 code units are truncated, shorter ones padded with NULs.
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = self.0.encode_utf16();
        let mut seq = serializer.serialize_tuple(NAME_LEN)?;
        for x in s.chain([0].iter().cycle().cloned()).take(NAME_LEN) {
            seq.serialize_element(&x)?;
        }
        seq.end()
    }
}

/// A GPT partition's entry in the partition array.
///
/// # Examples
///
/// Basic usage:
/// ```
/// let entry = gptcore::GPTPartitionEntry {
///     partition_type_guid: gptcore::guid::BASIC_DATA_PARTITION,
///     unique_partition_guid: [0xff; 16],
///     starting_lba: 34,
///     ending_lba: 2081,
///     attribute_bits: gptcore::LEGACY_BIOS_BOOTABLE,
///     partition_name: "boot".into(),
/// };
///
/// assert!(entry.is_used());
/// assert!(entry.is_bootable());
/// assert_eq!(entry.size().ok(), Some(2048));
/// ```
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct GPTPartitionEntry {
    /// 16 bytes representing the GUID of the partition's type.
    pub partition_type_guid: [u8; 16],
    /// 16 bytes representing the GUID of the partition.
    pub unique_partition_guid: [u8; 16],
    /// The position (in blocks) of the first block of the partition.
    pub starting_lba: u64,
    /// The position (in blocks) of the last block of the partition (inclusive).
    pub ending_lba: u64,
    /// The attribute bits.
    ///
    /// See [Wikipedia's page](https://en.wikipedia.org/wiki/GUID_Partition_Table#Partition_entries_(LBA_2%E2%80%9333))
    /// for more information.
    pub attribute_bits: u64,
    /// The partition name.
    pub partition_name: PartitionName,
}

impl GPTPartitionEntry {
    /// Creates an empty partition entry
    pub fn empty() -> GPTPartitionEntry {
        GPTPartitionEntry {
            partition_type_guid: [0; 16],
            unique_partition_guid: [0; 16],
            starting_lba: 0,
            ending_lba: 0,
            attribute_bits: 0,
            partition_name: "".into(),
        }
    }

    /// Returns `true` if the partition entry is not used (type GUID == `[0; 16]`)
    pub fn is_unused(&self) -> bool {
        self.partition_type_guid == [0; 16]
    }

    /// Returns `true` if the partition entry is used (type GUID != `[0; 16]`)
    pub fn is_used(&self) -> bool {
        !self.is_unused()
    }

    /// Returns `true` if either the legacy BIOS bootable bit (2) or the type-specific bootable
    /// bit (60) is set.
    pub fn is_bootable(&self) -> bool {
        self.attribute_bits & (LEGACY_BIOS_BOOTABLE | TYPE_SPECIFIC_BOOTABLE) != 0
    }

    /// Returns the number of blocks in the partition. A partition entry must always be 1 block
    /// long at minimum.
    ///
    /// # Errors
    ///
    /// This function will return an error if the `ending_lba` is lesser than the `starting_lba`.
    pub fn size(&self) -> crate::Result<u64> {
        if self.ending_lba < self.starting_lba {
            return Err(Error::InvalidPartitionBoundaries);
        }

        Ok(self.ending_lba - self.starting_lba + 1)
    }
}

/// Decode `count` entries of `entry_size` bytes from an entry array.
///
/// Only the first 128 bytes of each entry are decoded; entries larger than that are allowed and
/// their remaining bytes are skipped.
pub fn decode_entries(
    bytes: &[u8],
    count: u32,
    entry_size: u32,
) -> Result<Vec<GPTPartitionEntry>, DecodeError> {
    let stride = entry_size as usize;
    if stride < ENTRY_SIZE {
        return Err(DecodeError::UnsupportedEntrySize(entry_size));
    }

    let expected = count as usize * stride;
    if bytes.len() < expected {
        return Err(DecodeError::TooShort {
            expected,
            actual: bytes.len(),
        });
    }

    bytes[..expected]
        .chunks_exact(stride)
        .map(|chunk| {
            options()
                .deserialize(&chunk[..ENTRY_SIZE])
                .map_err(DecodeError::from)
        })
        .collect()
}

/// Encode entries into a contiguous entry array of `entry_size` bytes per entry.
///
/// Each entry is encoded on 128 bytes and padded with zeroes up to `entry_size`.
pub fn encode_entries(entries: &[GPTPartitionEntry], entry_size: u32) -> Vec<u8> {
    let stride = (entry_size as usize).max(ENTRY_SIZE);
    let mut data = Vec::with_capacity(entries.len() * stride);
    for entry in entries {
        options()
            .serialize_into(&mut data, entry)
            .expect("could not serialize");
        data.resize(data.len() - ENTRY_SIZE + stride, 0);
    }
    debug_assert_eq!(data.len(), entries.len() * stride);
    data
}
