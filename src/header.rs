use crate::codec::{options, DecodeError, CRC32};
use bincode::Options;
use serde::{Deserialize, Serialize};

/// GPT signature ("EFI PART").
pub const SIGNATURE: [u8; 8] = *b"EFI PART";
/// Signature written over a header that must be skipped on purpose ("IGNOREME").
pub const IGNORE_SIGNATURE: [u8; 8] = *b"IGNOREME";
/// GPT revision 1.0.
pub const REVISION: [u8; 4] = [0x00, 0x00, 0x01, 0x00];
/// Size (in bytes) of the header structure.
pub const HEADER_SIZE: usize = 92;
/// Largest `header_size` accepted: the header must fit in the smallest logical block.
pub const MAX_HEADER_SIZE: u32 = 512;
/// Location (in blocks) of the primary header.
pub const PRIMARY_HEADER_LBA: u64 = 1;
/// Smallest LBA at which the primary partition entry array may start.
pub const MIN_ENTRY_ARRAY_LBA: u64 = 2;

/// A GUID Partition Table header as describe on
/// [Wikipedia's page](https://en.wikipedia.org/wiki/GUID_Partition_Table#Partition_table_header_(LBA_1)).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct GPTHeader {
    /// GPT signature (must be "EFI PART").
    pub signature: [u8; 8],
    /// GPT revision (must be 00 00 01 00).
    pub revision: [u8; 4],
    /// GPT header size (at least 92).
    pub header_size: u32,
    /// CRC32 checksum of the header, computed while this field is zero.
    pub crc32_checksum: u32,
    /// Reserved bytes of the header.
    pub reserved: [u8; 4],
    /// Location (in blocks) of this copy of the header.
    pub my_lba: u64,
    /// Location (in blocks) of the other copy of the header.
    pub alternate_lba: u64,
    /// Location (in blocks) of the first usable block.
    pub first_usable_lba: u64,
    /// Location (in blocks) of the last usable block.
    pub last_usable_lba: u64,
    /// 16 bytes representing the GUID of the disk.
    pub disk_guid: [u8; 16],
    /// Location (in blocks) of the partition entry array of this copy.
    pub partition_entry_lba: u64,
    /// Number of partition entries in the array.
    pub number_of_partition_entries: u32,
    /// Size (in bytes) of a partition entry.
    pub size_of_partition_entry: u32,
    /// CRC32 checksum of the partition entry array.
    pub partition_entry_array_crc32: u32,
    /// Bytes 92 to `header_size` of the header block, as they were read. They are covered by the
    /// header checksum and written back after the structure.
    #[serde(skip)]
    pub extra_bytes: Vec<u8>,
}

/// Decode a header from the start of `bytes` (usually a whole block).
pub fn decode_header(bytes: &[u8]) -> Result<GPTHeader, DecodeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DecodeError::TooShort {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    let mut header: GPTHeader = options().deserialize(&bytes[..HEADER_SIZE])?;
    let end = (header.header_size as usize)
        .min(MAX_HEADER_SIZE as usize)
        .min(bytes.len());
    if end > HEADER_SIZE {
        header.extra_bytes = bytes[HEADER_SIZE..end].to_vec();
    }

    Ok(header)
}

/// Encode a header into its on-disk representation: the 92 bytes structure followed by
/// `extra_bytes`.
pub fn encode_header(header: &GPTHeader) -> Vec<u8> {
    let mut data = options().serialize(header).expect("could not serialize");
    debug_assert_eq!(data.len(), HEADER_SIZE);
    data.extend_from_slice(&header.extra_bytes);
    data
}

impl GPTHeader {
    /// Size (in bytes) of the partition entry array described by this header.
    pub fn partition_entry_array_len(&self) -> u64 {
        u64::from(self.number_of_partition_entries) * u64::from(self.size_of_partition_entry)
    }

    /// Generate the CRC32 checksum of the header only.
    ///
    /// The checksum covers `header_size` bytes: the encoded structure, `extra_bytes`, then zeroes
    /// if `extra_bytes` is shorter than the header.
    pub fn generate_crc32_checksum(&self) -> u32 {
        let mut clone = self.clone();
        clone.crc32_checksum = 0;
        let data = encode_header(&clone);

        let data = &data[..data.len().min((self.header_size as usize).max(HEADER_SIZE))];
        let mut digest = CRC32.digest();
        digest.update(data);
        let tail = (self.header_size as usize).saturating_sub(data.len());
        if tail > 0 {
            digest.update(&vec![0; tail]);
        }

        digest.finalize()
    }

    /// Update the CRC32 checksum of this header.
    pub fn update_crc32_checksum(&mut self) {
        self.crc32_checksum = self.generate_crc32_checksum();
    }

    /// Generate the CRC32 checksum of an encoded partition entry array.
    pub fn generate_partition_entry_array_crc32(entry_array: &[u8]) -> u32 {
        CRC32.checksum(entry_array)
    }

    /// Update the CRC32 checksum of the partition entry array.
    pub fn update_partition_entry_array_crc32(&mut self, entry_array: &[u8]) {
        self.partition_entry_array_crc32 = Self::generate_partition_entry_array_crc32(entry_array);
    }

    /// Derive the backup header from a primary header.
    ///
    /// The locations are swapped, the entry array is placed right after the last usable block
    /// and the header checksum is recomputed. The entry array checksum is kept as is.
    pub fn to_backup(&self) -> GPTHeader {
        let mut backup = self.clone();
        backup.my_lba = self.alternate_lba;
        backup.alternate_lba = self.my_lba;
        backup.partition_entry_lba = self.last_usable_lba + 1;
        backup.update_crc32_checksum();
        backup
    }

    /// Derive the primary header from a backup header, placing the primary entry array at
    /// `partition_entry_lba`.
    pub fn to_primary(&self, partition_entry_lba: u64) -> GPTHeader {
        let mut primary = self.clone();
        primary.my_lba = PRIMARY_HEADER_LBA;
        primary.alternate_lba = self.my_lba;
        primary.partition_entry_lba = partition_entry_lba;
        primary.update_crc32_checksum();
        primary
    }

    /// Returns `true` if the header is a primary copy (the header is located at the beginning of
    /// the disk).
    pub fn is_primary(&self) -> bool {
        self.my_lba == PRIMARY_HEADER_LBA
    }

    /// Returns `true` if the header is a backup copy (the header is located at the end of the
    /// disk).
    pub fn is_backup(&self) -> bool {
        !self.is_primary()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    pub(crate) fn sample_header() -> GPTHeader {
        let mut header = GPTHeader {
            signature: SIGNATURE,
            revision: REVISION,
            header_size: HEADER_SIZE as u32,
            crc32_checksum: 0,
            reserved: [0; 4],
            my_lba: 1,
            alternate_lba: 99,
            first_usable_lba: 34,
            last_usable_lba: 66,
            disk_guid: [0xab; 16],
            partition_entry_lba: 2,
            number_of_partition_entries: 128,
            size_of_partition_entry: 128,
            partition_entry_array_crc32: 0x1234_5678,
            extra_bytes: Vec::new(),
        };
        header.update_crc32_checksum();
        header
    }

    #[test]
    fn field_offsets() {
        let header = sample_header();
        let data = encode_header(&header);

        assert_eq!(data.len(), 92);
        assert_eq!(&data[0..8], b"EFI PART");
        assert_eq!(&data[8..12], &[0, 0, 1, 0]);
        assert_eq!(&data[12..16], &92_u32.to_le_bytes());
        assert_eq!(&data[16..20], &header.crc32_checksum.to_le_bytes());
        assert_eq!(&data[24..32], &1_u64.to_le_bytes());
        assert_eq!(&data[32..40], &99_u64.to_le_bytes());
        assert_eq!(&data[40..48], &34_u64.to_le_bytes());
        assert_eq!(&data[48..56], &66_u64.to_le_bytes());
        assert_eq!(&data[56..72], &[0xab; 16]);
        assert_eq!(&data[72..80], &2_u64.to_le_bytes());
        assert_eq!(&data[80..84], &128_u32.to_le_bytes());
        assert_eq!(&data[84..88], &128_u32.to_le_bytes());
        assert_eq!(&data[88..92], &0x1234_5678_u32.to_le_bytes());
    }

    #[test]
    fn decode_from_block() {
        let header = sample_header();
        let mut block = encode_header(&header);
        block.resize(512, 0xff);

        assert_eq!(decode_header(&block).unwrap(), header);
        assert!(matches!(
            decode_header(&block[..91]),
            Err(DecodeError::TooShort {
                expected: 92,
                actual: 91
            })
        ));
    }

    #[test]
    fn checksum_ignores_stored_checksum() {
        let mut header = sample_header();
        let sum = header.crc32_checksum;
        assert_ne!(sum, 0);
        assert_eq!(header.generate_crc32_checksum(), sum);

        header.crc32_checksum = 0xdead_beef;
        assert_eq!(header.generate_crc32_checksum(), sum);

        header.crc32_checksum = 0;
        let data = encode_header(&header);
        assert_eq!(CRC32.checksum(&data), sum);
    }

    #[test]
    fn checksum_covers_header_size() {
        let mut header = sample_header();
        header.header_size = 96;
        header.crc32_checksum = 0;
        let mut data = encode_header(&header);
        data.extend_from_slice(&[0; 4]);

        assert_eq!(header.generate_crc32_checksum(), CRC32.checksum(&data));
    }

    #[test]
    fn checksum_covers_extra_bytes() {
        let mut header = sample_header();
        header.header_size = 96;
        header.crc32_checksum = 0;
        let mut block = encode_header(&header);
        block.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let sum = CRC32.checksum(&block);
        block[16..20].copy_from_slice(&sum.to_le_bytes());
        block.resize(512, 0x55);

        let decoded = decode_header(&block).unwrap();
        assert_eq!(decoded.extra_bytes, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(decoded.crc32_checksum, sum);
        assert_eq!(decoded.generate_crc32_checksum(), sum);
        assert_eq!(encode_header(&decoded), block[..96].to_vec());

        let backup = decoded.to_backup();
        assert_eq!(backup.extra_bytes, decoded.extra_bytes);
        assert_eq!(backup.crc32_checksum, backup.generate_crc32_checksum());
    }

    #[test]
    fn derive_backup_and_primary() {
        let primary = sample_header();
        let backup = primary.to_backup();

        assert!(backup.is_backup());
        assert_eq!(backup.my_lba, 99);
        assert_eq!(backup.alternate_lba, 1);
        assert_eq!(backup.partition_entry_lba, 67);
        assert_eq!(
            backup.partition_entry_array_crc32,
            primary.partition_entry_array_crc32
        );
        assert_eq!(backup.crc32_checksum, backup.generate_crc32_checksum());

        let restored = backup.to_primary(2);
        assert!(restored.is_primary());
        assert_eq!(restored, primary);
    }
}
