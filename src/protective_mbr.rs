use crate::codec::{options, DecodeError};
use bincode::Options;
use serde::{Deserialize, Serialize};

/// Size (in bytes) of the boot code area preserved when a protective MBR is written.
pub const BOOT_CODE_SIZE: usize = 440;
/// Partition type marking the whole disk as GPT-protected.
pub const OS_TYPE_GPT_PROTECTIVE: u8 = 0xee;
/// Boot sector signature.
pub const MBR_SIGNATURE: [u8; 2] = [0x55, 0xaa];

const MBR_SIZE: usize = 512;
const PARTITION_TABLE_OFFSET: usize = 446;
const PARTITION_RECORD_SIZE: usize = 16;
const SIGNATURE_OFFSET: usize = 510;

/// One of the four partition records of a legacy boot sector.
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct MbrPartitionRecord {
    /// 0x80 for an active partition.
    pub boot_indicator: u8,
    /// CHS address of the first absolute sector.
    pub starting_chs: [u8; 3],
    /// Partition type.
    pub os_type: u8,
    /// CHS address of the last absolute sector.
    pub ending_chs: [u8; 3],
    /// LBA of the first absolute sector.
    pub starting_lba: u32,
    /// Number of sectors in the partition.
    pub size_in_lba: u32,
}

impl MbrPartitionRecord {
    /// The record covering the whole disk (but LBA 0) with the type 0xEE.
    pub fn protective(block_count: u64) -> MbrPartitionRecord {
        let size = block_count.saturating_sub(1);

        MbrPartitionRecord {
            boot_indicator: 0x00,
            starting_chs: [0x00, 0x02, 0x00],
            os_type: OS_TYPE_GPT_PROTECTIVE,
            ending_chs: [0xff, 0xff, 0xff],
            starting_lba: 1,
            size_in_lba: if size > u64::from(u32::max_value()) {
                u32::max_value()
            } else {
                size as u32
            },
        }
    }
}

/// The legacy boot sector stored at LBA 0 (the "protective MBR" on a GPT disk).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyBootSector {
    /// Boot code area (440 bytes).
    pub boot_code: Vec<u8>,
    /// The four partition records.
    pub partitions: [MbrPartitionRecord; 4],
    /// Boot sector signature (0x55 0xAA).
    pub signature: [u8; 2],
}

impl LegacyBootSector {
    /// Build a protective MBR for a disk of `block_count` blocks, keeping the boot code found in
    /// `existing` (the current content of LBA 0). Everything else is overwritten.
    pub fn protective(existing: &[u8], block_count: u64) -> LegacyBootSector {
        let mut boot_code = vec![0; BOOT_CODE_SIZE];
        let keep = existing.len().min(BOOT_CODE_SIZE);
        boot_code[..keep].copy_from_slice(&existing[..keep]);

        LegacyBootSector {
            boot_code,
            partitions: [
                MbrPartitionRecord::protective(block_count),
                MbrPartitionRecord::default(),
                MbrPartitionRecord::default(),
                MbrPartitionRecord::default(),
            ],
            signature: MBR_SIGNATURE,
        }
    }

    /// Decode a legacy boot sector from the first 512 bytes of `block`.
    pub fn decode(block: &[u8]) -> Result<LegacyBootSector, DecodeError> {
        if block.len() < MBR_SIZE {
            return Err(DecodeError::TooShort {
                expected: MBR_SIZE,
                actual: block.len(),
            });
        }

        let mut partitions = [MbrPartitionRecord::default(); 4];
        for (i, record) in partitions.iter_mut().enumerate() {
            let offset = PARTITION_TABLE_OFFSET + i * PARTITION_RECORD_SIZE;
            *record = options().deserialize(&block[offset..offset + PARTITION_RECORD_SIZE])?;
        }

        Ok(LegacyBootSector {
            boot_code: block[..BOOT_CODE_SIZE].to_vec(),
            partitions,
            signature: [block[SIGNATURE_OFFSET], block[SIGNATURE_OFFSET + 1]],
        })
    }

    /// Encode the boot sector into a block of `block_size` bytes. The bytes between the boot code
    /// and the partition records, and everything after the signature, are zero.
    pub fn encode(&self, block_size: u32) -> Vec<u8> {
        let mut block = vec![0; (block_size as usize).max(MBR_SIZE)];
        let keep = self.boot_code.len().min(BOOT_CODE_SIZE);
        block[..keep].copy_from_slice(&self.boot_code[..keep]);

        for (i, record) in self.partitions.iter().enumerate() {
            let offset = PARTITION_TABLE_OFFSET + i * PARTITION_RECORD_SIZE;
            let data = options().serialize(record).expect("could not serialize");
            block[offset..offset + PARTITION_RECORD_SIZE].copy_from_slice(&data);
        }
        block[SIGNATURE_OFFSET..MBR_SIZE].copy_from_slice(&self.signature);

        block
    }

    /// Returns `true` if the sector carries the boot signature and a 0xEE partition record.
    pub fn is_protective(&self) -> bool {
        self.signature == MBR_SIGNATURE
            && self
                .partitions
                .iter()
                .any(|x| x.os_type == OS_TYPE_GPT_PROTECTIVE)
    }
}
