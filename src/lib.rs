//! A library that reads, validates, repairs, builds, writes and verifies GUID partition tables.
//!
//! Every operation goes through a [`BlockDevice`]: anything exposing fixed-size logical blocks.
//! [`DiskImage`] turns any `Read + Write + Seek` (a file, a raw block device, a
//! `Cursor<Vec<u8>>`) into one.
//!
//! # Examples
//!
//! Creating a new partition table with a boot partition and a second partition that fills the
//! rest of the disk:
//!
//! ```
//! let data = vec![0; 10_000 * 512];
//! let mut disk = gptcore::DiskImage::new(std::io::Cursor::new(data), 512)
//!     .expect("could not open disk");
//!
//! let specs = vec![
//!     gptcore::PartitionSpec::new("boot", 2048).bootable(),
//!     gptcore::PartitionSpec::new("rootfs", 0),
//! ];
//! gptcore::create_table(&mut disk, [0xff; 16], &specs, &Default::default())
//!     .expect("could not create partition table");
//! ```
//!
//! Reading all the partitions of a disk, whichever copy of the table is still valid:
//!
//! ```
//! # let data = vec![0; 10_000 * 512];
//! # let mut disk = gptcore::DiskImage::new(std::io::Cursor::new(data), 512).unwrap();
//! # gptcore::create_table(&mut disk, [0xff; 16], &[gptcore::PartitionSpec::new("a", 0)],
//! #     &Default::default()).unwrap();
//! let list = gptcore::read_table(&mut disk).expect("could not find GPT");
//!
//! println!("Disk GUID: {}", gptcore::guid::format(&list.disk_guid));
//!
//! for p in list.partitions.iter() {
//!     println!("Partition #{}: name = {}, size = {} blocks, starting lba = {}",
//!         p.number,
//!         p.name,
//!         p.size(),
//!         p.starting_lba);
//! }
//! ```
//!
//! Repairing a disk whose backup table has been overwritten:
//!
//! ```
//! # let data = vec![0; 10_000 * 512];
//! # let mut disk = gptcore::DiskImage::new(std::io::Cursor::new(data), 512).unwrap();
//! # gptcore::create_table(&mut disk, [0xff; 16], &[], &Default::default()).unwrap();
//! match gptcore::repair_table(&mut disk, &Default::default()) {
//!     gptcore::RepairOutcome::Failed(err) => panic!("could not repair: {}", err),
//!     outcome => println!("{:?}", outcome),
//! }
//! ```

#![deny(missing_docs)]

use std::io;
use thiserror::Error;

mod build;
mod codec;
mod config;
mod device;
mod entry;
mod header;
mod locate;
mod protective_mbr;
mod table;
mod validate;
mod verify;
mod write;

pub mod guid;

/// Linux specific helpers
#[cfg(target_os = "linux")]
pub mod linux;

pub use build::{build, PartitionSpec, PartitionTable, BACKUP_RESERVED_BLOCKS};
pub use codec::DecodeError;
pub use config::{Config, DEFAULT_NUMBER_OF_PARTITION_ENTRIES};
pub use device::{BlockDevice, DiskImage};
pub use entry::{
    decode_entries, encode_entries, GPTPartitionEntry, PartitionName, ENTRY_SIZE,
    LEGACY_BIOS_BOOTABLE, NAME_LEN, NO_BLOCK_IO_PROTOCOL, REQUIRED_PARTITION,
    TYPE_SPECIFIC_BOOTABLE,
};
pub use header::{decode_header, encode_header, GPTHeader, HEADER_SIZE, IGNORE_SIGNATURE, SIGNATURE};
pub use locate::{
    locate_valid, read_copy, repair_table, CopyFault, CopyLocation, GptCopy, RepairOutcome,
};
pub use protective_mbr::{LegacyBootSector, MbrPartitionRecord};
pub use table::{
    create_table, read_table, rename_partition, swap_partitions, PartitionInfo, PartitionList,
};
pub use validate::{is_entry_in_use, validate_entries, validate_header, ValidationError, Validity};
pub use verify::{verify_entries, verify_table, MismatchField};
pub use write::{write_table, WriteStep};

/// An error that can be produced while reading, repairing, building, writing or verifying a GPT.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O errors of the block device.
    #[error("generic I/O error")]
    Io(#[from] io::Error),
    /// An error that occurs when one copy of the table cannot be used.
    #[error("{0} GPT is not usable: {1}")]
    InvalidCopy(CopyLocation, CopyFault),
    /// An error that occurs when neither copy of the table can be used. Nothing is written when
    /// this happens.
    #[error("could not read primary GPT ({primary}) nor backup GPT ({backup})")]
    Unrecoverable {
        /// Why the primary copy is not usable.
        primary: CopyFault,
        /// Why the backup copy is not usable.
        backup: CopyFault,
    },
    /// An error that occurs when a partition would overlap the table or another partition.
    #[error("partition {partition:?} overlaps {with}")]
    Overlap {
        /// Name of the rejected partition.
        partition: String,
        /// What it overlaps: a region of the table or the name of another partition.
        with: String,
    },
    /// An error that occurs when a partition would end after the last usable block.
    #[error(
        "partition {partition:?} would end at LBA {ending_lba}, after the last usable LBA \
        {last_usable_lba}"
    )]
    TooLarge {
        /// Name of the rejected partition.
        partition: String,
        /// Last block the partition would have.
        ending_lba: u64,
        /// Last usable block of the disk.
        last_usable_lba: u64,
    },
    /// An error that occurs when a partition other than the last one has a size of 0.
    #[error("partition {0:?} has a size of 0 but is not the last partition")]
    ZeroSize(String),
    /// An error that occurs when there are more partitions than entries in the array.
    #[error("too many partitions ({count} > {max})")]
    TooManyPartitions {
        /// Number of partitions requested.
        count: usize,
        /// Number of entries of the array.
        max: u32,
    },
    /// An error that occurs when there are partitions with the same GUID in the same array.
    #[error("conflict of partition GUIDs (partition {0:?})")]
    ConflictPartitionGUID(String),
    /// An error that occurs when a partition name doesn't fit in 36 UTF-16 code units.
    #[error("partition name too long: {0:?}")]
    NameTooLong(String),
    /// An error that occurs when the device cannot hold the two copies of the table.
    #[error("device too small ({0} blocks)")]
    DiskTooSmall(u64),
    /// An error that occurs when the entry array of one copy would run into another structure.
    #[error("inconsistent layout: {0}")]
    InconsistentLayout(String),
    /// An error that occurs when a table built for a device of another size is written.
    #[error("table doesn't fit the device (backup header expected at LBA {expected}, table says {actual})")]
    GeometryMismatch {
        /// Last LBA of the device.
        expected: u64,
        /// `alternate_lba` of the table.
        actual: u64,
    },
    /// An error that occurs when the number of entries doesn't match the header.
    #[error("invalid number of partition entries ({actual} != {expected})")]
    InvalidEntryCount {
        /// Number of entries according to the header.
        expected: u32,
        /// Number of entries given.
        actual: usize,
    },
    /// An error that occurs when a step of writing a table fails. The steps before it have been
    /// written, the steps after it have not.
    #[error("could not write the {step}")]
    Write {
        /// The failing step.
        step: WriteStep,
        /// The I/O error of the block device.
        source: io::Error,
    },
    /// An error that occurs when a partition on disk doesn't match what was expected.
    #[error("partition {partition:?}: {field} mismatch (expected {expected}, found {actual})")]
    Mismatch {
        /// Name of the expected partition.
        partition: String,
        /// The field that differs.
        field: MismatchField,
        /// Expected value.
        expected: String,
        /// Value found on disk.
        actual: String,
    },
    /// An error that occurs when more partitions are expected than there are entries on disk.
    #[error("partition {partition:?} (index {index}) is missing")]
    MissingPartition {
        /// 0-based index of the expected partition.
        index: usize,
        /// Name of the expected partition.
        partition: String,
    },
    /// An error that occurs when the user provide an invalid partition number.
    /// The partition number must be between 1 and `number_of_partition_entries` (usually 128)
    /// included.
    #[error("invalid partition number: {0}")]
    InvalidPartitionNumber(u32),
    /// An operation that required to find a partition, was unable to find that partition.
    #[error("partition not found: {0}")]
    PartitionNotFound(String),
    /// An error that occurs when a partition has an invalid boundary.
    /// The end sector must be greater or equal to the start sector of the partition.
    #[error("invalid partition boundaries: the last block is before the first block")]
    InvalidPartitionBoundaries,
}

/// The result of reading, repairing, building, writing or verifying a GPT.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn disk(ss: u32, blocks: usize) -> DiskImage<Cursor<Vec<u8>>> {
        DiskImage::new(Cursor::new(vec![0; ss as usize * blocks]), ss).unwrap()
    }

    #[test]
    fn create_read_repair_verify() {
        fn test(ss: u32) {
            let mut disk = disk(ss, 4000);
            let config = Config::default();
            let specs = vec![
                PartitionSpec::new("boot", 1000).bootable(),
                PartitionSpec::new("rootfs", 0),
            ];
            create_table(&mut disk, [0xaa; 16], &specs, &config).unwrap();

            let list = read_table(&mut disk).unwrap();
            assert_eq!(list.partitions.len(), 2);
            assert!(verify_table(&mut disk, &specs).is_ok());

            // wipe the primary header
            let zeros = vec![0; ss as usize];
            disk.write(1, 1, &zeros).unwrap();
            assert_eq!(read_table(&mut disk).unwrap().source, CopyLocation::Backup);
            assert!(verify_table(&mut disk, &specs).is_ok());

            assert!(matches!(
                repair_table(&mut disk, &config),
                RepairOutcome::RepairedPrimary
            ));
            assert_eq!(read_table(&mut disk).unwrap(), list);
            assert!(matches!(
                repair_table(&mut disk, &config),
                RepairOutcome::NoneNeeded
            ));
        }

        test(512);
        test(4096);
    }

    #[test]
    fn error_messages() {
        let err = Error::Mismatch {
            partition: "boot".to_string(),
            field: MismatchField::Size,
            expected: "99999".to_string(),
            actual: "100000".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "partition \"boot\": size mismatch (expected 99999, found 100000)"
        );

        let err = Error::Unrecoverable {
            primary: CopyFault::Header(ValidationError::BadSignature),
            backup: CopyFault::Ignored,
        };
        assert_eq!(
            err.to_string(),
            "could not read primary GPT (invalid header: invalid signature) nor backup GPT \
            (header is marked to be ignored)"
        );

        let err = Error::Write {
            step: WriteStep::BackupHeader,
            source: io::Error::new(io::ErrorKind::Other, "boom"),
        };
        assert_eq!(err.to_string(), "could not write the backup GPT header");
        assert!(std::error::Error::source(&err).is_some());
    }
}
