use crate::build::PartitionTable;
use crate::codec::{blocks_for, pad_to_blocks};
use crate::device::{read_blocks, write_blocks, BlockDevice};
use crate::entry::{encode_entries, ENTRY_SIZE};
use crate::header::{encode_header, GPTHeader, PRIMARY_HEADER_LBA};
use crate::protective_mbr::LegacyBootSector;
use crate::{Error, Result};
use log::{debug, info};
use std::fmt;
use std::io;

/// The steps of [`write_table`], in the order they are performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    /// Reading the current boot sector and writing the protective MBR at LBA 0.
    ProtectiveMbr,
    /// Writing the primary header at LBA 1.
    PrimaryHeader,
    /// Writing the primary partition entry array.
    PrimaryEntries,
    /// Writing the backup partition entry array.
    BackupEntries,
    /// Writing the backup header at the last LBA.
    BackupHeader,
    /// Asking the device to refresh its view of the partition table.
    Notify,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WriteStep::ProtectiveMbr => "protective MBR",
            WriteStep::PrimaryHeader => "primary GPT header",
            WriteStep::PrimaryEntries => "primary partition entry array",
            WriteStep::BackupEntries => "backup partition entry array",
            WriteStep::BackupHeader => "backup GPT header",
            WriteStep::Notify => "partition table reload",
        };
        write!(f, "{}", s)
    }
}

trait StepContext<T> {
    fn step(self, step: WriteStep) -> Result<T>;
}

impl<T> StepContext<T> for io::Result<T> {
    fn step(self, step: WriteStep) -> Result<T> {
        self.map_err(|source| Error::Write { step, source })
    }
}

fn check_geometry<D: BlockDevice + ?Sized>(device: &D, table: &PartitionTable) -> Result<()> {
    let header = &table.header;
    let block_count = device.block_count();
    let last_lba = block_count.saturating_sub(1);

    if header.my_lba != PRIMARY_HEADER_LBA || header.alternate_lba != last_lba {
        return Err(Error::GeometryMismatch {
            expected: last_lba,
            actual: header.alternate_lba,
        });
    }

    if table.entries.len() != header.number_of_partition_entries as usize {
        return Err(Error::InvalidEntryCount {
            expected: header.number_of_partition_entries,
            actual: table.entries.len(),
        });
    }

    if (header.size_of_partition_entry as usize) < ENTRY_SIZE {
        return Err(Error::InconsistentLayout(format!(
            "unsupported partition entry size: {}",
            header.size_of_partition_entry
        )));
    }

    let entry_blocks = blocks_for(header.partition_entry_array_len(), device.block_size());
    if header.partition_entry_lba <= PRIMARY_HEADER_LBA
        || header
            .partition_entry_lba
            .checked_add(entry_blocks)
            .map_or(true, |end| end > header.first_usable_lba)
    {
        return Err(Error::InconsistentLayout(format!(
            "primary partition entry array at LBA {} ({} blocks) overlaps the primary header or \
            the first usable LBA {}",
            header.partition_entry_lba, entry_blocks, header.first_usable_lba
        )));
    }
    if header.first_usable_lba > header.last_usable_lba
        || header
            .last_usable_lba
            .checked_add(1 + entry_blocks)
            .map_or(true, |end| end > last_lba)
    {
        return Err(Error::InconsistentLayout(format!(
            "usable blocks {}-{} leave no room for the backup partition entry array ({} blocks)",
            header.first_usable_lba, header.last_usable_lba, entry_blocks
        )));
    }

    Ok(())
}

/// Write a whole table to the device: the protective MBR, the primary copy, the backup copy, then
/// ask the device to refresh its view of the partition table.
///
/// Both checksums of `table.header` are computed and stored before anything is written. The first
/// 440 bytes of LBA 0 (boot code) are preserved. The backup header that was written is returned.
///
/// Nothing is written if the table was built for a device of another size. Otherwise each step
/// must succeed before the next one starts and the first I/O failure aborts the sequence with
/// [`Error::Write`] naming the step.
///
/// # Examples
///
/// Basic usage:
/// ```
/// let data = vec![0; 1000 * 512];
/// let mut disk = gptcore::DiskImage::new(std::io::Cursor::new(data), 512).unwrap();
///
/// let specs = vec![gptcore::PartitionSpec::new("data", 0)];
/// let mut table = gptcore::build(1000, 512, [0xff; 16], &specs, &Default::default())
///     .expect("could not build table");
/// let backup = gptcore::write_table(&mut disk, &mut table).expect("could not write table");
///
/// assert_eq!(backup.my_lba, 999);
/// assert_ne!(table.header.crc32_checksum, 0);
/// ```
pub fn write_table<D: BlockDevice + ?Sized>(
    device: &mut D,
    table: &mut PartitionTable,
) -> Result<GPTHeader> {
    check_geometry(device, table)?;

    let block_size = device.block_size();
    let block_count = device.block_count();

    let entry_array = encode_entries(&table.entries, table.header.size_of_partition_entry);
    table.header.update_partition_entry_array_crc32(&entry_array);
    table.header.update_crc32_checksum();
    let entry_array = pad_to_blocks(&entry_array, block_size);
    let backup = table.header.to_backup();

    debug!("writing protective MBR");
    let existing = read_blocks(device, 0, 1).step(WriteStep::ProtectiveMbr)?;
    let mbr = LegacyBootSector::protective(&existing, block_count).encode(block_size);
    write_blocks(device, 0, &mbr).step(WriteStep::ProtectiveMbr)?;

    debug!("writing primary GPT header at LBA {}", table.header.my_lba);
    write_blocks(
        device,
        table.header.my_lba,
        &pad_to_blocks(&encode_header(&table.header), block_size),
    )
    .step(WriteStep::PrimaryHeader)?;

    debug!(
        "writing primary partition entry array at LBA {}",
        table.header.partition_entry_lba
    );
    write_blocks(device, table.header.partition_entry_lba, &entry_array)
        .step(WriteStep::PrimaryEntries)?;

    debug!(
        "writing backup partition entry array at LBA {}",
        backup.partition_entry_lba
    );
    write_blocks(device, backup.partition_entry_lba, &entry_array)
        .step(WriteStep::BackupEntries)?;

    debug!("writing backup GPT header at LBA {}", backup.my_lba);
    write_blocks(
        device,
        backup.my_lba,
        &pad_to_blocks(&encode_header(&backup), block_size),
    )
    .step(WriteStep::BackupHeader)?;

    device.notify_table_changed().step(WriteStep::Notify)?;
    info!(
        "partition table written ({} partitions)",
        table.iter().count()
    );

    Ok(backup)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::build::{build, PartitionSpec};
    use crate::config::Config;
    use crate::device::testing::SparseDisk;
    use crate::header::decode_header;
    use crate::locate::{read_copy, CopyLocation};
    use crate::protective_mbr::{LegacyBootSector, OS_TYPE_GPT_PROTECTIVE};
    use crate::validate::{validate_header, ValidationError, Validity};

    fn specs() -> Vec<PartitionSpec> {
        vec![
            PartitionSpec::new("boot", 100_000).bootable(),
            PartitionSpec::new("rootfs", 0),
        ]
    }

    #[test]
    fn write_fresh_disk() {
        fn test(ss: u32) {
            let mut disk = SparseDisk::new(ss, 2_000_000);
            disk.set_block(0, &[0x90; 512]);
            let mut table = build(2_000_000, ss, [3; 16], &specs(), &Config::default()).unwrap();
            let backup = write_table(&mut disk, &mut table).unwrap();

            assert_eq!(disk.writes, 5);
            assert_eq!(disk.notifications, 1);
            assert_eq!(backup.my_lba, 1_999_999);
            assert_eq!(backup.alternate_lba, 1);
            assert_eq!(backup.partition_entry_lba, 1_999_967);

            let mbr = LegacyBootSector::decode(&disk.block(0)).unwrap();
            assert!(mbr.is_protective());
            assert_eq!(mbr.boot_code, vec![0x90; 440]);
            assert_eq!(mbr.partitions[0].os_type, OS_TYPE_GPT_PROTECTIVE);
            assert_eq!(mbr.partitions[0].size_in_lba, 1_999_999);

            let primary = read_copy(&mut disk, CopyLocation::Primary).unwrap();
            let on_disk_backup = read_copy(&mut disk, CopyLocation::Backup).unwrap();
            assert_eq!(primary.header, table.header);
            assert_eq!(primary.entries, table.entries);
            assert_eq!(on_disk_backup.header, backup);
            assert_eq!(on_disk_backup.entries, table.entries);
        }

        test(512);
        test(4096);
    }

    #[test]
    fn checksums_are_valid_right_after_write() {
        let mut disk = SparseDisk::new(512, 1000);
        let mut table = build(1000, 512, [3; 16], &[], &Config::default()).unwrap();
        write_table(&mut disk, &mut table).unwrap();

        let block = disk.block(1);
        let header = decode_header(&block).unwrap();
        assert_eq!(validate_header(&header, 1, 1000), Validity::Valid);

        for i in (0..16).chain(20..92) {
            let mut corrupted = block.clone();
            corrupted[i] ^= 0x20;
            let header = decode_header(&corrupted).unwrap();
            match validate_header(&header, 1, 1000) {
                Validity::Invalid(ValidationError::BadChecksum { .. }) => {}
                Validity::Invalid(ValidationError::BadSignature) => assert!(i < 8),
                Validity::Invalid(ValidationError::BadHeaderSize(_)) => {
                    assert!((12..16).contains(&i))
                }
                x => panic!("byte {}: unexpected outcome {:?}", i, x),
            }
        }
    }

    #[test]
    fn writing_twice_gives_the_same_bytes() {
        let mut table = build(1000, 512, [3; 16], &specs()[1..], &Config::default()).unwrap();
        let mut first = SparseDisk::new(512, 1000);
        write_table(&mut first, &mut table).unwrap();
        let mut second = first.clone();
        write_table(&mut second, &mut table).unwrap();

        for lba in 0..1000 {
            assert_eq!(first.block(lba), second.block(lba));
        }
    }

    #[test]
    fn failing_step_is_reported() {
        let steps = [
            WriteStep::ProtectiveMbr,
            WriteStep::PrimaryHeader,
            WriteStep::PrimaryEntries,
            WriteStep::BackupEntries,
            WriteStep::BackupHeader,
        ];

        for (i, expected) in steps.iter().enumerate() {
            let mut disk = SparseDisk::new(512, 1000);
            disk.fail_write = Some(i);
            let mut table = build(1000, 512, [3; 16], &[], &Config::default()).unwrap();

            match write_table(&mut disk, &mut table) {
                Err(Error::Write { step, .. }) => assert_eq!(step, *expected),
                x => panic!("unexpected result: {:?}", x),
            }
            assert_eq!(disk.writes, i);
            assert_eq!(disk.notifications, 0);
        }
    }

    #[test]
    fn geometry_is_checked_before_writing() {
        let mut disk = SparseDisk::new(512, 2000);
        let mut table = build(1000, 512, [3; 16], &[], &Config::default()).unwrap();
        assert!(matches!(
            write_table(&mut disk, &mut table),
            Err(Error::GeometryMismatch {
                expected: 1999,
                actual: 999
            })
        ));

        let mut table = build(2000, 512, [3; 16], &[], &Config::default()).unwrap();
        table.entries.pop();
        assert!(matches!(
            write_table(&mut disk, &mut table),
            Err(Error::InvalidEntryCount {
                expected: 128,
                actual: 127
            })
        ));

        let mut table = build(2000, 512, [3; 16], &[], &Config::default()).unwrap();
        table.header.first_usable_lba = 20;
        assert!(matches!(
            write_table(&mut disk, &mut table),
            Err(Error::InconsistentLayout(_))
        ));

        let mut table = build(2000, 512, [3; 16], &[], &Config::default()).unwrap();
        table.header.partition_entry_lba = u64::max_value();
        assert!(matches!(
            write_table(&mut disk, &mut table),
            Err(Error::InconsistentLayout(_))
        ));

        let mut table = build(2000, 512, [3; 16], &[], &Config::default()).unwrap();
        table.header.last_usable_lba = u64::max_value();
        assert!(matches!(
            write_table(&mut disk, &mut table),
            Err(Error::InconsistentLayout(_))
        ));

        let mut table = build(2000, 512, [3; 16], &[], &Config::default()).unwrap();
        table.header.size_of_partition_entry = 64;
        assert!(matches!(
            write_table(&mut disk, &mut table),
            Err(Error::InconsistentLayout(_))
        ));

        assert_eq!(disk.writes, 0);
    }

    #[test]
    fn short_write_aborts() {
        let mut disk = SparseDisk::new(512, 1000);
        disk.short_writes = true;
        let mut table = build(1000, 512, [3; 16], &[], &Config::default()).unwrap();

        match write_table(&mut disk, &mut table) {
            Err(Error::Write { step, source }) => {
                assert_eq!(step, WriteStep::ProtectiveMbr);
                assert_eq!(source.kind(), io::ErrorKind::WriteZero);
            }
            x => panic!("unexpected result: {:?}", x),
        }
        assert_eq!(disk.notifications, 0);
    }
}
