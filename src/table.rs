//! The operations a front end calls: read, create, rename and swap.

use crate::build::{build, PartitionSpec, PartitionTable};
use crate::config::Config;
use crate::device::{read_blocks, BlockDevice};
use crate::entry::{GPTPartitionEntry, NAME_LEN};
use crate::locate::{locate_valid, CopyLocation, GptCopy};
use crate::protective_mbr::LegacyBootSector;
use crate::write::write_table;
use crate::{Error, Result};
use log::{info, warn};

/// A used partition of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    /// 1-based number of the partition (its slot in the entry array).
    pub number: u32,
    /// The partition name.
    pub name: String,
    /// The partition type GUID (on-disk byte order).
    pub type_guid: [u8; 16],
    /// The unique partition GUID (on-disk byte order).
    pub unique_guid: [u8; 16],
    /// First block of the partition.
    pub starting_lba: u64,
    /// Last block of the partition (inclusive).
    pub ending_lba: u64,
    /// The attribute bits.
    pub attribute_bits: u64,
    /// Legacy BIOS bootable (bit 2) or type-specific bootable (bit 60).
    pub bootable: bool,
}

impl PartitionInfo {
    fn new(number: u32, entry: &GPTPartitionEntry) -> PartitionInfo {
        PartitionInfo {
            number,
            name: entry.partition_name.as_str().to_string(),
            type_guid: entry.partition_type_guid,
            unique_guid: entry.unique_partition_guid,
            starting_lba: entry.starting_lba,
            ending_lba: entry.ending_lba,
            attribute_bits: entry.attribute_bits,
            bootable: entry.is_bootable(),
        }
    }

    /// Number of blocks of the partition (0 for a partition ending before it starts).
    pub fn size(&self) -> u64 {
        (self.ending_lba + 1).saturating_sub(self.starting_lba)
    }
}

/// The partitions of the authoritative copy of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionList {
    /// The copy the list was read from.
    pub source: CopyLocation,
    /// The disk GUID (on-disk byte order).
    pub disk_guid: [u8; 16],
    /// Size (in bytes) of a block.
    pub block_size: u32,
    /// First usable block of the disk.
    pub first_usable_lba: u64,
    /// Last usable block of the disk.
    pub last_usable_lba: u64,
    /// The used partitions, in entry array order.
    pub partitions: Vec<PartitionInfo>,
}

impl PartitionList {
    /// Find a partition by name.
    pub fn find(&self, name: &str) -> Option<&PartitionInfo> {
        self.partitions.iter().find(|x| x.name == name)
    }
}

/// Read the partitions of the device, falling back to the backup copy silently.
///
/// A warning is logged if LBA 0 doesn't hold a protective MBR but the table is read anyway.
///
/// # Examples
///
/// Basic usage:
/// ```
/// let data = vec![0; 1000 * 512];
/// let mut disk = gptcore::DiskImage::new(std::io::Cursor::new(data), 512).unwrap();
/// let specs = vec![
///     gptcore::PartitionSpec::new("boot", 100).bootable(),
///     gptcore::PartitionSpec::new("rootfs", 0),
/// ];
/// gptcore::create_table(&mut disk, [0xff; 16], &specs, &Default::default())
///     .expect("could not create partition table");
///
/// let list = gptcore::read_table(&mut disk).expect("could not read partition table");
/// for p in list.partitions.iter() {
///     println!("Partition #{}: name = {}, size = {} bytes, starting lba = {}",
///         p.number,
///         p.name,
///         p.size() * u64::from(list.block_size),
///         p.starting_lba);
/// }
/// assert_eq!(list.partitions.len(), 2);
/// assert!(list.partitions[0].bootable);
/// ```
pub fn read_table<D: BlockDevice + ?Sized>(device: &mut D) -> Result<PartitionList> {
    let block = read_blocks(device, 0, 1)?;
    match LegacyBootSector::decode(&block) {
        Ok(mbr) if mbr.is_protective() => {}
        _ => warn!("no protective MBR found at LBA 0"),
    }

    let copy = locate_valid(device)?;
    let partitions = copy
        .entries
        .iter()
        .enumerate()
        .filter(|(_, x)| x.is_used())
        .map(|(i, x)| PartitionInfo::new(i as u32 + 1, x))
        .collect();

    Ok(PartitionList {
        source: copy.location,
        disk_guid: copy.header.disk_guid,
        block_size: device.block_size(),
        first_usable_lba: copy.header.first_usable_lba,
        last_usable_lba: copy.header.last_usable_lba,
        partitions,
    })
}

/// Build a new table from `specs` and write it to the device, replacing whatever was there.
///
/// Nothing is written if the specifications are rejected.
pub fn create_table<D: BlockDevice + ?Sized>(
    device: &mut D,
    disk_guid: [u8; 16],
    specs: &[PartitionSpec],
    config: &Config,
) -> Result<PartitionTable> {
    let mut table = build(
        device.block_count(),
        device.block_size(),
        disk_guid,
        specs,
        config,
    )?;
    write_table(device, &mut table)?;
    info!("created a partition table with {} partitions", specs.len());

    Ok(table)
}

/// Turn a validated copy back into a primary table ready to be written.
fn into_table(copy: GptCopy, config: &Config) -> PartitionTable {
    let header = match copy.location {
        CopyLocation::Primary => copy.header,
        CopyLocation::Backup => copy.header.to_primary(config.primary_entry_array_lba()),
    };

    PartitionTable {
        header,
        entries: copy.entries,
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.encode_utf16().count() > NAME_LEN {
        return Err(Error::NameTooLong(name.to_string()));
    }

    Ok(())
}

/// Change the name of partition `number` (1-based) and rewrite both copies of the table.
///
/// # Examples
///
/// Basic usage:
/// ```
/// let data = vec![0; 1000 * 512];
/// let mut disk = gptcore::DiskImage::new(std::io::Cursor::new(data), 512).unwrap();
/// let config = gptcore::Config::default();
/// gptcore::create_table(&mut disk, [0xff; 16], &[gptcore::PartitionSpec::new("a", 0)], &config)
///     .expect("could not create partition table");
///
/// gptcore::rename_partition(&mut disk, 1, "data", &config).expect("could not rename");
/// let list = gptcore::read_table(&mut disk).unwrap();
/// assert_eq!(list.partitions[0].name, "data");
/// ```
pub fn rename_partition<D: BlockDevice + ?Sized>(
    device: &mut D,
    number: u32,
    name: &str,
    config: &Config,
) -> Result<()> {
    check_name(name)?;
    let mut table = into_table(locate_valid(device)?, config);

    if number == 0 || number > table.header.number_of_partition_entries {
        return Err(Error::InvalidPartitionNumber(number));
    }
    let entry = &mut table.entries[number as usize - 1];
    if entry.is_unused() {
        return Err(Error::PartitionNotFound(number.to_string()));
    }

    info!(
        "renaming partition {} from {:?} to {:?}",
        number,
        entry.partition_name.as_str(),
        name
    );
    entry.partition_name = name.into();
    write_table(device, &mut table)?;

    Ok(())
}

/// Exchange the names of two partitions and rewrite both copies of the table.
pub fn swap_partitions<D: BlockDevice + ?Sized>(
    device: &mut D,
    name1: &str,
    name2: &str,
    config: &Config,
) -> Result<()> {
    let mut table = into_table(locate_valid(device)?, config);

    let find = |table: &PartitionTable, name: &str| {
        table
            .iter()
            .find(|(_, x)| x.partition_name.as_str() == name)
            .map(|(i, _)| i as usize - 1)
            .ok_or_else(|| Error::PartitionNotFound(name.to_string()))
    };
    let i = find(&table, name1)?;
    let j = find(&table, name2)?;

    info!("swapping the names of partitions {} and {}", i + 1, j + 1);
    let name = table.entries[i].partition_name.clone();
    table.entries[i].partition_name = table.entries[j].partition_name.clone();
    table.entries[j].partition_name = name;
    write_table(device, &mut table)?;

    Ok(())
}
