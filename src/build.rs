use crate::codec::blocks_for;
use crate::config::Config;
use crate::entry::{GPTPartitionEntry, ENTRY_SIZE, LEGACY_BIOS_BOOTABLE, NAME_LEN};
use crate::guid;
use crate::header::{GPTHeader, HEADER_SIZE, PRIMARY_HEADER_LBA, REVISION, SIGNATURE};
use crate::{Error, Result};
use log::debug;

/// Blocks kept at the end of the disk for the backup header and its entry array.
pub const BACKUP_RESERVED_BLOCKS: u64 = 33;

/// The caller's description of one partition of a new table.
///
/// # Examples
///
/// Basic usage:
/// ```
/// let specs = vec![
///     gptcore::PartitionSpec::new("boot", 100_000).bootable(),
///     // size 0 on the last partition: take everything that is left
///     gptcore::PartitionSpec::new("rootfs", 0)
///         .with_type(gptcore::guid::LINUX_FILESYSTEM),
/// ];
///
/// let table = gptcore::build(2_000_000, 512, [0xff; 16], &specs, &Default::default())
///     .expect("could not build table");
/// assert_eq!(table.entries[1].ending_lba, table.header.last_usable_lba);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    /// Name of the partition (at most 36 UTF-16 code units).
    pub name: String,
    /// Size in blocks. 0 on the last partition means "up to the last usable block".
    pub size: u64,
    /// First block of the partition. 0 means "right after the previous partition".
    pub start: u64,
    /// Partition type. Defaults to the basic data type.
    pub type_guid: Option<[u8; 16]>,
    /// Set the legacy BIOS bootable attribute.
    pub bootable: bool,
    /// Unique GUID of the partition. A random one is generated if not provided.
    pub unique_guid: Option<[u8; 16]>,
}

impl PartitionSpec {
    /// A packed, non-bootable data partition of `size` blocks.
    pub fn new<S: Into<String>>(name: S, size: u64) -> PartitionSpec {
        PartitionSpec {
            name: name.into(),
            size,
            start: 0,
            type_guid: None,
            bootable: false,
            unique_guid: None,
        }
    }

    /// Place the partition at `start` instead of packing it.
    pub fn at(mut self, start: u64) -> PartitionSpec {
        self.start = start;
        self
    }

    /// Set the partition type.
    pub fn with_type(mut self, type_guid: [u8; 16]) -> PartitionSpec {
        self.type_guid = Some(type_guid);
        self
    }

    /// Set the unique GUID of the partition.
    pub fn with_guid(mut self, unique_guid: [u8; 16]) -> PartitionSpec {
        self.unique_guid = Some(unique_guid);
        self
    }

    /// Mark the partition as bootable.
    pub fn bootable(mut self) -> PartitionSpec {
        self.bootable = true;
        self
    }
}

/// A header and its partition entry array (including the unused slots).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    /// The primary header.
    pub header: GPTHeader,
    /// All the slots of the partition entry array.
    pub entries: Vec<GPTPartitionEntry>,
}

impl PartitionTable {
    /// Iterate over the used entries with their 1-based number.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &GPTPartitionEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, x)| x.is_used())
            .map(|(i, x)| (i as u32 + 1, x))
    }
}

struct Placed<'a> {
    name: &'a str,
    start: u64,
    end: u64,
}

/// Turn an ordered list of partition specifications into a fresh table for a device of
/// `block_count` blocks of `block_size` bytes.
///
/// Both checksums of the header are left at zero: they are computed by
/// [`write_table`](crate::write_table) once the entries are final.
///
/// # Errors
///
/// Nothing is returned if a partition overlaps the primary header, the primary entry array or
/// another partition (`Overlap`), doesn't fit before the last usable block (`TooLarge`) or if the
/// disk cannot hold the two copies of the table at all.
pub fn build(
    block_count: u64,
    block_size: u32,
    disk_guid: [u8; 16],
    specs: &[PartitionSpec],
    config: &Config,
) -> Result<PartitionTable> {
    let number_of_partition_entries = config.number_of_partition_entries;
    if specs.len() > number_of_partition_entries as usize {
        return Err(Error::TooManyPartitions {
            count: specs.len(),
            max: number_of_partition_entries,
        });
    }

    let partition_entry_lba = config.primary_entry_array_lba();
    let entry_blocks = blocks_for(
        u64::from(number_of_partition_entries) * ENTRY_SIZE as u64,
        block_size,
    );
    let first_usable_lba = partition_entry_lba
        .checked_add(entry_blocks)
        .ok_or_else(|| {
            Error::InconsistentLayout(format!(
                "primary partition entry array at LBA {} is out of range",
                partition_entry_lba
            ))
        })?;
    let last_usable_lba = block_count
        .checked_sub(BACKUP_RESERVED_BLOCKS + 1)
        .filter(|x| *x >= first_usable_lba)
        .ok_or(Error::DiskTooSmall(block_count))?;
    let backup_header_lba = block_count - 1;
    if last_usable_lba + 1 + entry_blocks > backup_header_lba {
        return Err(Error::InconsistentLayout(format!(
            "backup partition entry array ({} blocks) doesn't fit between the last usable LBA \
            {} and the backup header at LBA {}",
            entry_blocks, last_usable_lba, backup_header_lba
        )));
    }

    let mut placed: Vec<Placed> = Vec::with_capacity(specs.len());
    let mut cursor = first_usable_lba;
    for (i, spec) in specs.iter().enumerate() {
        let name = spec.name.as_str();
        if name.encode_utf16().count() > NAME_LEN {
            return Err(Error::NameTooLong(spec.name.clone()));
        }

        let start = if spec.start > 0 { spec.start } else { cursor };
        let end = if spec.size == 0 {
            if i + 1 < specs.len() {
                return Err(Error::ZeroSize(spec.name.clone()));
            }
            last_usable_lba
        } else {
            start.checked_add(spec.size - 1).ok_or_else(|| Error::TooLarge {
                partition: spec.name.clone(),
                ending_lba: u64::max_value(),
                last_usable_lba,
            })?
        };

        if start <= PRIMARY_HEADER_LBA {
            return Err(Error::Overlap {
                partition: spec.name.clone(),
                with: "primary GPT header".to_string(),
            });
        }
        if start < first_usable_lba {
            return Err(Error::Overlap {
                partition: spec.name.clone(),
                with: "primary partition entry array".to_string(),
            });
        }
        if end > last_usable_lba || end < start {
            return Err(Error::TooLarge {
                partition: spec.name.clone(),
                ending_lba: end,
                last_usable_lba,
            });
        }
        if let Some(other) = placed.iter().find(|x| start <= x.end && x.start <= end) {
            return Err(Error::Overlap {
                partition: spec.name.clone(),
                with: other.name.to_string(),
            });
        }

        debug!("partition {} ({}): blocks {}-{}", i + 1, name, start, end);
        placed.push(Placed { name, start, end });
        cursor = end + 1;
    }

    let mut entries: Vec<GPTPartitionEntry> =
        Vec::with_capacity(number_of_partition_entries as usize);
    for (spec, placed) in specs.iter().zip(placed.iter()) {
        let unique_partition_guid = spec.unique_guid.unwrap_or_else(guid::generate_random);
        if entries
            .iter()
            .any(|x| x.unique_partition_guid == unique_partition_guid)
        {
            return Err(Error::ConflictPartitionGUID(spec.name.clone()));
        }

        entries.push(GPTPartitionEntry {
            partition_type_guid: spec
                .type_guid
                .filter(|x| *x != guid::UNUSED)
                .unwrap_or(guid::BASIC_DATA_PARTITION),
            unique_partition_guid,
            starting_lba: placed.start,
            ending_lba: placed.end,
            attribute_bits: if spec.bootable { LEGACY_BIOS_BOOTABLE } else { 0 },
            partition_name: spec.name.as_str().into(),
        });
    }
    entries.resize(number_of_partition_entries as usize, GPTPartitionEntry::empty());

    let header = GPTHeader {
        signature: SIGNATURE,
        revision: REVISION,
        header_size: HEADER_SIZE as u32,
        crc32_checksum: 0,
        reserved: [0; 4],
        my_lba: PRIMARY_HEADER_LBA,
        alternate_lba: backup_header_lba,
        first_usable_lba,
        last_usable_lba,
        disk_guid,
        partition_entry_lba,
        number_of_partition_entries,
        size_of_partition_entry: ENTRY_SIZE as u32,
        partition_entry_array_crc32: 0,
        extra_bytes: Vec::new(),
    };

    Ok(PartitionTable { header, entries })
}

#[cfg(test)]
mod test {
    use super::*;

    fn build_default(block_count: u64, ss: u32, specs: &[PartitionSpec]) -> Result<PartitionTable> {
        build(block_count, ss, [1; 16], specs, &Config::default())
    }

    #[test]
    fn entry_array_out_of_range() {
        let config = Config {
            entry_array_lba: u64::max_value(),
            ..Default::default()
        };
        assert!(matches!(
            build(1000, 512, [1; 16], &[], &config),
            Err(Error::InconsistentLayout(_))
        ));

        let config = Config {
            entry_array_lba: u64::max_value() - 40,
            ..Default::default()
        };
        assert!(matches!(
            build(1000, 512, [1; 16], &[], &config),
            Err(Error::DiskTooSmall(1000))
        ));
    }

    #[test]
    fn fresh_disk_layout() {
        let specs = vec![
            PartitionSpec::new("boot", 100_000),
            PartitionSpec::new("rootfs", 0),
        ];
        let table = build_default(2_000_000, 512, &specs).unwrap();

        assert_eq!(table.header.my_lba, 1);
        assert_eq!(table.header.alternate_lba, 1_999_999);
        assert_eq!(table.header.partition_entry_lba, 2);
        assert_eq!(table.header.first_usable_lba, 34);
        assert_eq!(table.header.last_usable_lba, 1_999_966);
        assert_eq!(table.header.disk_guid, [1; 16]);
        assert_eq!(table.header.crc32_checksum, 0);
        assert_eq!(table.header.partition_entry_array_crc32, 0);
        assert_eq!(table.entries.len(), 128);

        let boot = &table.entries[0];
        assert_eq!(boot.partition_name.as_str(), "boot");
        assert_eq!((boot.starting_lba, boot.ending_lba), (34, 100_033));
        assert_eq!(boot.partition_type_guid, guid::BASIC_DATA_PARTITION);
        assert!(!boot.is_bootable());

        let rootfs = &table.entries[1];
        assert_eq!((rootfs.starting_lba, rootfs.ending_lba), (100_034, 1_999_966));
        assert_ne!(rootfs.unique_partition_guid, boot.unique_partition_guid);

        assert!(table.entries[2..].iter().all(|x| x.is_unused()));
        assert_eq!(table.iter().count(), 2);
    }

    #[test]
    fn layout_depends_on_block_size() {
        fn test(ss: u32, first_usable_lba: u64) {
            let table = build_default(1000, ss, &[PartitionSpec::new("data", 0)]).unwrap();
            assert_eq!(table.header.first_usable_lba, first_usable_lba);
            assert_eq!(table.header.last_usable_lba, 966);
            assert_eq!(table.entries[0].starting_lba, first_usable_lba);
            assert_eq!(table.entries[0].ending_lba, 966);
        }

        test(512, 34);
        test(4096, 6);
    }

    #[test]
    fn configured_entry_array() {
        let config = Config {
            entry_array_lba: 2048,
            number_of_partition_entries: 56,
        };
        let table = build(10_000, 512, [0; 16], &[PartitionSpec::new("a", 8)], &config).unwrap();

        assert_eq!(table.header.partition_entry_lba, 2048);
        assert_eq!(table.header.first_usable_lba, 2048 + 14);
        assert_eq!(table.header.number_of_partition_entries, 56);
        assert_eq!(table.entries.len(), 56);
        assert_eq!(table.entries[0].starting_lba, 2062);
    }

    #[test]
    fn open_ended_last_partition() {
        let specs = vec![
            PartitionSpec::new("a", 10),
            PartitionSpec::new("b", 20).at(100),
            PartitionSpec::new("c", 0),
        ];
        let table = build_default(1000, 512, &specs).unwrap();

        assert_eq!((table.entries[0].starting_lba, table.entries[0].ending_lba), (34, 43));
        assert_eq!((table.entries[1].starting_lba, table.entries[1].ending_lba), (100, 119));
        assert_eq!(table.entries[2].starting_lba, 120);
        assert_eq!(table.entries[2].ending_lba, table.header.last_usable_lba);
    }

    #[test]
    fn overlap_is_rejected() {
        let specs = vec![
            PartitionSpec::new("a", 50).at(100),
            PartitionSpec::new("b", 10).at(120),
        ];
        match build_default(1000, 512, &specs) {
            Err(Error::Overlap { partition, with }) => {
                assert_eq!(partition, "b");
                assert_eq!(with, "a");
            }
            x => panic!("unexpected result: {:?}", x),
        }

        // packed after an explicit partition placed earlier on the disk
        let specs = vec![
            PartitionSpec::new("a", 10).at(40),
            PartitionSpec::new("b", 5).at(34),
            PartitionSpec::new("c", 5),
        ];
        assert!(matches!(
            build_default(1000, 512, &specs),
            Err(Error::Overlap { ref partition, .. }) if partition == "c"
        ));

        assert!(matches!(
            build_default(1000, 512, &[PartitionSpec::new("a", 10).at(1)]),
            Err(Error::Overlap { ref with, .. }) if with == "primary GPT header"
        ));
        assert!(matches!(
            build_default(1000, 512, &[PartitionSpec::new("a", 10).at(33)]),
            Err(Error::Overlap { ref with, .. }) if with == "primary partition entry array"
        ));
    }

    #[test]
    fn too_large() {
        assert!(matches!(
            build_default(1000, 512, &[PartitionSpec::new("a", 934)]),
            Err(Error::TooLarge {
                ending_lba: 967,
                last_usable_lba: 966,
                ..
            })
        ));
        assert!(build_default(1000, 512, &[PartitionSpec::new("a", 933)]).is_ok());
        assert!(matches!(
            build_default(1000, 512, &[PartitionSpec::new("a", 0).at(967)]),
            Err(Error::TooLarge { .. })
        ));
        assert!(matches!(
            build_default(1000, 512, &[PartitionSpec::new("a", u64::max_value()).at(40)]),
            Err(Error::TooLarge { .. })
        ));
    }

    #[test]
    fn zero_size_must_be_last() {
        let specs = vec![PartitionSpec::new("a", 0), PartitionSpec::new("b", 10)];
        assert!(matches!(
            build_default(1000, 512, &specs),
            Err(Error::ZeroSize(ref name)) if name == "a"
        ));
    }

    #[test]
    fn entry_fields() {
        let specs = vec![
            PartitionSpec::new("esp", 100)
                .with_type(guid::EFI_SYSTEM_PARTITION)
                .with_guid([9; 16])
                .bootable(),
            PartitionSpec::new("data", 10).with_type(guid::UNUSED),
        ];
        let table = build_default(1000, 512, &specs).unwrap();

        assert_eq!(table.entries[0].partition_type_guid, guid::EFI_SYSTEM_PARTITION);
        assert_eq!(table.entries[0].unique_partition_guid, [9; 16]);
        assert_eq!(table.entries[0].attribute_bits, LEGACY_BIOS_BOOTABLE);
        assert_eq!(table.entries[1].partition_type_guid, guid::BASIC_DATA_PARTITION);
        assert_eq!(table.entries[1].attribute_bits, 0);
    }

    #[test]
    fn input_rejections() {
        let specs = vec![
            PartitionSpec::new("a", 10).with_guid([9; 16]),
            PartitionSpec::new("b", 10).with_guid([9; 16]),
        ];
        assert!(matches!(
            build_default(1000, 512, &specs),
            Err(Error::ConflictPartitionGUID(ref name)) if name == "b"
        ));

        let long: String = std::iter::repeat('x').take(37).collect();
        assert!(matches!(
            build_default(1000, 512, &[PartitionSpec::new(long, 10)]),
            Err(Error::NameTooLong(_))
        ));

        let specs: Vec<_> = (0..129).map(|i| PartitionSpec::new(format!("p{}", i), 1)).collect();
        assert!(matches!(
            build_default(100_000, 512, &specs),
            Err(Error::TooManyPartitions { count: 129, max: 128 })
        ));
    }

    #[test]
    fn disk_too_small() {
        assert!(matches!(
            build_default(67, 512, &[]),
            Err(Error::DiskTooSmall(67))
        ));
        assert!(build_default(68, 512, &[]).is_ok());
        assert!(matches!(
            build_default(10, 512, &[]),
            Err(Error::DiskTooSmall(10))
        ));

        let config = Config {
            number_of_partition_entries: 256,
            ..Default::default()
        };
        assert!(matches!(
            build(10_000, 512, [0; 16], &[], &config),
            Err(Error::InconsistentLayout(_))
        ));
    }
}
