//! Finding the authoritative copy of the table and restoring a damaged copy from the other one.

use crate::codec::{blocks_for, pad_to_blocks, DecodeError};
use crate::config::Config;
use crate::device::{read_blocks, write_blocks, BlockDevice};
use crate::entry::{decode_entries, GPTPartitionEntry};
use crate::header::{decode_header, encode_header, GPTHeader, PRIMARY_HEADER_LBA};
use crate::validate::{validate_entries, validate_header, ValidationError, Validity};
use crate::{Error, Result};
use log::{debug, info, warn};
use std::fmt;

/// Smallest device that can hold a protective MBR and both headers.
const MIN_BLOCK_COUNT: u64 = 3;

/// One of the two redundant locations of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyLocation {
    /// Header at LBA 1, entries right after.
    Primary,
    /// Header at the last LBA, entries right before.
    Backup,
}

impl CopyLocation {
    /// LBA of the header of this copy on a device of `block_count` blocks.
    pub fn header_lba(self, block_count: u64) -> u64 {
        match self {
            CopyLocation::Primary => PRIMARY_HEADER_LBA,
            CopyLocation::Backup => block_count - 1,
        }
    }
}

impl fmt::Display for CopyLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyLocation::Primary => write!(f, "primary"),
            CopyLocation::Backup => write!(f, "backup"),
        }
    }
}

/// The reason a copy of the table cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum CopyFault {
    /// The header block could not be decoded.
    #[error("malformed header: {0}")]
    Decode(DecodeError),
    /// The header has been suppressed on purpose ("IGNOREME").
    #[error("header is marked to be ignored")]
    Ignored,
    /// The header failed validation.
    #[error("invalid header: {0}")]
    Header(ValidationError),
    /// The header describes an entry array that doesn't fit on the device.
    #[error("partition entry array at LBA {lba} ({blocks} blocks) is out of range")]
    EntriesOutOfRange {
        /// First LBA of the array.
        lba: u64,
        /// Number of blocks of the array.
        blocks: u64,
    },
    /// The partition entry array failed validation.
    #[error("invalid partition entry array: {0}")]
    Entries(ValidationError),
    /// The partition entry array could not be decoded.
    #[error("malformed partition entry array: {0}")]
    EntriesDecode(DecodeError),
    /// The primary header doesn't point to the last LBA for its backup.
    #[error("misplaced backup header (expected at LBA {expected}, header says {actual})")]
    MisplacedBackup {
        /// Last LBA of the device.
        expected: u64,
        /// `alternate_lba` of the primary header.
        actual: u64,
    },
}

/// A validated copy of the table as read from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GptCopy {
    /// Where the copy was read from.
    pub location: CopyLocation,
    /// The validated header.
    pub header: GPTHeader,
    /// The decoded partition entries (used or not).
    pub entries: Vec<GPTPartitionEntry>,
    entry_array: Vec<u8>,
}

impl GptCopy {
    /// The raw partition entry array exactly as it is covered by the header's checksum.
    pub fn entry_array(&self) -> &[u8] {
        &self.entry_array
    }
}

fn invalid(location: CopyLocation, fault: CopyFault) -> Error {
    Error::InvalidCopy(location, fault)
}

fn check_block_count(block_count: u64) -> Result<()> {
    if block_count < MIN_BLOCK_COUNT {
        return Err(Error::DiskTooSmall(block_count));
    }

    Ok(())
}

/// Read and validate one copy of the table.
///
/// I/O errors are returned as they are. Any other problem with the copy is reported as
/// [`Error::InvalidCopy`] naming the check that failed.
pub fn read_copy<D: BlockDevice + ?Sized>(device: &mut D, location: CopyLocation) -> Result<GptCopy> {
    let block_count = device.block_count();
    check_block_count(block_count)?;
    let lba = location.header_lba(block_count);

    let block = read_blocks(device, lba, 1)?;
    let header = decode_header(&block).map_err(|err| invalid(location, CopyFault::Decode(err)))?;

    match validate_header(&header, lba, block_count) {
        Validity::Valid => {}
        Validity::Ignored => return Err(invalid(location, CopyFault::Ignored)),
        Validity::Invalid(err) => return Err(invalid(location, CopyFault::Header(err))),
    }

    if location == CopyLocation::Primary && header.alternate_lba != block_count - 1 {
        return Err(invalid(
            location,
            CopyFault::MisplacedBackup {
                expected: block_count - 1,
                actual: header.alternate_lba,
            },
        ));
    }

    let len = header.partition_entry_array_len();
    let blocks = blocks_for(len, device.block_size());
    let fits = header
        .partition_entry_lba
        .checked_add(blocks)
        .map_or(false, |end| end <= block_count)
        && header.partition_entry_lba > PRIMARY_HEADER_LBA
        && blocks <= u64::from(u32::max_value());
    if !fits {
        return Err(invalid(
            location,
            CopyFault::EntriesOutOfRange {
                lba: header.partition_entry_lba,
                blocks,
            },
        ));
    }

    let mut entry_array = read_blocks(device, header.partition_entry_lba, blocks as u32)?;
    entry_array.truncate(len as usize);
    validate_entries(&header, &entry_array).map_err(|err| invalid(location, CopyFault::Entries(err)))?;

    let entries = decode_entries(
        &entry_array,
        header.number_of_partition_entries,
        header.size_of_partition_entry,
    )
    .map_err(|err| invalid(location, CopyFault::EntriesDecode(err)))?;

    Ok(GptCopy {
        location,
        header,
        entries,
        entry_array,
    })
}

/// Split the outcome of `read_copy` into "usable or not" and real errors.
fn classify(result: Result<GptCopy>) -> Result<std::result::Result<GptCopy, CopyFault>> {
    match result {
        Ok(copy) => Ok(Ok(copy)),
        Err(Error::InvalidCopy(_, fault)) => Ok(Err(fault)),
        Err(err) => Err(err),
    }
}

/// Find the authoritative copy of the table: the primary copy if it is valid, the backup copy
/// otherwise.
///
/// Falling back to the backup copy is not an error and is only logged at the debug level.
///
/// # Examples
///
/// Basic usage:
/// ```
/// let data = vec![0; 100 * 512];
/// let mut disk = gptcore::DiskImage::new(std::io::Cursor::new(data), 512).unwrap();
/// gptcore::create_table(&mut disk, [0xff; 16], &[], &Default::default())
///     .expect("could not create partition table");
///
/// let copy = gptcore::locate_valid(&mut disk).expect("could not find GPT");
/// assert_eq!(copy.location, gptcore::CopyLocation::Primary);
/// ```
pub fn locate_valid<D: BlockDevice + ?Sized>(device: &mut D) -> Result<GptCopy> {
    let primary = match classify(read_copy(device, CopyLocation::Primary))? {
        Ok(copy) => return Ok(copy),
        Err(fault) => fault,
    };
    match primary {
        CopyFault::Ignored => debug!("primary GPT is marked to be ignored, using backup GPT"),
        ref fault => debug!("primary GPT is not usable ({}), using backup GPT", fault),
    }

    match classify(read_copy(device, CopyLocation::Backup))? {
        Ok(copy) => Ok(copy),
        Err(backup) => Err(Error::Unrecoverable { primary, backup }),
    }
}

/// What `repair_table` did.
#[derive(Debug)]
pub enum RepairOutcome {
    /// Both copies are valid (or one of them is intentionally ignored): nothing was written.
    NoneNeeded,
    /// The primary copy was rewritten from the backup copy.
    RepairedPrimary,
    /// The backup copy was rewritten from the primary copy.
    RepairedBackup,
    /// Nothing could be repaired. Both copies being invalid is reported as
    /// [`Error::Unrecoverable`], in which case nothing was written.
    Failed(Error),
}

impl RepairOutcome {
    /// Returns `true` unless the outcome is `Failed`.
    pub fn is_success(&self) -> bool {
        !matches!(self, RepairOutcome::Failed(_))
    }
}

/// Check both copies of the table and regenerate the damaged one from the other.
///
/// The header of the damaged copy is always derived from the surviving header and written along
/// with a copy of the surviving entry array, so both checksums agree once written. The primary
/// entry array is placed at [`Config::primary_entry_array_lba`]; the backup one right after the
/// last usable block.
///
/// # Examples
///
/// Basic usage:
/// ```
/// use gptcore::BlockDevice;
///
/// let data = vec![0; 100 * 512];
/// let mut disk = gptcore::DiskImage::new(std::io::Cursor::new(data), 512).unwrap();
/// let config = gptcore::Config::default();
/// gptcore::create_table(&mut disk, [0xff; 16], &[], &config)
///     .expect("could not create partition table");
///
/// // wipe the backup header
/// let last = disk.block_count() - 1;
/// disk.write(last, 1, &[0; 512]).unwrap();
///
/// assert!(matches!(
///     gptcore::repair_table(&mut disk, &config),
///     gptcore::RepairOutcome::RepairedBackup
/// ));
/// ```
pub fn repair_table<D: BlockDevice + ?Sized>(device: &mut D, config: &Config) -> RepairOutcome {
    match repair(device, config) {
        Ok(outcome) => outcome,
        Err(err) => RepairOutcome::Failed(err),
    }
}

fn repair<D: BlockDevice + ?Sized>(device: &mut D, config: &Config) -> Result<RepairOutcome> {
    let primary = classify(read_copy(device, CopyLocation::Primary))?;
    let backup = classify(read_copy(device, CopyLocation::Backup))?;

    match (primary, backup) {
        (Ok(_), Ok(_)) => Ok(RepairOutcome::NoneNeeded),
        (Err(CopyFault::Ignored), Ok(_)) | (Ok(_), Err(CopyFault::Ignored)) => {
            debug!("one GPT copy is marked to be ignored, leaving it untouched");
            Ok(RepairOutcome::NoneNeeded)
        }
        (Ok(primary), Err(fault)) => {
            warn!("backup GPT is invalid ({}), restoring it from the primary GPT", fault);
            restore_backup(device, &primary)?;
            info!("backup GPT restored");
            Ok(RepairOutcome::RepairedBackup)
        }
        (Err(fault), Ok(backup)) => {
            warn!("primary GPT is invalid ({}), restoring it from the backup GPT", fault);
            restore_primary(device, config, &backup)?;
            info!("primary GPT restored");
            Ok(RepairOutcome::RepairedPrimary)
        }
        (Err(primary), Err(backup)) => Err(Error::Unrecoverable { primary, backup }),
    }
}

/// Write the entry array then the header of a regenerated copy.
fn write_copy<D: BlockDevice + ?Sized>(
    device: &mut D,
    header: &GPTHeader,
    entry_array: &[u8],
) -> Result<()> {
    let block_size = device.block_size();
    write_blocks(
        device,
        header.partition_entry_lba,
        &pad_to_blocks(entry_array, block_size),
    )?;
    write_blocks(
        device,
        header.my_lba,
        &pad_to_blocks(&encode_header(header), block_size),
    )?;

    Ok(())
}

fn restore_backup<D: BlockDevice + ?Sized>(device: &mut D, primary: &GptCopy) -> Result<()> {
    let header = primary.header.to_backup();
    let blocks = blocks_for(header.partition_entry_array_len(), device.block_size());
    if header
        .partition_entry_lba
        .checked_add(blocks)
        .map_or(true, |end| end > header.my_lba)
    {
        return Err(Error::InconsistentLayout(format!(
            "backup partition entry array at LBA {} ({} blocks) runs into the backup header at \
            LBA {}",
            header.partition_entry_lba, blocks, header.my_lba
        )));
    }

    write_copy(device, &header, primary.entry_array())
}

fn restore_primary<D: BlockDevice + ?Sized>(
    device: &mut D,
    config: &Config,
    backup: &GptCopy,
) -> Result<()> {
    let header = backup.header.to_primary(config.primary_entry_array_lba());
    let blocks = blocks_for(header.partition_entry_array_len(), device.block_size());
    if header
        .partition_entry_lba
        .checked_add(blocks)
        .map_or(true, |end| end > header.first_usable_lba)
    {
        return Err(Error::InconsistentLayout(format!(
            "primary partition entry array at LBA {} ({} blocks) runs into the first usable LBA \
            {}",
            header.partition_entry_lba, blocks, header.first_usable_lba
        )));
    }

    write_copy(device, &header, backup.entry_array())
}
