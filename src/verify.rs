use crate::build::PartitionSpec;
use crate::device::BlockDevice;
use crate::entry::GPTPartitionEntry;
use crate::locate::locate_valid;
use crate::{Error, Result};
use log::debug;
use std::fmt;

/// The field of a partition compared by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchField {
    /// The partition name.
    Name,
    /// The size (in blocks).
    Size,
    /// The first block.
    Start,
}

impl fmt::Display for MismatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchField::Name => write!(f, "name"),
            MismatchField::Size => write!(f, "size"),
            MismatchField::Start => write!(f, "start"),
        }
    }
}

/// Compare decoded partition entries with the specifications they were built from.
///
/// `specs[i]` is compared with the entry in slot `i`. More specifications than slots fails before
/// any field is compared; otherwise the first mismatch is returned.
pub fn verify_entries(entries: &[GPTPartitionEntry], specs: &[PartitionSpec]) -> Result<()> {
    if let Some(spec) = specs.get(entries.len()) {
        return Err(Error::MissingPartition {
            index: entries.len(),
            partition: spec.name.clone(),
        });
    }

    for (i, (spec, entry)) in specs.iter().zip(entries).enumerate() {

        let mismatch = |field, expected: String, actual: String| Error::Mismatch {
            partition: spec.name.clone(),
            field,
            expected,
            actual,
        };

        let name = entry.partition_name.as_str();
        if name != spec.name {
            return Err(mismatch(
                MismatchField::Name,
                spec.name.clone(),
                name.to_string(),
            ));
        }

        let open_ended = spec.size == 0 && i + 1 == specs.len();
        if !open_ended {
            // an entry ending before it starts can never match a size
            let size = entry.size().unwrap_or(0);
            if size != spec.size {
                return Err(mismatch(
                    MismatchField::Size,
                    spec.size.to_string(),
                    size.to_string(),
                ));
            }
        }

        if spec.start != 0 && spec.start != entry.starting_lba {
            return Err(mismatch(
                MismatchField::Start,
                spec.start.to_string(),
                entry.starting_lba.to_string(),
            ));
        }
    }

    Ok(())
}

/// Check that the table on the device matches `specs` (name, size and start of each partition).
///
/// # Examples
///
/// Basic usage:
/// ```
/// let data = vec![0; 1000 * 512];
/// let mut disk = gptcore::DiskImage::new(std::io::Cursor::new(data), 512).unwrap();
/// let specs = vec![
///     gptcore::PartitionSpec::new("boot", 100),
///     gptcore::PartitionSpec::new("rootfs", 0),
/// ];
/// gptcore::create_table(&mut disk, [0xff; 16], &specs, &Default::default())
///     .expect("could not create partition table");
///
/// assert!(gptcore::verify_table(&mut disk, &specs).is_ok());
/// assert!(gptcore::verify_table(&mut disk, &[gptcore::PartitionSpec::new("boot", 99)]).is_err());
/// ```
pub fn verify_table<D: BlockDevice + ?Sized>(device: &mut D, specs: &[PartitionSpec]) -> Result<()> {
    let copy = locate_valid(device)?;
    debug!(
        "verifying {} partitions against the {} GPT",
        specs.len(),
        copy.location
    );

    verify_entries(&copy.entries, specs)
}
