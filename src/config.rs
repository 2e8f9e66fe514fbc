use crate::header::MIN_ENTRY_ARRAY_LBA;
use serde::{Deserialize, Serialize};

/// Number of partition entries in a freshly built table.
pub const DEFAULT_NUMBER_OF_PARTITION_ENTRIES: u32 = 128;

/// Layout settings of the engine.
///
/// # Examples
///
/// Basic usage:
/// ```
/// let config = gptcore::Config {
///     entry_array_lba: 0,
///     ..Default::default()
/// };
///
/// // the primary entry array can never start before LBA 2
/// assert_eq!(config.primary_entry_array_lba(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// LBA where the primary partition entry array starts. Values below 2 are raised to 2.
    pub entry_array_lba: u64,
    /// Number of entries of the partition entry array of a new table.
    pub number_of_partition_entries: u32,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            entry_array_lba: MIN_ENTRY_ARRAY_LBA,
            number_of_partition_entries: DEFAULT_NUMBER_OF_PARTITION_ENTRIES,
        }
    }
}

impl Config {
    /// LBA of the primary partition entry array used when building a table or restoring the
    /// primary copy.
    pub fn primary_entry_array_lba(&self) -> u64 {
        self.entry_array_lba.max(MIN_ENTRY_ARRAY_LBA)
    }
}
