use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
#[value(rename_all = "verbatim")]
pub enum Column {
    Device,
    Start,
    End,
    Sectors,
    Size,
    Type,
    GUID,
    Attributes,
    Name,
}

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Opt {
    /// device to open
    #[arg(value_name = "DEVICE")]
    pub device: PathBuf,

    /// sector size (obtained from the device if not provided)
    #[arg(short = 'b', long = "sector-size")]
    pub sector_size: Option<u32>,

    /// first LBA of the primary partition entry array
    #[arg(long = "entries-lba", default_value_t = 2)]
    pub entries_lba: u64,

    /// number of partition entries of a new table
    #[arg(long = "entries", default_value_t = 128)]
    pub entries: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// display partitions
    List {
        /// output columns
        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "Device,Start,End,Sectors,Size,Type,GUID,Attributes,Name",
            value_delimiter = ','
        )]
        columns: Vec<Column>,
    },
    /// display the disk GUID
    Guid,
    /// check both copies of the partition table and restore the damaged one
    Repair,
    /// write a new partition table
    Create {
        /// partitions, e.g. "name=boot,size=64M,bootable;name=rootfs,size=-"
        #[arg(short = 'l', long = "layout")]
        layout: String,
    },
    /// check that the partition table matches a layout
    Verify {
        /// partitions, e.g. "name=boot,size=64M;name=rootfs,size=-"
        #[arg(short = 'l', long = "layout")]
        layout: String,
    },
    /// rename a partition
    Rename {
        /// partition number (starting at 1)
        number: u32,
        /// new name
        name: String,
    },
    /// swap the names of two partitions
    Swap {
        /// name of the first partition
        name1: String,
        /// name of the second partition
        name2: String,
    },
}
