mod attribute_bits;
mod display_bytes;
mod error;
mod layout;
mod opt;
mod print;
mod table;
mod types;

use self::error::*;
use self::layout::parse_layout;
use self::opt::*;
use self::print::print;
use clap::Parser;
use gptcore::{guid, BlockDevice, Config, RepairOutcome};
use log::debug;

macro_rules! main_unwrap {
    ($e:expr) => {{
        match $e {
            Ok(x) => x,
            Err(err) => {
                eprintln!("{}", err);
                std::process::exit(1);
            }
        }
    }};
}

#[cfg(target_os = "linux")]
fn open_disk(opt: &Opt) -> Result<impl BlockDevice> {
    Ok(gptcore::linux::open_block_device(
        &opt.device,
        opt.sector_size,
    )?)
}

#[cfg(not(target_os = "linux"))]
fn open_disk(opt: &Opt) -> Result<impl BlockDevice> {
    let f = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(&opt.device)?;

    Ok(gptcore::DiskImage::new(f, opt.sector_size.unwrap_or(512))?)
}

fn main() {
    let opt = Opt::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config {
        entry_array_lba: opt.entries_lba,
        number_of_partition_entries: opt.entries,
    };
    let mut disk = main_unwrap!(open_disk(&opt));
    debug!(
        "{}: {} blocks of {} bytes",
        opt.device.display(),
        disk.block_count(),
        disk.block_size()
    );

    main_unwrap!(execute(&opt, &config, &mut disk));
}

fn execute<D: BlockDevice>(opt: &Opt, config: &Config, disk: &mut D) -> Result<()> {
    match &opt.command {
        Command::List { columns } => {
            let list = gptcore::read_table(disk)?;
            let len = disk.block_count() * u64::from(disk.block_size());
            print(&opt.device, &list, columns, len)?;
        }
        Command::Guid => {
            let list = gptcore::read_table(disk)?;
            println!("{}", guid::format(&list.disk_guid));
        }
        Command::Repair => match gptcore::repair_table(disk, config) {
            RepairOutcome::NoneNeeded => println!("Both copies of the GPT are valid."),
            RepairOutcome::RepairedPrimary => println!("Primary GPT restored from the backup GPT."),
            RepairOutcome::RepairedBackup => println!("Backup GPT restored from the primary GPT."),
            RepairOutcome::Failed(err) => return Err(err.into()),
        },
        Command::Create { layout } => {
            let layout = parse_layout(layout, disk.block_size())?;
            let disk_guid = layout.disk_guid.unwrap_or_else(guid::generate_random);

            if gptcore::locate_valid(disk).is_ok() {
                println!("WARNING: replacing the GPT that exists on the device");
            }
            gptcore::create_table(disk, disk_guid, &layout.partitions, config)?;
            println!("GPT created.");
        }
        Command::Verify { layout } => {
            let layout = parse_layout(layout, disk.block_size())?;
            gptcore::verify_table(disk, &layout.partitions)?;
            if let Some(disk_guid) = layout.disk_guid {
                let list = gptcore::read_table(disk)?;
                if list.disk_guid != disk_guid {
                    return Err(Error::new(&format!(
                        "disk GUID mismatch (expected {}, found {})",
                        guid::format(&disk_guid),
                        guid::format(&list.disk_guid)
                    )));
                }
            }
            println!("The partition table matches the layout.");
        }
        Command::Rename { number, name } => {
            gptcore::rename_partition(disk, *number, name, config)?;
            println!("Partition {} renamed to {:?}.", number, name);
        }
        Command::Swap { name1, name2 } => {
            gptcore::swap_partitions(disk, name1, name2, config)?;
            println!("Partitions {:?} and {:?} swapped.", name1, name2);
        }
    }

    Ok(())
}
