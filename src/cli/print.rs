use crate::attribute_bits::AttributeBits;
use crate::display_bytes::DisplayBytes;
use crate::error::*;
use crate::opt::Column;
use crate::table::Listing;
use crate::types::PartitionTypeGUID;
use gptcore::{guid, PartitionList};
use std::path::Path;

pub fn print(path: &Path, list: &PartitionList, columns: &[Column], len: u64) -> Result<()> {
    let ss = u64::from(list.block_size);
    let usable = list.last_usable_lba - list.first_usable_lba + 1;

    println!("Sector size: {} bytes", ss);
    println!("Disk size: {} ({} bytes)", DisplayBytes::new(len), len);
    println!(
        "Usable sectors: {}-{} ({} sectors)",
        list.first_usable_lba, list.last_usable_lba, usable,
    );
    println!(
        "Usable space: {} ({} bytes)",
        DisplayBytes::new(usable * ss),
        usable * ss,
    );
    println!("Disk identifier: {}", guid::format(&list.disk_guid));
    println!("Read from: {} GPT", list.source);
    println!();

    let mut listing = Listing::new(columns);
    for p in list.partitions.iter() {
        listing.push(|column| match column {
            Column::Device => format!("{}{}", path.display(), p.number),
            Column::Start => p.starting_lba.to_string(),
            Column::End => p.ending_lba.to_string(),
            Column::Sectors => p.size().to_string(),
            Column::Size => DisplayBytes::new(p.size() * ss).to_string(),
            Column::Type => p.type_guid.display_partition_type_guid(),
            Column::GUID => guid::format(&p.unique_guid),
            Column::Attributes => p.attribute_bits.display_attribute_bits(p.type_guid),
            Column::Name => p.name.clone(),
        });
    }
    print!("{}", listing);

    Ok(())
}
