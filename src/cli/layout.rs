//! Partition layouts written the way U-Boot's `gpt write` takes them:
//!
//! `uuid_disk=<guid>;name=<name>,size=<size>,start=<size>,type=<guid|alias>,uuid=<guid>,bootable;...`
//!
//! Sizes are in bytes with an optional binary suffix (`K`, `M`, `G`, `T`) and must be a multiple of
//! the block size. `size=-` makes the last partition fill the rest of the disk.

use crate::error::*;
use crate::types::parse_partition_type;
use gptcore::{guid, PartitionSpec};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Layout {
    pub disk_guid: Option<[u8; 16]>,
    pub partitions: Vec<PartitionSpec>,
}

fn parse_bytes(s: &str) -> Result<u64> {
    let (digits, shift) = match s.char_indices().last() {
        Some((i, 'K')) | Some((i, 'k')) => (&s[..i], 10),
        Some((i, 'M')) | Some((i, 'm')) => (&s[..i], 20),
        Some((i, 'G')) | Some((i, 'g')) => (&s[..i], 30),
        Some((i, 'T')) | Some((i, 't')) => (&s[..i], 40),
        _ => (s, 0),
    };

    let value: u64 = digits.parse()?;
    value
        .checked_mul(1 << shift)
        .ok_or_else(|| Error::new(&format!("size too large: {}", s)))
}

fn parse_blocks(key: &str, s: &str, block_size: u32) -> Result<u64> {
    let bytes = parse_bytes(s)?;
    if bytes % u64::from(block_size) != 0 {
        return Err(Error::new(&format!(
            "{}={} is not a multiple of the block size ({} bytes)",
            key, s, block_size
        )));
    }

    Ok(bytes / u64::from(block_size))
}

fn parse_partition(s: &str, block_size: u32) -> Result<PartitionSpec> {
    let mut name = None;
    let mut size = None;
    let mut spec = PartitionSpec::new("", 0);

    for field in s.split(',').map(str::trim).filter(|x| !x.is_empty()) {
        let (key, value) = match field.find('=') {
            Some(i) => (&field[..i], Some(&field[i + 1..])),
            None => (field, None),
        };

        match (key, value) {
            ("name", Some(x)) => name = Some(x.to_string()),
            ("size", Some("-")) => size = Some(0),
            ("size", Some(x)) => {
                let blocks = parse_blocks(key, x, block_size)?;
                if blocks == 0 {
                    return Err("size=0 is not allowed, use size=- for the last partition".into());
                }
                size = Some(blocks);
            }
            ("start", Some(x)) => spec.start = parse_blocks(key, x, block_size)?,
            ("type", Some(x)) => spec.type_guid = Some(parse_partition_type(x)?),
            ("uuid", Some(x)) => spec.unique_guid = Some(guid::parse(x)?),
            ("bootable", None) => spec.bootable = true,
            _ => return Err(Error::new(&format!("invalid field: {:?}", field))),
        }
    }

    spec.name = name.ok_or_else(|| Error::new(&format!("missing name in {:?}", s)))?;
    spec.size = size.ok_or_else(|| Error::new(&format!("missing size in {:?}", s)))?;

    Ok(spec)
}

/// Parse a layout for a device of `block_size`-byte blocks.
pub fn parse_layout(s: &str, block_size: u32) -> Result<Layout> {
    let mut layout = Layout::default();

    for (i, part) in s
        .split(';')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .enumerate()
    {
        match part.strip_prefix("uuid_disk=") {
            Some(x) if i == 0 => layout.disk_guid = Some(guid::parse(x)?),
            Some(_) => return Err("uuid_disk must come first".into()),
            None => layout.partitions.push(parse_partition(part, block_size)?),
        }
    }

    if layout.partitions.is_empty() {
        return Err("no partition in layout".into());
    }

    Ok(layout)
}
