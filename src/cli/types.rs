use gptcore::guid;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// A known partition type: short alias usable in layouts (if any), category, description, GUID.
struct KnownType {
    alias: Option<&'static str>,
    category: &'static str,
    description: &'static str,
    guid: &'static str,
}

const KNOWN_TYPES: &[KnownType] = &[
    KnownType {
        alias: None,
        category: "_",
        description: "Unused entry",
        guid: "00000000-0000-0000-0000-000000000000",
    },
    KnownType {
        alias: Some("mbr"),
        category: "_",
        description: "MBR partition scheme",
        guid: "024DEE41-33E7-11D3-9D69-0008C781F39F",
    },
    KnownType {
        alias: Some("system"),
        category: "_",
        description: "EFI System partition",
        guid: "C12A7328-F81F-11D2-BA4B-00A0C93EC93B",
    },
    KnownType {
        alias: Some("bios"),
        category: "_",
        description: "BIOS boot partition",
        guid: "21686148-6449-6E6F-744E-656564454649",
    },
    KnownType {
        alias: Some("msft"),
        category: "Windows",
        description: "Microsoft Reserved Partition (MSR)",
        guid: "E3C9E316-0B5C-4DB8-817D-F92DF00215AE",
    },
    KnownType {
        alias: Some("data"),
        category: "Windows",
        description: "Basic data partition",
        guid: "EBD0A0A2-B9E5-4433-87C0-68B6B72699C7",
    },
    KnownType {
        alias: Some("linux"),
        category: "Linux",
        description: "Linux filesystem data",
        guid: "0FC63DAF-8483-4772-8E79-3D69D8477DE4",
    },
    KnownType {
        alias: Some("raid"),
        category: "Linux",
        description: "RAID partition",
        guid: "A19D880F-05FC-4D3B-A006-743F0F84911E",
    },
    KnownType {
        alias: Some("swap"),
        category: "Linux",
        description: "Swap partition",
        guid: "0657FD6D-A4AB-43C4-84E5-0933C84B4F4F",
    },
    KnownType {
        alias: Some("lvm"),
        category: "Linux",
        description: "Logical Volume Manager (LVM) partition",
        guid: "E6D6D379-F507-44C2-A23C-238F2A3DF928",
    },
    KnownType {
        alias: None,
        category: "Linux",
        description: "Root partition (x86-64)",
        guid: "4F68BCE3-E8CD-4DB1-96E7-FBCAF984B709",
    },
    KnownType {
        alias: None,
        category: "Linux",
        description: "Root partition (64-bit ARM/AArch64)",
        guid: "B921B045-1DF0-41C3-AF44-4C6F280D3FAE",
    },
    KnownType {
        alias: None,
        category: "Linux",
        description: "LUKS partition",
        guid: "CA7D7CCB-63ED-4C53-861C-1742536059CC",
    },
    KnownType {
        alias: Some("u-boot-env"),
        category: "U-Boot",
        description: "U-Boot environment",
        guid: "3DE21764-95BD-54BD-A5C3-4ABE786F38A8",
    },
    KnownType {
        alias: None,
        category: "Chrome OS",
        description: "Chrome OS kernel",
        guid: "FE3A2A5D-4F32-41A7-B725-ACCC3285A309",
    },
    KnownType {
        alias: None,
        category: "Chrome OS",
        description: "Chrome OS rootfs",
        guid: "3CB8E202-3B7E-47DD-8A3C-7FF2A13CFCEC",
    },
];

lazy_static! {
    pub static ref TYPE_MAP: HashMap<[u8; 16], String> = KNOWN_TYPES
        .iter()
        .filter_map(|x| {
            guid::parse(x.guid)
                .ok()
                .map(|g| (g, format!("{} / {}", x.category, x.description)))
        })
        .collect();
    pub static ref TYPE_ALIASES: HashMap<&'static str, [u8; 16]> = KNOWN_TYPES
        .iter()
        .filter_map(|x| Some((x.alias?, guid::parse(x.guid).ok()?)))
        .collect();
}

/// Resolve a partition type given as an alias (`linux`, `swap`, ...) or as a GUID.
pub fn parse_partition_type(s: &str) -> Result<[u8; 16], guid::GuidError> {
    match TYPE_ALIASES.get(s.to_lowercase().as_str()) {
        Some(x) => Ok(*x),
        None => guid::parse(s),
    }
}

pub trait PartitionTypeGUID {
    fn display_partition_type_guid(&self) -> String;
}

impl PartitionTypeGUID for [u8; 16] {
    fn display_partition_type_guid(&self) -> String {
        TYPE_MAP
            .get(self)
            .cloned()
            .unwrap_or_else(|| guid::format(self))
    }
}
