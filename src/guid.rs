//! GUIDs in their on-disk byte order.
//!
//! The first three groups of a GUID are stored little endian on disk, the last two as they are
//! written: `C12A7328-F81F-11D2-BA4B-00A0C93EC93B` is stored as `28 73 2A C1 1F F8 D2 11 BA 4B
//! 00 A0 C9 3E C9 3B`.

use thiserror::Error;

/// The all-zero GUID that marks an unused partition entry.
pub const UNUSED: [u8; 16] = [0; 16];

/// Basic data partition (`EBD0A0A2-B9E5-4433-87C0-68B6B72699C7`).
pub const BASIC_DATA_PARTITION: [u8; 16] = [
    0xA2, 0xA0, 0xD0, 0xEB, 0xE5, 0xB9, 0x33, 0x44, 0x87, 0xC0, 0x68, 0xB6, 0xB7, 0x26, 0x99, 0xC7,
];

/// EFI system partition (`C12A7328-F81F-11D2-BA4B-00A0C93EC93B`).
pub const EFI_SYSTEM_PARTITION: [u8; 16] = [
    0x28, 0x73, 0x2A, 0xC1, 0x1F, 0xF8, 0xD2, 0x11, 0xBA, 0x4B, 0x00, 0xA0, 0xC9, 0x3E, 0xC9, 0x3B,
];

/// Linux filesystem data (`0FC63DAF-8483-4772-8E79-3D69D8477DE4`).
pub const LINUX_FILESYSTEM: [u8; 16] = [
    0xAF, 0x3D, 0xC6, 0x0F, 0x83, 0x84, 0x72, 0x47, 0x8E, 0x79, 0x3D, 0x69, 0xD8, 0x47, 0x7D, 0xE4,
];

/// An error that occurs when parsing a GUID from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuidError {
    /// The GUID doesn't have 32 hexadecimal digits in groups of 8-4-4-4-12.
    #[error("invalid GUID format: {0:?}")]
    InvalidFormat(String),
}

/// Parse a GUID written as `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX` (case insensitive) into its
/// on-disk byte order.
pub fn parse(s: &str) -> Result<[u8; 16], GuidError> {
    let invalid = || GuidError::InvalidFormat(s.to_string());

    let groups: Vec<&str> = s.split('-').collect();
    if groups.iter().map(|x| x.len()).collect::<Vec<_>>() != [8, 4, 4, 4, 12] {
        return Err(invalid());
    }

    let digits: String = groups.concat();
    if !digits.chars().all(|x| x.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let bytes = digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|x| u8::from_str_radix(x, 16).ok())
                .ok_or_else(invalid)
        })
        .collect::<Result<Vec<u8>, GuidError>>()?;

    let mut guid = [0; 16];
    let reordered = bytes[..4]
        .iter()
        .rev()
        .chain(bytes[4..6].iter().rev())
        .chain(bytes[6..8].iter().rev())
        .chain(bytes[8..].iter());
    for (e, v) in guid.iter_mut().zip(reordered) {
        *e = *v;
    }

    Ok(guid)
}

/// Format a GUID stored in on-disk byte order as upper-case text.
pub fn format(guid: &[u8; 16]) -> String {
    let mut digits: Vec<_> = guid.iter().collect();
    let mut uuid: Vec<String> = Vec::new();
    uuid.extend(digits.drain(..4).rev().map(|x| format!("{:02X}", x)));
    uuid.push("-".to_string());
    uuid.extend(digits.drain(..2).rev().map(|x| format!("{:02X}", x)));
    uuid.push("-".to_string());
    uuid.extend(digits.drain(..2).rev().map(|x| format!("{:02X}", x)));
    uuid.push("-".to_string());
    uuid.extend(digits.drain(..2).map(|x| format!("{:02X}", x)));
    uuid.push("-".to_string());
    uuid.extend(digits.drain(..).map(|x| format!("{:02X}", x)));

    uuid.into_iter().collect()
}

/// Generate a random (version 4) GUID in on-disk byte order.
pub fn generate_random() -> [u8; 16] {
    let mut guid: [u8; 16] = rand::random();
    // version lives in the high nibble of the little-endian third group
    guid[7] = (guid[7] & 0x0f) | 0x40;
    guid[8] = (guid[8] & 0x3f) | 0x80;
    guid
}
