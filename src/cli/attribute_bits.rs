use gptcore::guid::BASIC_DATA_PARTITION;
use gptcore::{LEGACY_BIOS_BOOTABLE, NO_BLOCK_IO_PROTOCOL, REQUIRED_PARTITION};

pub trait AttributeBits {
    fn display_attribute_bits(&self, type_guid: [u8; 16]) -> String;
}

impl AttributeBits for u64 {
    fn display_attribute_bits(&self, type_guid: [u8; 16]) -> String {
        (0..64)
            .filter(|i| self & (1 << i) != 0)
            .map(|i| match 1_u64 << i {
                REQUIRED_PARTITION => "0:RequiredPartition".to_string(),
                NO_BLOCK_IO_PROTOCOL => "1:NoBlockIOProtocol".to_string(),
                LEGACY_BIOS_BOOTABLE => "2:LegacyBIOSBootable".to_string(),
                _ if i < 48 => format!("{}:Reserved", i),
                _ if type_guid == BASIC_DATA_PARTITION => match i {
                    60 => "60:ReadOnly".to_string(),
                    61 => "61:ShadowCopy".to_string(),
                    62 => "62:Hidden".to_string(),
                    63 => "63:NoDriveLetter".to_string(),
                    x => format!("{}", x),
                },
                // bootable marker of this engine on every other type
                _ if i == 60 => "60:Bootable".to_string(),
                _ => format!("{}", i),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(0_u64.display_attribute_bits(BASIC_DATA_PARTITION), "");
        assert_eq!(
            (LEGACY_BIOS_BOOTABLE | REQUIRED_PARTITION).display_attribute_bits([0; 16]),
            "0:RequiredPartition,2:LegacyBIOSBootable"
        );
        assert_eq!(
            (1_u64 << 60 | 1 << 5).display_attribute_bits(BASIC_DATA_PARTITION),
            "5:Reserved,60:ReadOnly"
        );
        assert_eq!(
            (1_u64 << 60 | 1 << 50).display_attribute_bits([1; 16]),
            "50,60:Bootable"
        );
    }
}
