// Ogg page checksum: CRC-32, polynomial 0x04C11DB7, zero init, no reflection

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ 0x04C1_1DB7
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC_TABLE: [u32; 256] = build_table();

/// Continue a checksum over `data`
pub fn update(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        crc = (crc << 8) ^ CRC_TABLE[((crc >> 24) as u8 ^ byte) as usize];
    }
    crc
}

pub fn checksum(data: &[u8]) -> u32 {
    update(0, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(checksum(b""), 0);
        // CRC-32/MPEG-2 shares the polynomial but starts from all ones
        assert_eq!(update(0xFFFF_FFFF, b"123456789"), 0x0376_E6E7);
        assert_eq!(checksum(b"123456789"), 0x89A1_897F);
    }

    #[test]
    fn test_incremental() {
        let whole = checksum(b"OggS page body");
        let split = update(checksum(b"OggS "), b"page body");
        assert_eq!(whole, split);
    }
}
