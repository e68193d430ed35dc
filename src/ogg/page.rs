use std::io::{Read, Write};

use log::debug;

use super::crc;
use super::{OGG_HEADER_TYPE_BOS, OGG_HEADER_TYPE_CONTINUATION, OGG_HEADER_TYPE_EOS, OGG_SIGNATURE};
use crate::error::{Result, TagError};
use crate::utils::io::read_exact_or_short;

/// Granule position of a page on which no packet ends
pub const NO_GRANULE: u64 = u64::MAX;

/// Most lacing values one page can hold
pub const MAX_SEGMENTS: usize = 255;

/// OGG Page Header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OggPageHeader {
    pub header_type: u8,
    pub granule_position: u64,
    pub bitstream_serial: u32,
    pub page_sequence: u32,
    pub crc: u32,
    pub segment_table: Vec<u8>,
}

impl OggPageHeader {
    pub const SIZE: usize = 27;

    /// Calculate total page data size from segment table
    pub fn data_size(&self) -> usize {
        self.segment_table.iter().map(|&x| x as usize).sum()
    }
}

/// OGG Page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OggPage {
    pub header: OggPageHeader,
    pub data: Vec<u8>,
}

impl OggPage {
    /// Read the next page. `Ok(None)` at a clean end of stream, `NotThisFormat`
    /// when the bytes at the current position are not a page.
    pub fn read<R: Read>(reader: &mut R) -> Result<Option<Self>> {
        let mut header = [0u8; OggPageHeader::SIZE];
        match read_exact_or_short(reader, &mut header) {
            Ok(()) => {}
            Err(TagError::ShortRead { available: 0, .. }) => return Ok(None),
            Err(TagError::ShortRead { available, .. }) => {
                let n = available.min(4);
                return Err(if header[..n] == OGG_SIGNATURE[..n] {
                    TagError::corrupt("truncated Ogg page header")
                } else {
                    TagError::not_format("Ogg")
                });
            }
            Err(e) => return Err(e),
        }

        if &header[0..4] != OGG_SIGNATURE {
            return Err(TagError::not_format("Ogg"));
        }
        if header[4] != 0 {
            return Err(TagError::UnsupportedFeature(format!("Ogg stream version {}", header[4])));
        }

        let mut segment_table = vec![0u8; header[26] as usize];
        read_exact_or_short(reader, &mut segment_table)
            .map_err(|_| TagError::corrupt("truncated Ogg segment table"))?;

        let header = OggPageHeader {
            header_type: header[5],
            granule_position: u64::from_le_bytes([
                header[6], header[7], header[8], header[9], header[10], header[11], header[12], header[13],
            ]),
            bitstream_serial: u32::from_le_bytes([header[14], header[15], header[16], header[17]]),
            page_sequence: u32::from_le_bytes([header[18], header[19], header[20], header[21]]),
            crc: u32::from_le_bytes([header[22], header[23], header[24], header[25]]),
            segment_table,
        };

        let mut data = vec![0u8; header.data_size()];
        read_exact_or_short(reader, &mut data).map_err(|_| TagError::corrupt("truncated Ogg page"))?;

        let page = OggPage { header, data };
        if page.computed_crc() != page.header.crc {
            debug!(
                "CRC mismatch on page {} of stream {:08x}",
                page.header.page_sequence, page.header.bitstream_serial
            );
        }
        Ok(Some(page))
    }

    /// Size on disk
    pub fn size(&self) -> usize {
        OggPageHeader::SIZE + self.header.segment_table.len() + self.data.len()
    }

    pub fn is_continuation(&self) -> bool {
        self.header.header_type & OGG_HEADER_TYPE_CONTINUATION != 0
    }

    pub fn is_bos(&self) -> bool {
        self.header.header_type & OGG_HEADER_TYPE_BOS != 0
    }

    pub fn is_eos(&self) -> bool {
        self.header.header_type & OGG_HEADER_TYPE_EOS != 0
    }

    /// Serialize with the stored checksum
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        out.extend_from_slice(OGG_SIGNATURE);
        out.push(0);
        out.push(self.header.header_type);
        out.extend_from_slice(&self.header.granule_position.to_le_bytes());
        out.extend_from_slice(&self.header.bitstream_serial.to_le_bytes());
        out.extend_from_slice(&self.header.page_sequence.to_le_bytes());
        out.extend_from_slice(&self.header.crc.to_le_bytes());
        out.push(self.header.segment_table.len() as u8);
        out.extend_from_slice(&self.header.segment_table);
        out.extend_from_slice(&self.data);
        out
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    fn computed_crc(&self) -> u32 {
        let mut bytes = self.to_bytes();
        bytes[22..26].fill(0);
        crc::checksum(&bytes)
    }

    pub fn update_crc(&mut self) {
        self.header.crc = self.computed_crc();
    }

    /// Split the body along its lacing values. Each item is a packet fragment and
    /// whether the packet ends on this page.
    pub fn segments(&self) -> Vec<(&[u8], bool)> {
        let mut out = Vec::new();
        let mut start = 0;
        let mut len = 0;
        for &lace in &self.header.segment_table {
            len += lace as usize;
            if lace < 255 {
                out.push((&self.data[start..start + len], true));
                start += len;
                len = 0;
            }
        }
        if len > 0 || start < self.data.len() {
            out.push((&self.data[start..start + len], false));
        }
        out
    }
}

/// Reassembles packets of one logical stream from its pages
#[derive(Debug, Default)]
pub struct PacketAssembler {
    partial: Vec<u8>,
    in_packet: bool,
    pub packets: Vec<Vec<u8>>,
}

impl PacketAssembler {
    pub fn push_page(&mut self, page: &OggPage) -> Result<()> {
        if page.is_continuation() != self.in_packet {
            return Err(TagError::corrupt(format!(
                "page {} breaks packet continuity",
                page.header.page_sequence
            )));
        }
        for (fragment, ends) in page.segments() {
            self.partial.try_reserve(fragment.len())?;
            self.partial.extend_from_slice(fragment);
            self.in_packet = !ends;
            if ends {
                self.packets.push(std::mem::take(&mut self.partial));
            }
        }
        Ok(())
    }

    /// A packet is still waiting for its continuation page
    pub fn has_partial(&self) -> bool {
        self.in_packet
    }
}

/// Lay `packets` out on fresh pages of stream `serial`, numbered from `first_sequence`.
/// The last packet finishes the last page.
pub fn paginate(packets: &[Vec<u8>], serial: u32, first_sequence: u32, granule: u64) -> Vec<OggPage> {
    let mut pages = Vec::new();
    let mut segment_table = Vec::new();
    let mut data = Vec::new();
    let mut continued = false;
    let mut packet_ended = false;

    let mut flush = |segment_table: &mut Vec<u8>, data: &mut Vec<u8>, continued: bool, packet_ended: bool| {
        let mut page = OggPage {
            header: OggPageHeader {
                header_type: if continued { OGG_HEADER_TYPE_CONTINUATION } else { 0 },
                granule_position: if packet_ended { granule } else { NO_GRANULE },
                bitstream_serial: serial,
                page_sequence: first_sequence + pages.len() as u32,
                crc: 0,
                segment_table: std::mem::take(segment_table),
            },
            data: std::mem::take(data),
        };
        page.update_crc();
        pages.push(page);
    };

    for packet in packets {
        let full = packet.len() / 255;
        let laces = std::iter::repeat(255u8).take(full).chain(std::iter::once((packet.len() % 255) as u8));
        let mut offset = 0;
        for (index, lace) in laces.enumerate() {
            if segment_table.len() == MAX_SEGMENTS {
                flush(&mut segment_table, &mut data, continued, packet_ended);
                continued = index > 0;
                packet_ended = false;
            }
            segment_table.push(lace);
            data.extend_from_slice(&packet[offset..offset + lace as usize]);
            offset += lace as usize;
        }
        packet_ended = true;
    }
    if !segment_table.is_empty() {
        flush(&mut segment_table, &mut data, continued, packet_ended);
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_page_round_trip() {
        let pages = paginate(&[b"hello".to_vec()], 0x1234, 7, 0);
        assert_eq!(pages.len(), 1);
        let bytes = pages[0].to_bytes();
        let back = OggPage::read(&mut Cursor::new(&bytes)).unwrap().unwrap();
        assert_eq!(back, pages[0]);
        assert_eq!(back.header.page_sequence, 7);
        assert_eq!(back.computed_crc(), back.header.crc);
    }

    #[test]
    fn test_clean_end_and_garbage() {
        assert!(OggPage::read(&mut Cursor::new(Vec::new())).unwrap().is_none());
        let err = OggPage::read(&mut Cursor::new(vec![b'X'; 40])).unwrap_err();
        assert!(matches!(err, TagError::NotThisFormat(_)));
        let err = OggPage::read(&mut Cursor::new(b"OggS\0".to_vec())).unwrap_err();
        assert!(matches!(err, TagError::CorruptData(_)));
    }

    #[test]
    fn test_large_packet_spans_pages() {
        let big = vec![0xAB; 255 * 300];
        let small = vec![0xCD; 10];
        let pages = paginate(&[big.clone(), small.clone()], 1, 1, 0);
        assert_eq!(pages.len(), 2);
        assert!(!pages[0].is_continuation());
        assert_eq!(pages[0].header.granule_position, NO_GRANULE);
        assert!(pages[1].is_continuation());
        assert_eq!(pages[1].header.granule_position, 0);

        let mut assembler = PacketAssembler::default();
        for page in &pages {
            assembler.push_page(page).unwrap();
        }
        assert!(!assembler.has_partial());
        assert_eq!(assembler.packets, vec![big, small]);
    }

    #[test]
    fn test_packet_of_exact_multiple_gets_zero_lace() {
        let pages = paginate(&[vec![1; 510]], 1, 1, 0);
        assert_eq!(pages[0].header.segment_table, vec![255, 255, 0]);
        assert_eq!(pages[0].segments(), vec![(&[1u8; 510][..], true)]);
    }

    #[test]
    fn test_missing_continuation_is_corrupt() {
        let pages = paginate(&[vec![1; 255 * 256]], 1, 1, 0);
        let mut assembler = PacketAssembler::default();
        assembler.push_page(&pages[0]).unwrap();
        assert!(assembler.has_partial());
        let mut fresh = pages[1].clone();
        fresh.header.header_type = 0;
        assert!(assembler.push_page(&fresh).is_err());
    }
}
