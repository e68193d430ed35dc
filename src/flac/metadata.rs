// FLAC metadata block implementation

use std::io::{Read, Seek, SeekFrom};

use log::debug;

use crate::error::{Result, TagError};
use crate::id3::v2::find_id3v2;
use crate::utils::io::read_exact_or_short;

/// FLAC file signature
pub const FLAC_SIGNATURE: &[u8; 4] = b"fLaC";

/// Largest payload a 24-bit block length can describe
pub const MAX_BLOCK_LENGTH: usize = 0xFF_FFFF;

/// FLAC metadata block types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlacMetadataBlockType {
    StreamInfo,
    Padding,
    Application,
    SeekTable,
    VorbisComment,
    CueSheet,
    Picture,
    /// Reserved types are preserved untouched
    Other(u8),
}

impl FlacMetadataBlockType {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => FlacMetadataBlockType::StreamInfo,
            1 => FlacMetadataBlockType::Padding,
            2 => FlacMetadataBlockType::Application,
            3 => FlacMetadataBlockType::SeekTable,
            4 => FlacMetadataBlockType::VorbisComment,
            5 => FlacMetadataBlockType::CueSheet,
            6 => FlacMetadataBlockType::Picture,
            other => FlacMetadataBlockType::Other(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            FlacMetadataBlockType::StreamInfo => 0,
            FlacMetadataBlockType::Padding => 1,
            FlacMetadataBlockType::Application => 2,
            FlacMetadataBlockType::SeekTable => 3,
            FlacMetadataBlockType::VorbisComment => 4,
            FlacMetadataBlockType::CueSheet => 5,
            FlacMetadataBlockType::Picture => 6,
            FlacMetadataBlockType::Other(byte) => byte,
        }
    }
}

/// FLAC metadata block header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlacMetadataBlockHeader {
    pub is_last: bool,
    pub block_type: FlacMetadataBlockType,
    pub length: u32,
}

impl FlacMetadataBlockHeader {
    pub const HEADER_SIZE: usize = 4;

    pub fn parse(buffer: [u8; Self::HEADER_SIZE]) -> Self {
        FlacMetadataBlockHeader {
            is_last: (buffer[0] & 0x80) != 0,
            block_type: FlacMetadataBlockType::from_byte(buffer[0] & 0x7F),
            // Length is big-endian 24-bit
            length: u32::from_be_bytes([0, buffer[1], buffer[2], buffer[3]]),
        }
    }

    pub fn render(&self) -> [u8; Self::HEADER_SIZE] {
        let length = self.length.to_be_bytes();
        let flag = if self.is_last { 0x80 } else { 0 };
        [flag | self.block_type.to_byte(), length[1], length[2], length[3]]
    }
}

/// FLAC metadata block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlacMetadataBlock {
    pub block_type: FlacMetadataBlockType,
    pub data: Vec<u8>,
}

impl FlacMetadataBlock {
    pub fn new(block_type: FlacMetadataBlockType, data: Vec<u8>) -> Self {
        FlacMetadataBlock { block_type, data }
    }

    pub fn padding(len: usize) -> Self {
        Self::new(FlacMetadataBlockType::Padding, vec![0; len])
    }

    /// Size on disk, header included
    pub fn size(&self) -> usize {
        FlacMetadataBlockHeader::HEADER_SIZE + self.data.len()
    }

    pub fn render_into(&self, is_last: bool, out: &mut Vec<u8>) -> Result<()> {
        if self.data.len() > MAX_BLOCK_LENGTH {
            return Err(TagError::UnsupportedFeature(format!(
                "{:?} block of {} bytes exceeds the FLAC block size limit",
                self.block_type,
                self.data.len()
            )));
        }
        let header = FlacMetadataBlockHeader {
            is_last,
            block_type: self.block_type,
            length: self.data.len() as u32,
        };
        out.extend_from_slice(&header.render());
        out.extend_from_slice(&self.data);
        Ok(())
    }
}

/// Parsed metadata head of a FLAC file
#[derive(Debug, Clone, Default)]
pub struct FlacMetadata {
    /// Length of an ID3v2 tag some taggers put before `fLaC`
    pub id3v2_len: u64,
    pub blocks: Vec<FlacMetadataBlock>,
    /// Offset of the first audio frame
    pub audio_start: u64,
}

impl FlacMetadata {
    /// Read the signature and every metadata block. Fails with `NotThisFormat`
    /// when the stream does not start with `fLaC` (after an optional ID3v2 tag).
    pub fn read<R: Read + Seek>(reader: &mut R, file_len: u64) -> Result<Self> {
        let id3v2_len = match find_id3v2(reader)? {
            Some(header) => {
                debug!("Skipping {} byte ID3v2 tag before fLaC", header.total_size());
                header.total_size()
            }
            None => 0,
        };

        reader.seek(SeekFrom::Start(id3v2_len))?;
        let mut signature = [0u8; 4];
        match read_exact_or_short(reader, &mut signature) {
            Ok(()) if &signature == FLAC_SIGNATURE => {}
            Ok(()) | Err(TagError::ShortRead { .. }) => return Err(TagError::not_format("FLAC")),
            Err(e) => return Err(e),
        }

        let mut blocks = Vec::new();
        let mut offset = id3v2_len + 4;
        loop {
            let mut buffer = [0u8; FlacMetadataBlockHeader::HEADER_SIZE];
            read_exact_or_short(reader, &mut buffer)?;
            let header = FlacMetadataBlockHeader::parse(buffer);
            offset += FlacMetadataBlockHeader::HEADER_SIZE as u64;

            let length = header.length as u64;
            if offset + length > file_len {
                return Err(TagError::corrupt(format!(
                    "{:?} block at offset {offset} runs past the end of the file",
                    header.block_type
                )));
            }

            if header.block_type == FlacMetadataBlockType::Padding {
                reader.seek(SeekFrom::Current(length as i64))?;
                blocks.push(FlacMetadataBlock::new(header.block_type, Vec::new()));
            } else {
                let mut data = Vec::new();
                data.try_reserve_exact(length as usize)?;
                data.resize(length as usize, 0);
                read_exact_or_short(reader, &mut data)?;
                blocks.push(FlacMetadataBlock::new(header.block_type, data));
            }
            offset += length;

            if header.is_last {
                break;
            }
        }

        if blocks.first().map(|b| b.block_type) != Some(FlacMetadataBlockType::StreamInfo) {
            return Err(TagError::corrupt("FLAC stream does not start with STREAMINFO"));
        }

        Ok(FlacMetadata {
            id3v2_len,
            blocks,
            audio_start: offset,
        })
    }

    pub fn blocks_of(&self, block_type: FlacMetadataBlockType) -> impl Iterator<Item = &FlacMetadataBlock> {
        self.blocks.iter().filter(move |b| b.block_type == block_type)
    }
}

/// Render `fLaC` followed by the blocks, marking the final one as last
pub fn render_head(blocks: &[FlacMetadataBlock]) -> Result<Vec<u8>> {
    let size = 4 + blocks.iter().map(FlacMetadataBlock::size).sum::<usize>();
    let mut out = Vec::new();
    out.try_reserve_exact(size)?;

    out.extend_from_slice(FLAC_SIGNATURE);
    for (index, block) in blocks.iter().enumerate() {
        block.render_into(index + 1 == blocks.len(), &mut out)?;
    }
    Ok(out)
}
