// ID3v2 tag implementation

use std::io::{Read, Seek, SeekFrom};

use log::debug;

use crate::error::{Result, TagError};
use crate::id3::frames::{is_valid_id, upgrade_v22_id, Frame};
use crate::rewrite::read_region;
use crate::utils::io::{
    decode_synchsafe, encode_synchsafe, read_exact_or_short, read_synchsafe_u32, read_u24_be,
    read_u32_be, write_u32_be,
};

/// ID3v2 header structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Id3v2Header {
    pub major: u8,
    pub revision: u8,
    pub flags: u8,
    /// Size of everything after the header, excluding an optional footer
    pub size: u32,
}

impl Id3v2Header {
    pub const HEADER_SIZE: usize = 10;
    const ID: [u8; 3] = [b'I', b'D', b'3'];

    const FLAG_UNSYNC: u8 = 0x80;
    const FLAG_EXTENDED: u8 = 0x40;
    const FLAG_FOOTER: u8 = 0x10;

    /// Parse the 10-byte header; `None` when the signature is absent
    pub fn parse(buffer: &[u8; 10]) -> Option<Self> {
        // Check for ID3 identifier
        if buffer[0..3] != Self::ID || buffer[3] == 0xFF || buffer[4] == 0xFF {
            return None;
        }
        if buffer[6..10].iter().any(|&b| b & 0x80 != 0) {
            return None;
        }

        Some(Id3v2Header {
            major: buffer[3],
            revision: buffer[4],
            flags: buffer[5],
            size: decode_synchsafe([buffer[6], buffer[7], buffer[8], buffer[9]]),
        })
    }

    /// Read ID3v2 header from reader at its current position
    pub fn read<R: Read>(reader: &mut R) -> Result<Option<Self>> {
        let mut buffer = [0u8; Self::HEADER_SIZE];
        match read_exact_or_short(reader, &mut buffer) {
            Ok(()) => Ok(Self::parse(&buffer)),
            Err(TagError::ShortRead { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn has_footer(&self) -> bool {
        self.major >= 4 && self.flags & Self::FLAG_FOOTER != 0
    }

    /// Bytes occupied by the whole tag, header and footer included
    pub fn total_size(&self) -> u64 {
        let footer = if self.has_footer() { 10 } else { 0 };
        Self::HEADER_SIZE as u64 + u64::from(self.size) + footer
    }
}

/// ID3v2 tag structure
#[derive(Debug, Clone)]
pub struct Id3v2Tag {
    pub header: Id3v2Header,
    pub frames: Vec<Frame>,
}

/// Locate a tag at the start of the stream and return its header
pub fn find_id3v2<R: Read + Seek>(reader: &mut R) -> Result<Option<Id3v2Header>> {
    reader.seek(SeekFrom::Start(0))?;
    Id3v2Header::read(reader)
}

impl Id3v2Tag {
    /// Read the tag at the start of the stream; `file_len` bounds the declared size
    pub fn read<R: Read + Seek>(reader: &mut R, file_len: u64) -> Result<Option<Self>> {
        let header = match find_id3v2(reader)? {
            Some(header) => header,
            None => return Ok(None),
        };

        let body_end = Id3v2Header::HEADER_SIZE as u64 + u64::from(header.size);
        if body_end > file_len {
            return Err(TagError::corrupt(format!(
                "ID3v2 tag declares {} bytes but the file has {file_len}",
                header.size
            )));
        }

        let body = read_region(reader, Id3v2Header::HEADER_SIZE as u64, header.size as usize)?;
        let frames = Self::parse_body(&header, body)?;
        Ok(Some(Id3v2Tag { header, frames }))
    }

    /// Parse the frames following the header
    pub fn parse_body(header: &Id3v2Header, mut body: Vec<u8>) -> Result<Vec<Frame>> {
        match header.major {
            2..=4 => {}
            major => {
                debug!("Skipping unsupported ID3v2.{major} tag");
                return Ok(Vec::new());
            }
        }

        if header.major == 2 && header.flags & Id3v2Header::FLAG_EXTENDED != 0 {
            debug!("Skipping compressed ID3v2.2 tag");
            return Ok(Vec::new());
        }

        // v2.4 unsynchronises per frame
        if header.major < 4 && header.flags & Id3v2Header::FLAG_UNSYNC != 0 {
            body = remove_unsync(&body);
        }

        let mut pos = 0;
        if header.major >= 3 && header.flags & Id3v2Header::FLAG_EXTENDED != 0 {
            let ext_size = if header.major == 4 {
                read_synchsafe_u32(&body, 0)? as usize
            } else {
                read_u32_be(&body, 0)? as usize + 4
            };
            if ext_size > body.len() {
                return Err(TagError::corrupt("extended header larger than the tag"));
            }
            pos = ext_size;
        }

        let mut frames = Vec::new();
        while let Some((frame, next)) = parse_frame(&body, pos, header.major)? {
            pos = next;
            if let Some(frame) = frame {
                frames.push(frame);
            }
        }

        Ok(frames)
    }

    /// Render a tag from frames; the result is at least `min_size` bytes, padded with zeros
    pub fn render(frames: &[Frame], major: u8, padding: usize, min_size: usize) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        for frame in frames {
            if frame.id.len() != 4 {
                continue;
            }
            let size = frame.data.len() as u32;
            body.try_reserve(frame.data.len() + 10)?;
            body.extend_from_slice(frame.id.as_bytes());
            if major >= 4 {
                body.extend_from_slice(&encode_synchsafe(size)?);
            } else {
                write_u32_be(size, &mut body);
            }
            body.extend_from_slice(&[0, 0]);
            body.extend_from_slice(&frame.data);
        }

        let unpadded = Id3v2Header::HEADER_SIZE + body.len();
        let total = if unpadded <= min_size {
            min_size
        } else {
            unpadded + padding
        };
        body.resize(total - Id3v2Header::HEADER_SIZE, 0);

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&Id3v2Header::ID);
        out.extend_from_slice(&[major, 0, 0]);
        out.extend_from_slice(&encode_synchsafe(body.len() as u32)?);
        out.extend(body);
        Ok(out)
    }
}

/// Parse the frame at `pos`. Returns `None` at padding or the end of the body; the inner
/// `None` is a frame that was skipped.
fn parse_frame(body: &[u8], pos: usize, major: u8) -> Result<Option<(Option<Frame>, usize)>> {
    let header_len = if major == 2 { 6 } else { 10 };
    let id_len = if major == 2 { 3 } else { 4 };

    if pos + header_len > body.len() {
        return Ok(None);
    }
    let id_bytes = &body[pos..pos + id_len];
    if id_bytes[0] == 0 {
        return Ok(None);
    }
    if !is_valid_id(id_bytes) {
        debug!("Invalid frame ID at offset {pos}, treating the rest as padding");
        return Ok(None);
    }
    let raw_id = String::from_utf8_lossy(id_bytes).into_owned();

    let (size, flags) = match major {
        2 => (read_u24_be(body, pos + 3)? as usize, 0u16),
        3 => (read_u32_be(body, pos + 4)? as usize, u16::from_be_bytes([body[pos + 8], body[pos + 9]])),
        _ => (v4_frame_size(body, pos)?, u16::from_be_bytes([body[pos + 8], body[pos + 9]])),
    };

    let data_start = pos + header_len;
    let data_end = data_start
        .checked_add(size)
        .filter(|&end| end <= body.len())
        .ok_or_else(|| TagError::corrupt(format!("frame {raw_id} runs past the end of the tag")))?;
    let mut data = &body[data_start..data_end];

    let id = if major == 2 {
        match upgrade_v22_id(&raw_id) {
            Some(id) => id.to_string(),
            None => {
                debug!("Skipping ID3v2.2 frame {raw_id} with no v2.3 equivalent");
                return Ok(Some((None, data_end)));
            }
        }
    } else {
        raw_id
    };

    let (discard_on_alter, compressed, encrypted, grouping, unsync, length_indicator) = match major {
        2 => (false, false, false, false, false, false),
        3 => (
            flags & 0x8000 != 0,
            flags & 0x0080 != 0,
            flags & 0x0040 != 0,
            flags & 0x0020 != 0,
            false,
            false,
        ),
        _ => (
            flags & 0x4000 != 0,
            flags & 0x0008 != 0,
            flags & 0x0004 != 0,
            flags & 0x0040 != 0,
            flags & 0x0002 != 0,
            flags & 0x0001 != 0,
        ),
    };

    if compressed || encrypted {
        debug!("Skipping compressed or encrypted frame {id}");
        return Ok(Some((None, data_end)));
    }

    if grouping {
        data = data.get(1..).unwrap_or_default();
    }
    if length_indicator {
        data = data.get(4..).unwrap_or_default();
    }
    let data = if unsync { remove_unsync(data) } else { data.to_vec() };

    Ok(Some((
        Some(Frame {
            id,
            data,
            discard_on_alter,
        }),
        data_end,
    )))
}

/// v2.4 sizes are synchsafe, but iTunes wrote plain big-endian sizes for a while.
/// Prefer whichever interpretation lands on a plausible next frame.
fn v4_frame_size(body: &[u8], pos: usize) -> Result<usize> {
    let raw = read_u32_be(body, pos + 4)? as usize;
    let synchsafe = read_synchsafe_u32(body, pos + 4)? as usize;
    if raw & 0x8080_8080 != 0 {
        return Ok(raw);
    }
    if raw == synchsafe {
        return Ok(synchsafe);
    }

    let lands_well = |size: usize| {
        let next = pos + 10 + size;
        match body.get(next..next + 4) {
            Some(id) => id[0] == 0 || is_valid_id(id),
            None => next <= body.len(),
        }
    };
    if !lands_well(synchsafe) && lands_well(raw) {
        debug!("Using non-synchsafe frame size at offset {pos}");
        Ok(raw)
    } else {
        Ok(synchsafe)
    }
}

/// Undo unsynchronisation: every `FF 00` becomes `FF`
pub fn remove_unsync(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut previous_ff = false;
    for &byte in data {
        if previous_ff && byte == 0 {
            previous_ff = false;
            continue;
        }
        out.push(byte);
        previous_ff = byte == 0xFF;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn text_frame(id: &str, text: &str) -> Frame {
        let mut data = vec![0];
        data.extend_from_slice(text.as_bytes());
        Frame::new(id, data)
    }

    #[test]
    fn test_header() {
        let header = Id3v2Header::parse(b"ID3\x03\x00\x00\x00\x00\x02\x01").unwrap();
        assert_eq!(header.major, 3);
        assert_eq!(header.size, 257);
        assert_eq!(header.total_size(), 267);
        assert!(Id3v2Header::parse(b"ID3\x03\x00\x00\x80\x00\x02\x01").is_none());
        assert!(Id3v2Header::parse(b"TAG\x03\x00\x00\x00\x00\x02\x01").is_none());
    }

    #[test]
    fn test_render_and_parse() {
        let frames = vec![text_frame("TIT2", "Song"), text_frame("TPE1", "Band")];
        for major in [3, 4] {
            let bytes = Id3v2Tag::render(&frames, major, 100, 0).unwrap();
            assert_eq!(bytes.len(), 10 + 2 * 10 + 5 + 5 + 100);

            let total = bytes.len() as u64;
            let mut cursor = Cursor::new(bytes);
            let tag = Id3v2Tag::read(&mut cursor, total).unwrap().unwrap();
            assert_eq!(tag.header.major, major);
            assert_eq!(tag.frames, frames);
        }
    }

    #[test]
    fn test_render_fills_old_space() {
        let frames = vec![text_frame("TIT2", "Song")];
        let bytes = Id3v2Tag::render(&frames, 4, 1024, 500).unwrap();
        assert_eq!(bytes.len(), 500);
        let bytes = Id3v2Tag::render(&frames, 4, 16, 12).unwrap();
        assert_eq!(bytes.len(), 10 + 15 + 16);
    }

    #[test]
    fn test_v22_frames_are_upgraded() {
        let mut body = Vec::new();
        body.extend_from_slice(b"TT2\x00\x00\x05\x00Song");
        body.extend_from_slice(b"XYZ\x00\x00\x01\x00");
        body.extend_from_slice(&[0; 8]);
        let header = Id3v2Header {
            major: 2,
            revision: 0,
            flags: 0,
            size: body.len() as u32,
        };
        let frames = Id3v2Tag::parse_body(&header, body).unwrap();
        assert_eq!(frames, vec![text_frame("TIT2", "Song")]);
    }

    #[test]
    fn test_truncated_frame_is_corrupt() {
        let body = b"TIT2\x00\x00\x00\x50\x00\x00\x00Song".to_vec();
        let header = Id3v2Header {
            major: 3,
            revision: 0,
            flags: 0,
            size: body.len() as u32,
        };
        assert!(Id3v2Tag::parse_body(&header, body).is_err());
    }

    #[test]
    fn test_declared_size_past_eof() {
        let mut cursor = Cursor::new(b"ID3\x04\x00\x00\x00\x00\x10\x00TIT2".to_vec());
        assert!(Id3v2Tag::read(&mut cursor, 14).is_err());
    }

    #[test]
    fn test_unsync_and_itunes_sizes() {
        assert_eq!(remove_unsync(&[0xFF, 0x00, 0xE0, 0xFF, 0x00, 0x00]), vec![0xFF, 0xE0, 0xFF, 0x00]);

        // A 0x80-byte frame written with a plain big-endian size
        let mut body = Vec::new();
        body.extend_from_slice(b"TIT2\x00\x00\x00\x80\x00\x00");
        body.push(0);
        body.extend_from_slice(&[b'a'; 0x7F]);
        body.extend_from_slice(b"TPE1\x00\x00\x00\x02\x00\x00\x00B");
        let header = Id3v2Header {
            major: 4,
            revision: 0,
            flags: 0,
            size: body.len() as u32,
        };
        let frames = Id3v2Tag::parse_body(&header, body).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], text_frame("TPE1", "B"));
    }

    #[test]
    fn test_encrypted_frames_are_skipped() {
        let mut body = Vec::new();
        body.extend_from_slice(b"TIT2\x00\x00\x00\x02\x00\x04\x00X");
        body.extend_from_slice(b"TPE1\x00\x00\x00\x02\x00\x00\x00B");
        let header = Id3v2Header {
            major: 4,
            revision: 0,
            flags: 0,
            size: body.len() as u32,
        };
        let frames = Id3v2Tag::parse_body(&header, body).unwrap();
        assert_eq!(frames, vec![text_frame("TPE1", "B")]);
    }
}
