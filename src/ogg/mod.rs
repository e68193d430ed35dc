// OGG support for codecs that carry a Vorbis comment header
//
// OGG File Structure:
// - OGG Page Header (27 bytes)
//   - Capture Pattern: "OggS" (4 bytes)
//   - Version: 0 (1 byte)
//   - Header Type: 1=continuation, 2=bos, 4=eos (1 byte)
//   - Granule Position (8 bytes)
//   - Bitstream Serial Number (4 bytes)
//   - Page Sequence Number (4 bytes)
//   - CRC Checksum (4 bytes)
//   - Number of Page Segments (1 byte)
//   - Segment Table (variable)
//
// Header packets of the supported codecs:
// - Vorbis: identification, comment ("\x03vorbis"), setup
// - Opus: "OpusHead", "OpusTags"
// - Speex: "Speex   " header, comment, optional extra headers
// The identification packet sits alone on the first page; audio starts on a fresh page.

pub mod crc;
pub mod page;
pub mod vorbis;

use crate::config::TagConfig;
use crate::error::{Result, TagError};
use crate::flac::vorbis::VorbisComment;
use crate::opus;

// OGG signature
pub const OGG_SIGNATURE: &[u8; 4] = b"OggS";

// OGG page header types
pub const OGG_HEADER_TYPE_CONTINUATION: u8 = 0x01;
pub const OGG_HEADER_TYPE_BOS: u8 = 0x02;
pub const OGG_HEADER_TYPE_EOS: u8 = 0x04;

const VORBIS_IDENTIFICATION: &[u8; 7] = b"\x01vorbis";
const VORBIS_COMMENT_HEADER: &[u8; 7] = b"\x03vorbis";
const SPEEX_SIGNATURE: &[u8; 8] = b"Speex   ";
/// Offset of the extra header count in the Speex header packet
const SPEEX_EXTRA_HEADERS_OFFSET: usize = 68;

/// Codec of an Ogg logical stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OggCodec {
    Vorbis,
    Opus,
    Speex,
}

impl OggCodec {
    /// Identify the codec from its identification packet
    pub fn detect(packet: &[u8]) -> Option<Self> {
        if packet.starts_with(VORBIS_IDENTIFICATION) {
            Some(OggCodec::Vorbis)
        } else if packet.starts_with(opus::OPUS_SIGNATURE) {
            Some(OggCodec::Opus)
        } else if packet.starts_with(SPEEX_SIGNATURE) {
            Some(OggCodec::Speex)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OggCodec::Vorbis => "Ogg Vorbis",
            OggCodec::Opus => "Ogg Opus",
            OggCodec::Speex => "Ogg Speex",
        }
    }

    /// Header packets that follow the identification packet
    pub fn header_packet_count(self, identification: &[u8]) -> Result<usize> {
        match self {
            OggCodec::Vorbis => Ok(2),
            OggCodec::Opus => Ok(1),
            OggCodec::Speex => {
                let extra = identification
                    .get(SPEEX_EXTRA_HEADERS_OFFSET..SPEEX_EXTRA_HEADERS_OFFSET + 4)
                    .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .ok_or_else(|| TagError::corrupt("truncated Speex header"))?;
                if extra > 16 {
                    return Err(TagError::corrupt(format!("Speex header declares {extra} extra headers")));
                }
                Ok(1 + extra as usize)
            }
        }
    }

    /// Decode the comment packet; returns the comment and any bytes that follow it
    pub fn parse_comment_packet(self, packet: &[u8], config: &TagConfig) -> Result<(VorbisComment, Vec<u8>)> {
        match self {
            OggCodec::Vorbis => {
                let body = packet
                    .strip_prefix(VORBIS_COMMENT_HEADER)
                    .ok_or_else(|| TagError::corrupt("second Vorbis header is not a comment header"))?;
                let (comment, used) = VorbisComment::parse(body, config)?;
                Ok((comment, body[used..].to_vec()))
            }
            OggCodec::Opus => opus::parse_opus_tags(packet, config),
            OggCodec::Speex => {
                let (comment, used) = VorbisComment::parse(packet, config)?;
                Ok((comment, packet[used..].to_vec()))
            }
        }
    }

    pub fn render_comment_packet(self, comment: &VorbisComment, trailing: &[u8]) -> Result<Vec<u8>> {
        match self {
            OggCodec::Vorbis => {
                let mut packet = VORBIS_COMMENT_HEADER.to_vec();
                packet.extend(comment.render()?);
                // Framing bit
                packet.push(1);
                Ok(packet)
            }
            OggCodec::Opus => opus::render_opus_tags(comment, trailing),
            OggCodec::Speex => {
                let mut packet = comment.render()?;
                packet.extend_from_slice(trailing);
                Ok(packet)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(OggCodec::detect(b"\x01vorbis\0\0"), Some(OggCodec::Vorbis));
        assert_eq!(OggCodec::detect(b"OpusHead\x01"), Some(OggCodec::Opus));
        assert_eq!(OggCodec::detect(b"Speex   1.2"), Some(OggCodec::Speex));
        assert_eq!(OggCodec::detect(b"\x7fFLAC"), None);
    }

    #[test]
    fn test_vorbis_comment_packet() {
        let mut comment = VorbisComment::new("Xiph.Org libVorbis I 20200704");
        comment.push("TITLE", "Song");
        let packet = OggCodec::Vorbis.render_comment_packet(&comment, &[]).unwrap();
        assert!(packet.starts_with(b"\x03vorbis"));
        assert_eq!(packet.last(), Some(&1));

        let (back, trailing) = OggCodec::Vorbis
            .parse_comment_packet(&packet, &TagConfig::default())
            .unwrap();
        assert_eq!(back, comment);
        assert_eq!(trailing, vec![1]);
    }

    #[test]
    fn test_speex_extra_headers() {
        let mut header = SPEEX_SIGNATURE.to_vec();
        header.resize(80, 0);
        assert_eq!(OggCodec::Speex.header_packet_count(&header).unwrap(), 1);
        header[68] = 2;
        assert_eq!(OggCodec::Speex.header_packet_count(&header).unwrap(), 3);
        assert!(OggCodec::Speex.header_packet_count(&header[..40]).is_err());
    }
}
