// OPUS format support (in OGG container)
//
// OPUS File Structure:
// - Identification header: "OpusHead" (8 bytes) alone on the first page
// - Comment header: "OpusTags" (8 bytes) followed by a Vorbis comment, possibly
//   followed by binary data (RFC 7845 section 5.2)
// - Audio data pages

use std::path::Path;

use crate::config::TagConfig;
use crate::error::{Result, TagError};
use crate::flac::vorbis::VorbisComment;
use crate::ogg::{self, OggCodec};
use crate::record::TagRecord;
use crate::report::WriteReport;

pub const OPUS_SIGNATURE: &[u8; 8] = b"OpusHead";
pub const OPUS_TAGS: &[u8; 8] = b"OpusTags";

/// Decode an OpusTags packet. Binary data after the comment is returned when its
/// first byte has the low bit set, which asks editors to keep it.
pub fn parse_opus_tags(packet: &[u8], config: &TagConfig) -> Result<(VorbisComment, Vec<u8>)> {
    let body = packet
        .strip_prefix(OPUS_TAGS)
        .ok_or_else(|| TagError::corrupt("second Opus header is not OpusTags"))?;
    let (comment, used) = VorbisComment::parse(body, config)?;

    let trailing = &body[used..];
    let keep = trailing.first().is_some_and(|b| b & 1 == 1);
    Ok((comment, if keep { trailing.to_vec() } else { Vec::new() }))
}

pub fn render_opus_tags(comment: &VorbisComment, trailing: &[u8]) -> Result<Vec<u8>> {
    let mut packet = OPUS_TAGS.to_vec();
    packet.extend(comment.render()?);
    packet.extend_from_slice(trailing);
    Ok(packet)
}

/// Read the OpusTags comment of an .opus file
pub fn read<P: AsRef<Path>>(path: P, config: &TagConfig) -> Result<TagRecord> {
    ogg::vorbis::read(path, Some(OggCodec::Opus), config)
}

pub fn write<P: AsRef<Path>>(path: P, record: &TagRecord, config: &TagConfig) -> Result<WriteReport> {
    ogg::vorbis::write(path, record, Some(OggCodec::Opus), config)
}
