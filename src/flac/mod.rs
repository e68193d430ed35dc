// FLAC metadata handling module

pub mod metadata;
pub mod vorbis;

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use log::{debug, info, warn};

pub use metadata::{FlacMetadata, FlacMetadataBlock, FlacMetadataBlockType, FLAC_SIGNATURE};
pub use vorbis::VorbisComment;

use crate::config::TagConfig;
use crate::error::Result;
use crate::id3::{self, Id3v1Tag};
use crate::picture::Picture;
use crate::record::TagRecord;
use crate::report::{TagWarning, WriteReport};
use crate::rewrite::{apply_splices, Splice};
use metadata::{render_head, MAX_BLOCK_LENGTH};

/// Padding added when the new metadata no longer fits
pub const DEFAULT_PADDING: usize = 4096;

fn open(path: &Path) -> Result<(BufReader<File>, u64)> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    Ok((BufReader::new(file), file_len))
}

/// Read the Vorbis comment and PICTURE blocks of a FLAC file
pub fn read<P: AsRef<Path>>(path: P, config: &TagConfig) -> Result<TagRecord> {
    let (mut reader, file_len) = open(path.as_ref())?;
    let metadata = FlacMetadata::read(&mut reader, file_len)?;
    record_from_metadata(&metadata, &mut reader, file_len, config)
}

fn record_from_metadata<R: Read + Seek>(
    metadata: &FlacMetadata,
    reader: &mut R,
    file_len: u64,
    config: &TagConfig,
) -> Result<TagRecord> {
    let mut record = match metadata.blocks_of(FlacMetadataBlockType::VorbisComment).next() {
        Some(block) => {
            let (comment, _) = VorbisComment::parse(&block.data, config)?;
            comment.to_record(config)
        }
        None => match id3::read_from(reader, file_len, config)? {
            Some(mut record) => {
                warn!("FLAC file has no Vorbis comment, using its ID3 tag");
                record.dirty = true;
                record
            }
            None => TagRecord::new(),
        },
    };

    for block in metadata.blocks_of(FlacMetadataBlockType::Picture) {
        match Picture::from_flac_bytes(&block.data) {
            Ok(picture) => record.add_picture(picture),
            Err(e) => {
                warn!("Dropping invalid PICTURE block: {e}");
                record.dirty = true;
            }
        }
    }

    // Foreign tags are stripped by the next save
    record.dirty |= metadata.id3v2_len > 0;
    Ok(record)
}

/// Rebuild the metadata chain from `record`, keeping STREAMINFO and every block
/// that is not a comment, picture or padding block
pub fn write<P: AsRef<Path>>(path: P, record: &TagRecord, config: &TagConfig) -> Result<WriteReport> {
    let path = path.as_ref();
    let mut report = WriteReport::new();

    let (mut reader, file_len) = open(path)?;
    let metadata = FlacMetadata::read(&mut reader, file_len)?;
    let id3v1_start = Id3v1Tag::find(&mut reader, file_len)?
        .map(|_| file_len - Id3v1Tag::TAG_SIZE as u64)
        .filter(|&start| start >= metadata.audio_start);
    drop(reader);

    let vendor = metadata
        .blocks_of(FlacMetadataBlockType::VorbisComment)
        .next()
        .and_then(|block| match VorbisComment::parse(&block.data, config) {
            Ok((comment, _)) => Some(comment.vendor_string),
            Err(e) => {
                debug!("Replacing unreadable Vorbis comment: {e}");
                None
            }
        })
        .unwrap_or_else(|| vorbis::DEFAULT_VENDOR.to_string());

    let mut blocks: Vec<FlacMetadataBlock> = metadata
        .blocks
        .iter()
        .filter(|block| {
            !matches!(
                block.block_type,
                FlacMetadataBlockType::VorbisComment
                    | FlacMetadataBlockType::Picture
                    | FlacMetadataBlockType::Padding
            )
        })
        .cloned()
        .collect();

    let mut comment = VorbisComment::new(&vendor);
    comment.set_record(record, config, false);
    blocks.push(FlacMetadataBlock::new(
        FlacMetadataBlockType::VorbisComment,
        comment.render()?,
    ));

    for (index, picture) in record.pictures.iter().enumerate() {
        let data = picture.to_flac_bytes();
        if data.len() > MAX_BLOCK_LENGTH {
            report.warn(TagWarning::PictureSkipped {
                index,
                reason: format!("{} bytes do not fit in a FLAC metadata block", data.len()),
            });
            continue;
        }
        blocks.push(FlacMetadataBlock::new(FlacMetadataBlockType::Picture, data));
    }

    // Everything before the first audio frame is ours, a leading ID3v2 tag included
    let old_head = metadata.audio_start;
    let used = 4 + blocks.iter().map(|b| b.size() as u64).sum::<u64>();
    match old_head.checked_sub(used) {
        Some(0) => {}
        Some(slack) if slack >= 4 && slack - 4 <= MAX_BLOCK_LENGTH as u64 => {
            blocks.push(FlacMetadataBlock::padding((slack - 4) as usize));
        }
        _ => {
            debug!("Metadata of {} no longer fits, adding fresh padding", path.display());
            blocks.push(FlacMetadataBlock::padding(DEFAULT_PADDING));
        }
    }

    let mut splices = vec![Splice::new(0, old_head, render_head(&blocks)?)];
    if let Some(start) = id3v1_start {
        debug!("Stripping ID3v1 tag from {}", path.display());
        splices.push(Splice::remove(start, file_len));
    }

    let strategy = apply_splices(path, splices)?;
    info!("Wrote FLAC metadata to {} ({strategy:?})", path.display());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_mapping::StandardField;
    use crate::picture::PictureType;
    use crate::rewrite::Strategy;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::io::Cursor;

    const FRAMES: &[u8] = b"\xFF\xF8\x69\x08audio-frames";

    fn flac_file(blocks: &[FlacMetadataBlock]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.flac");
        let mut contents = render_head(blocks).unwrap();
        contents.extend_from_slice(FRAMES);
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    fn stream_info() -> FlacMetadataBlock {
        FlacMetadataBlock::new(FlacMetadataBlockType::StreamInfo, vec![0x22; 34])
    }

    fn record() -> TagRecord {
        let mut record = TagRecord::new();
        record.set(StandardField::Title, Some("Title".to_string()));
        record.set(StandardField::Track, Some("3".to_string()));
        record.set(StandardField::TrackTotal, Some("12".to_string()));
        record.add_picture(Picture::new(PictureType::CoverFront, vec![0xFF, 0xD8, 0xFF, 0xE0]));
        record
    }

    fn read_blocks(path: &Path) -> FlacMetadata {
        let data = fs::read(path).unwrap();
        let len = data.len() as u64;
        FlacMetadata::read(&mut Cursor::new(data), len).unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let seek_table = FlacMetadataBlock::new(FlacMetadataBlockType::SeekTable, vec![0; 18]);
        let (_dir, path) = flac_file(&[stream_info(), seek_table.clone()]);
        let config = TagConfig::default();

        write(&path, &record(), &config).unwrap();
        assert_eq!(read(&path, &config).unwrap(), record());
        assert!(fs::read(&path).unwrap().ends_with(FRAMES));

        let types: Vec<_> = read_blocks(&path).blocks.iter().map(|b| b.block_type).collect();
        assert_eq!(
            types,
            vec![
                FlacMetadataBlockType::StreamInfo,
                FlacMetadataBlockType::SeekTable,
                FlacMetadataBlockType::VorbisComment,
                FlacMetadataBlockType::Picture,
                FlacMetadataBlockType::Padding,
            ]
        );
        assert_eq!(read_blocks(&path).blocks[1], seek_table);
    }

    #[test]
    fn test_padding_absorbs_changes() {
        let (_dir, path) = flac_file(&[stream_info()]);
        let config = TagConfig::default();
        write(&path, &record(), &config).unwrap();
        let len = fs::metadata(&path).unwrap().len();

        let mut smaller = record();
        smaller.pictures.clear();
        write(&path, &smaller, &config).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), len);
        assert_eq!(read(&path, &config).unwrap(), smaller);
    }

    #[test]
    fn test_vendor_and_other_entries_are_kept() {
        let mut comment = VorbisComment::new("reference libFLAC 1.4.3");
        comment.push("REPLAYGAIN_TRACK_GAIN", "-6.5 dB");
        let vc = FlacMetadataBlock::new(FlacMetadataBlockType::VorbisComment, comment.render().unwrap());
        let (_dir, path) = flac_file(&[stream_info(), vc]);

        let config = TagConfig::default();
        let mut record = read(&path, &config).unwrap();
        assert_eq!(record.other, vec!["REPLAYGAIN_TRACK_GAIN=-6.5 dB".to_string()]);
        record.set(StandardField::Album, Some("Album".to_string()));
        write(&path, &record, &config).unwrap();

        let metadata = read_blocks(&path);
        let block = metadata.blocks_of(FlacMetadataBlockType::VorbisComment).next().unwrap();
        let (comment, _) = VorbisComment::parse(&block.data, &config).unwrap();
        assert_eq!(comment.vendor_string, "reference libFLAC 1.4.3");
        assert_eq!(comment.comments, vec!["ALBUM=Album", "REPLAYGAIN_TRACK_GAIN=-6.5 dB"]);
    }

    #[test]
    fn test_id3_fallback_and_stripping() {
        let id3v2 = id3::Id3v2Tag::render(
            &[id3::frames::Frame::new("TIT2", b"\x00Legacy".to_vec())],
            4,
            0,
            0,
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.flac");
        let mut contents = id3v2;
        contents.extend(render_head(&[stream_info()]).unwrap());
        contents.extend_from_slice(FRAMES);
        fs::write(&path, contents).unwrap();

        let config = TagConfig::default();
        let record = read(&path, &config).unwrap();
        assert_eq!(record.title.as_deref(), Some("Legacy"));
        assert!(record.dirty);

        write(&path, &record, &config).unwrap();
        let data = fs::read(&path).unwrap();
        assert!(data.starts_with(FLAC_SIGNATURE));
        let back = read(&path, &config).unwrap();
        assert_eq!(back.title.as_deref(), Some("Legacy"));
        assert!(!back.dirty);
    }

    #[test]
    fn test_trailing_id3v1_is_removed() {
        let (_dir, path) = flac_file(&[stream_info(), FlacMetadataBlock::padding(200)]);
        let mut contents = fs::read(&path).unwrap();
        let mut v1 = [0u8; 128];
        v1[..3].copy_from_slice(b"TAG");
        contents.extend_from_slice(&v1);
        fs::write(&path, &contents).unwrap();

        write(&path, &record(), &TagConfig::default()).unwrap();
        assert!(fs::read(&path).unwrap().ends_with(FRAMES));
    }

    #[test]
    fn test_unchanged_record_keeps_file() {
        let (_dir, path) = flac_file(&[stream_info()]);
        let config = TagConfig::default();
        write(&path, &record(), &config).unwrap();
        let before = fs::read(&path).unwrap();

        let record = read(&path, &config).unwrap();
        write(&path, &record, &config).unwrap();
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(apply_splices(&path, Vec::new()).unwrap(), Strategy::Unchanged);
    }
}
