// ID3 metadata handling module
pub mod frames;
pub mod genres;
pub mod tag;
pub mod v1;
pub mod v2;

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use log::{debug, info, warn};

pub use v1::Id3v1Tag;
pub use v2::{Id3v2Header, Id3v2Tag};

use crate::ape;
use crate::config::TagConfig;
use crate::error::Result;
use crate::record::TagRecord;
use crate::report::WriteReport;
use crate::rewrite::{apply_splices, Splice};

/// Read ID3v2, falling back to ID3v1 when v2 yields nothing. `None` when neither exists.
pub fn read_from<R: Read + Seek>(
    reader: &mut R,
    file_len: u64,
    config: &TagConfig,
) -> Result<Option<TagRecord>> {
    let mut found = None;

    if let Some(tag) = Id3v2Tag::read(reader, file_len)? {
        let record = tag::frames_to_record(&tag.frames, tag.header.major, config);
        if !record.is_empty() {
            return Ok(Some(record));
        }
        found = Some(record);
    }

    if let Some(buffer) = Id3v1Tag::find(reader, file_len)? {
        debug!("Using ID3v1 tag");
        let mut record = Id3v1Tag::parse(&buffer, config.legacy_charset).to_record(config);
        record.dirty |= found.as_ref().is_some_and(|r| r.dirty);
        return Ok(Some(record));
    }

    Ok(found)
}

/// Read the ID3 tags of an MP3/MP2 file
pub fn read<P: AsRef<Path>>(path: P, config: &TagConfig) -> Result<TagRecord> {
    let file = File::open(path.as_ref())?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    Ok(read_from(&mut reader, file_len, config)?.unwrap_or_default())
}

/// Byte ranges of every tag an ID3-tagged file may carry
#[derive(Debug, Clone, Copy, Default)]
struct TagRegions {
    id3v2_len: u64,
    id3v2_major: Option<u8>,
    /// Start of the trailing APE + ID3v1 block
    tail_start: u64,
    file_len: u64,
}

fn scan<R: Read + Seek>(reader: &mut R, file_len: u64) -> Result<TagRegions> {
    let header = v2::find_id3v2(reader)?;
    let id3v2_len = header.map_or(0, |h| h.total_size().min(file_len));

    let mut tail_start = file_len;
    if Id3v1Tag::find(reader, file_len)?.is_some() {
        tail_start -= Id3v1Tag::TAG_SIZE as u64;
    }
    // An APE tag must not coexist with ID3
    if let Some(location) = ape::find_footer(reader, tail_start)? {
        debug!("Stripping APE tag at offset {}", location.start);
        tail_start = location.start;
    }

    Ok(TagRegions {
        id3v2_len,
        id3v2_major: header.map(|h| h.major),
        tail_start: tail_start.max(id3v2_len),
        file_len,
    })
}

/// Write ID3v2 (and optionally ID3v1) tags, removing any APE tag
pub fn write<P: AsRef<Path>>(path: P, record: &TagRecord, config: &TagConfig) -> Result<WriteReport> {
    let path = path.as_ref();
    let mut report = WriteReport::new();

    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let regions = scan(&mut reader, file_len)?;

    let strip = config.id3.strip_empty_tags && record.is_empty();
    let major = config.id3.version.major();

    let id3v2 = if config.id3.write_id3v2 && !strip {
        let mut frames = tag::record_to_frames(record, config, &mut report)?;
        if regions.id3v2_major == Some(major) {
            match Id3v2Tag::read(&mut reader, file_len) {
                Ok(Some(old)) => frames.extend(
                    old.frames
                        .into_iter()
                        .filter(|f| !f.discard_on_alter && !tag::is_managed(f)),
                ),
                Ok(None) => {}
                Err(e) => warn!("Not carrying frames over from unreadable tag: {e}"),
            }
        }
        Id3v2Tag::render(&frames, major, config.id3.padding, regions.id3v2_len as usize)?
    } else {
        Vec::new()
    };

    let id3v1 = if config.id3.write_id3v1 && !strip {
        Id3v1Tag::from_record(record).render(config, &mut report)?.to_vec()
    } else {
        Vec::new()
    };
    drop(reader);

    let splices = vec![
        Splice::new(0, regions.id3v2_len, id3v2),
        Splice::new(regions.tail_start, regions.file_len, id3v1),
    ];
    let strategy = apply_splices(path, splices)?;
    info!("Wrote ID3 tags to {} ({strategy:?})", path.display());
    Ok(report)
}
