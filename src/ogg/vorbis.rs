// Comment headers of Ogg Vorbis, Speex and Opus streams

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, info, warn};

use super::page::{paginate, OggPage, PacketAssembler};
use super::OggCodec;
use crate::config::TagConfig;
use crate::error::{Result, TagError};
use crate::flac::vorbis::{VorbisComment, DEFAULT_VENDOR};
use crate::record::TagRecord;
use crate::report::WriteReport;
use crate::rewrite::{apply_splices, replace_file, Splice};
use crate::utils::io::copy_bytes;

/// Header layout of the first logical stream of an Ogg file
#[derive(Debug, Clone)]
pub struct OggHeaders {
    pub codec: OggCodec,
    pub serial: u32,
    /// Sequence number of the identification page; header pages follow it
    pub bos_sequence: u32,
    /// End of the identification page
    pub first_page_end: u64,
    /// End of the last page carrying header packets
    pub header_end: u64,
    /// Header packets after the identification packet; the comment comes first
    pub packets: Vec<Vec<u8>>,
    /// Pages of this stream between `first_page_end` and `header_end`
    pub page_count: u32,
    /// Pages of other streams found in the header region, kept verbatim
    pub foreign_pages: Vec<OggPage>,
}

impl OggHeaders {
    /// Walk the header pages. `expected` rejects streams of another codec.
    pub fn read<R: Read>(reader: &mut R, expected: Option<OggCodec>) -> Result<Self> {
        let first = OggPage::read(reader)?.ok_or_else(|| TagError::not_format("Ogg"))?;
        if !first.is_bos() {
            return Err(TagError::corrupt("Ogg stream does not start with a BOS page"));
        }

        let mut assembler = PacketAssembler::default();
        assembler.push_page(&first)?;
        let [identification] = assembler.packets.as_slice() else {
            return Err(TagError::corrupt("identification header is not alone on the first page"));
        };

        let codec = OggCodec::detect(identification)
            .ok_or_else(|| TagError::not_format(expected.map_or("Ogg Vorbis", OggCodec::name)))?;
        if expected.is_some_and(|e| e != codec) {
            return Err(TagError::not_format(expected.map_or("Ogg", OggCodec::name)));
        }
        let needed = codec.header_packet_count(identification)?;

        let serial = first.header.bitstream_serial;
        let bos_sequence = first.header.page_sequence;
        let first_page_end = first.size() as u64;
        let mut offset = first_page_end;
        let mut assembler = PacketAssembler::default();
        let mut page_count = 0;
        let mut foreign_pages = Vec::new();

        while assembler.packets.len() < needed {
            let page = OggPage::read(reader)?
                .ok_or_else(|| TagError::corrupt(format!("{} stream ends inside its headers", codec.name())))?;
            offset += page.size() as u64;

            if page.header.bitstream_serial != serial {
                foreign_pages.push(page);
                continue;
            }
            assembler.push_page(&page)?;
            page_count += 1;
        }

        if assembler.packets.len() > needed || assembler.has_partial() {
            return Err(TagError::UnsupportedFeature(format!(
                "{} audio data shares a page with the header packets",
                codec.name()
            )));
        }

        Ok(OggHeaders {
            codec,
            serial,
            bos_sequence,
            first_page_end,
            header_end: offset,
            packets: assembler.packets,
            page_count,
            foreign_pages,
        })
    }

    pub fn comment(&self, config: &TagConfig) -> Result<(VorbisComment, Vec<u8>)> {
        self.codec.parse_comment_packet(&self.packets[0], config)
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

/// Read the comment header of an Ogg file
pub fn read<P: AsRef<Path>>(path: P, expected: Option<OggCodec>, config: &TagConfig) -> Result<TagRecord> {
    let mut reader = open(path.as_ref())?;
    let headers = OggHeaders::read(&mut reader, expected)?;
    let (comment, _) = headers.comment(config)?;
    Ok(comment.to_record(config))
}

/// Replace the comment header, re-paginating the header packets and renumbering the
/// pages that follow when the header page count changes
pub fn write<P: AsRef<Path>>(
    path: P,
    record: &TagRecord,
    expected: Option<OggCodec>,
    config: &TagConfig,
) -> Result<WriteReport> {
    let path = path.as_ref();
    let report = WriteReport::new();

    let mut reader = open(path)?;
    let mut headers = OggHeaders::read(&mut reader, expected)?;
    drop(reader);

    let (mut comment, trailing) = match headers.comment(config) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Replacing unreadable {} comment header: {e}", headers.codec.name());
            (VorbisComment::new(DEFAULT_VENDOR), Vec::new())
        }
    };
    comment.set_record(record, config, true);
    headers.packets[0] = headers.codec.render_comment_packet(&comment, &trailing)?;

    let pages = paginate(&headers.packets, headers.serial, headers.bos_sequence.wrapping_add(1), 0);
    let mut region = Vec::new();
    for page in headers.foreign_pages.iter().chain(&pages) {
        region.extend(page.to_bytes());
    }

    let delta = i64::from(pages.len() as u32) - i64::from(headers.page_count);
    if delta == 0 {
        let splice = Splice::new(headers.first_page_end, headers.header_end, region);
        let strategy = apply_splices(path, vec![splice])?;
        info!("Wrote {} comment to {} ({strategy:?})", headers.codec.name(), path.display());
        return Ok(report);
    }

    debug!(
        "Header pages of {} go from {} to {}, renumbering",
        path.display(),
        headers.page_count,
        pages.len()
    );
    replace_file(path, |source, dest| {
        copy_bytes(source, dest, headers.first_page_end)?;
        dest.write_all(&region)?;
        source.seek(SeekFrom::Start(headers.header_end))?;
        renumber_pages(source, dest, headers.serial, delta)
    })?;
    info!("Rewrote {} with a new comment header", path.display());
    Ok(report)
}

/// Copy the remaining pages, shifting the sequence numbers of stream `serial` by `delta`.
/// Bytes that do not parse as pages are copied through unchanged.
fn renumber_pages<R: Read + Seek, W: Write>(source: &mut R, dest: &mut W, serial: u32, delta: i64) -> Result<()> {
    loop {
        let position = source.stream_position()?;
        match OggPage::read(source) {
            Ok(Some(mut page)) => {
                if page.header.bitstream_serial == serial {
                    page.header.page_sequence = (i64::from(page.header.page_sequence) + delta) as u32;
                    page.update_crc();
                }
                page.write_to(dest)?;
            }
            Ok(None) => return Ok(()),
            Err(TagError::NotThisFormat(_)) | Err(TagError::CorruptData(_)) => {
                warn!("Copying unparseable data after offset {position} verbatim");
                source.seek(SeekFrom::Start(position))?;
                std::io::copy(source, dest)?;
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}
