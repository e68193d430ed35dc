// MP4/M4A metadata through mp4ameta
//
// iTunes-style items live in moov/udta/meta/ilst. Track and disc numbers are
// stored as integer pairs (trkn, disk) and converted to display strings here.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{debug, info};
use mp4ameta::{Img, ImgFmt, Tag};

use crate::config::TagConfig;
use crate::error::{Result, TagError};
use crate::field_mapping::{StandardField, ValueConverter};
use crate::picture::{Picture, PictureFormat, PictureType};
use crate::record::TagRecord;
use crate::report::{TagWarning, WriteReport};

pub const MP4_SIGNATURE: &[u8; 4] = b"ftyp";

fn check_signature(path: &Path) -> Result<()> {
    let mut header = [0u8; 8];
    let mut file = File::open(path)?;
    let read = file.read(&mut header)?;
    if read < 8 || &header[4..8] != MP4_SIGNATURE {
        return Err(TagError::not_format("MP4"));
    }
    Ok(())
}

/// Read the iTunes metadata of an MP4 file
pub fn read<P: AsRef<Path>>(path: P, config: &TagConfig) -> Result<TagRecord> {
    let path = path.as_ref();
    check_signature(path)?;
    let tag = Tag::read_from_path(path)?;
    Ok(record_from_tag(&tag, config))
}

/// Replace the mapped items, leaving every other atom alone
pub fn write<P: AsRef<Path>>(path: P, record: &TagRecord, config: &TagConfig) -> Result<WriteReport> {
    let path = path.as_ref();
    check_signature(path)?;
    let mut report = WriteReport::new();

    let mut tag = Tag::read_from_path(path)?;
    apply_record(&mut tag, record, config, &mut report);
    tag.write_to_path(path)?;

    info!("Wrote MP4 metadata to {}", path.display());
    Ok(report)
}

fn joined<'a>(values: impl Iterator<Item = &'a str>, separator: &str) -> Option<String> {
    ValueConverter::join_values(&values.collect::<Vec<_>>(), separator)
}

pub fn record_from_tag(tag: &Tag, config: &TagConfig) -> TagRecord {
    let separator = config.multi_value_separator.as_str();
    let number = |n: Option<u16>| ValueConverter::pad_optional(n.map(|n| n.to_string()), config.number_padding);
    let mut record = TagRecord::new();

    record.set(StandardField::Title, tag.title().map(str::to_string));
    record.set(StandardField::Artist, joined(tag.artists(), separator));
    record.set(StandardField::AlbumArtist, joined(tag.album_artists(), separator));
    record.set(StandardField::Album, tag.album().map(str::to_string));
    record.set(StandardField::Year, tag.year().map(str::to_string));
    record.set(StandardField::Genre, joined(tag.genres(), separator));
    record.set(StandardField::Comment, joined(tag.comments(), separator));
    record.set(StandardField::Composer, joined(tag.composers(), separator));
    record.set(StandardField::Copyright, tag.copyright().map(str::to_string));
    record.set(StandardField::EncodedBy, tag.encoder().map(str::to_string));

    // Zero means "unset" in trkn and disk
    record.set(StandardField::Track, number(tag.track_number().filter(|&n| n > 0)));
    record.set(StandardField::TrackTotal, number(tag.total_tracks().filter(|&n| n > 0)));
    record.set(StandardField::DiscNumber, number(tag.disc_number().filter(|&n| n > 0)));
    record.set(StandardField::DiscTotal, number(tag.total_discs().filter(|&n| n > 0)));

    for artwork in tag.artworks() {
        record.add_picture(Picture::new(PictureType::CoverFront, artwork.data.to_vec()));
    }
    record
}

fn parse_number(field: StandardField, value: Option<&str>) -> Option<u16> {
    let value = value?;
    match value.trim().parse::<u16>() {
        Ok(n) => Some(n),
        Err(_) => {
            debug!("MP4 {field} must be numeric, skipping {value:?}");
            None
        }
    }
}

pub fn apply_record(tag: &mut Tag, record: &TagRecord, config: &TagConfig, report: &mut WriteReport) {
    let separator = config.multi_value_separator.as_str();

    tag.remove_title();
    tag.remove_artists();
    tag.remove_album_artists();
    tag.remove_album();
    tag.remove_year();
    tag.remove_genres();
    tag.remove_comments();
    tag.remove_composers();
    tag.remove_copyright();
    tag.remove_encoder();
    tag.remove_track_number();
    tag.remove_total_tracks();
    tag.remove_disc_number();
    tag.remove_total_discs();
    tag.remove_artworks();

    if let Some(v) = &record.title {
        tag.set_title(v.as_str());
    }
    if let Some(v) = &record.album {
        tag.set_album(v.as_str());
    }
    if let Some(v) = &record.year {
        tag.set_year(v.as_str());
    }
    if let Some(v) = &record.copyright {
        tag.set_copyright(v.as_str());
    }
    if let Some(v) = &record.encoded_by {
        tag.set_encoder(v.as_str());
    }

    // Multi-valued atoms get one data entry per value
    let multi: [(StandardField, fn(&mut Tag, String)); 5] = [
        (StandardField::Artist, |t, v| t.add_artist(v)),
        (StandardField::AlbumArtist, |t, v| t.add_album_artist(v)),
        (StandardField::Genre, |t, v| t.add_genre(v)),
        (StandardField::Comment, |t, v| t.add_comment(v)),
        (StandardField::Composer, |t, v| t.add_composer(v)),
    ];
    for (field, add) in multi {
        if let Some(value) = record.get(field) {
            for part in ValueConverter::split_values(value, separator) {
                add(tag, part.to_string());
            }
        }
    }

    if let Some(n) = parse_number(StandardField::Track, record.get(StandardField::Track)) {
        tag.set_track_number(n);
    }
    if let Some(n) = parse_number(StandardField::TrackTotal, record.get(StandardField::TrackTotal)) {
        tag.set_total_tracks(n);
    }
    if let Some(n) = parse_number(StandardField::DiscNumber, record.get(StandardField::DiscNumber)) {
        tag.set_disc_number(n);
    }
    if let Some(n) = parse_number(StandardField::DiscTotal, record.get(StandardField::DiscTotal)) {
        tag.set_total_discs(n);
    }

    for field in [StandardField::OriginalArtist, StandardField::Url] {
        if record.get(field).is_some() {
            debug!("MP4 has no atom for {field}");
        }
    }

    // Only one cover is written
    let mut written = false;
    for (index, picture) in record.pictures.iter().enumerate() {
        let fmt = match picture.format() {
            PictureFormat::Jpeg => ImgFmt::Jpeg,
            PictureFormat::Png => ImgFmt::Png,
            PictureFormat::Bmp => ImgFmt::Bmp,
            other => {
                report.warn(TagWarning::PictureSkipped {
                    index,
                    reason: format!("{other:?} images cannot be stored in MP4"),
                });
                continue;
            }
        };
        if written {
            report.warn(TagWarning::PicturesDropped {
                kept: 1,
                dropped: record.pictures.len() - index,
            });
            break;
        }
        tag.set_artwork(Img::new(fmt, picture.data.clone()));
        written = true;
    }
}
