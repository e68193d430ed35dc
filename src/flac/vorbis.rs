// VORBIS_COMMENT implementation, shared by FLAC and the Ogg codecs

use log::{debug, warn};

use crate::config::TagConfig;
use crate::error::{Result, TagError};
use crate::field_mapping::{FieldMappings, StandardField, ValueConverter};
use crate::picture::{Picture, PictureFormat, PictureType};
use crate::record::TagRecord;
use crate::utils::base64;
use crate::utils::io::{write_u32_le, SliceReader};

/// Base64 picture entry
pub const METADATA_BLOCK_PICTURE: &str = "METADATA_BLOCK_PICTURE";
const COVERART: &str = "COVERART";
const COVERART_MIME: &str = "COVERARTMIME";
const COVERART_TYPE: &str = "COVERARTTYPE";
const COVERART_DESCRIPTION: &str = "COVERARTDESCRIPTION";

/// Vendor string written when a file has none
pub const DEFAULT_VENDOR: &str = concat!("tagforge ", env!("CARGO_PKG_VERSION"));

/// Vorbis comment structure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VorbisComment {
    pub vendor_string: String,
    /// Raw `KEY=value` entries in file order
    pub comments: Vec<String>,
    /// An entry was not valid UTF-8 and was decoded with the legacy charset
    pub repaired: bool,
}

impl VorbisComment {
    pub fn new(vendor_string: &str) -> Self {
        VorbisComment {
            vendor_string: vendor_string.to_string(),
            ..Default::default()
        }
    }

    /// Parse a comment block; returns the comment and the number of bytes consumed
    pub fn parse(data: &[u8], config: &TagConfig) -> Result<(Self, usize)> {
        let mut reader = SliceReader::new(data);
        let mut repaired = false;
        let mut text = |bytes: &[u8]| match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => {
                repaired = true;
                config.legacy_charset.decode(bytes)
            }
        };

        let vendor_length = reader.read_u32_le()? as usize;
        let vendor_string = text(reader.take(vendor_length)?);

        let comment_count = reader.read_u32_le()? as usize;
        // Every entry needs at least its length field
        if comment_count > reader.remaining() / 4 {
            return Err(TagError::corrupt(format!(
                "Vorbis comment declares {comment_count} entries in {} bytes",
                reader.remaining()
            )));
        }

        let mut comments = Vec::with_capacity(comment_count);
        for _ in 0..comment_count {
            let length = reader.read_u32_le()? as usize;
            comments.push(text(reader.take(length)?));
        }

        Ok((
            VorbisComment {
                vendor_string,
                comments,
                repaired,
            },
            reader.position(),
        ))
    }

    pub fn render(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let size = 8 + self.vendor_string.len() + self.comments.iter().map(|c| 4 + c.len()).sum::<usize>();
        out.try_reserve_exact(size)?;

        write_u32_le(self.vendor_string.len() as u32, &mut out);
        out.extend_from_slice(self.vendor_string.as_bytes());
        write_u32_le(self.comments.len() as u32, &mut out);
        for comment in &self.comments {
            write_u32_le(comment.len() as u32, &mut out);
            out.extend_from_slice(comment.as_bytes());
        }
        Ok(out)
    }

    /// Values of every entry with this key, compared case-insensitively
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.comments.iter().filter_map(move |entry| {
            let (k, v) = entry.split_once('=')?;
            k.eq_ignore_ascii_case(key).then_some(v)
        })
    }

    pub fn push(&mut self, key: &str, value: &str) {
        self.comments.push(format!("{key}={value}"));
    }

    /// Map the entries onto a record; embedded pictures are decoded too
    pub fn to_record(&self, config: &TagConfig) -> TagRecord {
        let mut record = TagRecord::new();
        let mut values: Vec<(StandardField, Vec<&str>)> = Vec::new();
        let mut legacy_comments = Vec::new();
        let mut legacy_art = Vec::new();

        for entry in &self.comments {
            let Some((raw_key, value)) = entry.split_once('=') else {
                warn!("Dropping Vorbis comment without '=': {entry:?}");
                record.dirty = true;
                continue;
            };
            let key = raw_key.to_ascii_uppercase();

            match key.as_str() {
                METADATA_BLOCK_PICTURE => match decode_block_picture(value) {
                    Ok(picture) => record.add_picture(picture),
                    Err(e) => {
                        warn!("Dropping {METADATA_BLOCK_PICTURE}: {e}");
                        record.dirty = true;
                    }
                },
                COVERART => legacy_art.push(value),
                COVERART_MIME | COVERART_TYPE | COVERART_DESCRIPTION => {}
                FieldMappings::VORBIS_COMMENT => legacy_comments.push(value),
                _ => match FieldMappings::from_vorbis(&key) {
                    Some((field, alias)) => {
                        record.dirty |= alias;
                        match values.iter_mut().find(|(f, _)| *f == field) {
                            Some((_, list)) => list.push(value),
                            None => values.push((field, vec![value])),
                        }
                    }
                    None => record.other.push(entry.clone()),
                },
            }
        }

        let separator = config.multi_value_separator.as_str();
        let joined = |field: StandardField| {
            values
                .iter()
                .find(|(f, _)| *f == field)
                .and_then(|(_, list)| ValueConverter::join_values(list, separator))
        };

        for field in StandardField::ALL {
            match field {
                StandardField::Track | StandardField::DiscNumber => {
                    let total_field = if field == StandardField::Track {
                        StandardField::TrackTotal
                    } else {
                        StandardField::DiscTotal
                    };
                    let (number, embedded_total) = joined(field)
                        .map(|v| ValueConverter::split_number_total(&v))
                        .unwrap_or_default();
                    if embedded_total.is_some() {
                        record.dirty = true;
                    }
                    // A separate total field wins over an embedded one
                    let total = joined(total_field).or(embedded_total);
                    record.set(field, ValueConverter::pad_optional(number, config.number_padding));
                    record.set(total_field, ValueConverter::pad_optional(total, config.number_padding));
                }
                StandardField::TrackTotal | StandardField::DiscTotal => {}
                StandardField::Comment => {
                    let description = joined(field);
                    let legacy = ValueConverter::join_values(&legacy_comments, separator);
                    let comment = match (description, legacy) {
                        (Some(d), Some(c)) => {
                            record.dirty = true;
                            Some(format!("{d}{separator}{c}"))
                        }
                        (d, c) => d.or(c),
                    };
                    record.set(field, comment);
                }
                _ => record.set(field, joined(field)),
            }
        }

        if !legacy_art.is_empty() {
            record.dirty = true;
            let mimes: Vec<&str> = self.get_all(COVERART_MIME).collect();
            let types: Vec<&str> = self.get_all(COVERART_TYPE).collect();
            let descriptions: Vec<&str> = self.get_all(COVERART_DESCRIPTION).collect();

            for (index, data) in legacy_art.iter().enumerate() {
                let Ok(bytes) = base64::decode(data) else {
                    warn!("Dropping undecodable {COVERART} entry");
                    continue;
                };
                if bytes.is_empty() {
                    continue;
                }
                if let Some(mime) = mimes.get(index) {
                    if PictureFormat::from_mime_type(mime) == PictureFormat::Unknown {
                        debug!("{COVERART} entry declares unsupported MIME type {mime}");
                    }
                }
                let picture_type = types
                    .get(index)
                    .and_then(|t| t.trim().parse::<u32>().ok())
                    .and_then(PictureType::from_u32)
                    .unwrap_or_default();
                let mut picture = Picture::new(picture_type, bytes);
                picture.description = descriptions
                    .get(index)
                    .filter(|d| !d.is_empty())
                    .map(|d| d.to_string());
                record.add_picture(picture);
            }
        }

        record.dirty |= self.repaired;
        record
    }

    /// Replace every entry with ones built from the record. Pictures become
    /// METADATA_BLOCK_PICTURE entries when `embed_pictures` is set.
    pub fn set_record(&mut self, record: &TagRecord, config: &TagConfig, embed_pictures: bool) {
        self.comments.clear();
        let separator = config.multi_value_separator.as_str();
        let pad = |value: Option<&str>| value.map(|v| ValueConverter::pad_number(v, config.number_padding));

        for field in StandardField::ALL {
            let key = FieldMappings::to_vorbis(field);
            let value = if field.is_numeric() {
                pad(record.get(field))
            } else {
                record.get(field).map(str::to_string)
            };
            let Some(value) = value else { continue };

            if config.vorbis.splits(field) {
                for part in ValueConverter::split_values(&value, separator) {
                    self.push(key, part);
                }
            } else {
                self.push(key, &value);
            }
        }

        self.comments.extend(record.other.iter().cloned());

        if embed_pictures {
            for picture in &record.pictures {
                let encoded = base64::encode(&picture.to_flac_bytes());
                self.push(METADATA_BLOCK_PICTURE, &encoded);
            }
        }
    }
}

fn decode_block_picture(value: &str) -> Result<Picture> {
    Picture::from_flac_bytes(&base64::decode(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SplitFields;
    use pretty_assertions::assert_eq;

    fn comment(entries: &[&str]) -> VorbisComment {
        VorbisComment {
            vendor_string: "test vendor".to_string(),
            comments: entries.iter().map(|e| e.to_string()).collect(),
            repaired: false,
        }
    }

    #[test]
    fn test_parse_render() {
        let vc = comment(&["TITLE=Song", "ARTIST=A"]);
        let bytes = vc.render().unwrap();
        let (back, consumed) = VorbisComment::parse(&bytes, &TagConfig::default()).unwrap();
        assert_eq!(back, vc);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_parse_rejects_bad_lengths() {
        let mut bytes = comment(&["TITLE=Song"]).render().unwrap();
        let len = bytes.len();
        bytes[len - 14..len - 10].copy_from_slice(&1000u32.to_le_bytes());
        assert!(VorbisComment::parse(&bytes, &TagConfig::default()).is_err());

        let mut bytes = comment(&[]).render().unwrap();
        let len = bytes.len();
        bytes[len - 4..].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(VorbisComment::parse(&bytes, &TagConfig::default()).is_err());
    }

    #[test]
    fn test_case_insensitive_keys_and_joining() {
        let vc = comment(&["title=Song", "Artist=A", "ARTIST=B", "CUSTOM=kept", "artist=C"]);
        let record = vc.to_record(&TagConfig::default());
        assert_eq!(record.title.as_deref(), Some("Song"));
        assert_eq!(record.artist.as_deref(), Some("A - B - C"));
        assert_eq!(record.other, vec!["CUSTOM=kept".to_string()]);
        assert!(!record.dirty);
    }

    #[test]
    fn test_track_totals() {
        let record = comment(&["TRACKNUMBER=3/12"]).to_record(&TagConfig::default());
        assert_eq!(record.track.as_deref(), Some("3"));
        assert_eq!(record.track_total.as_deref(), Some("12"));
        assert!(record.dirty);

        let record = comment(&["TRACKNUMBER=3/12", "TRACKTOTAL=10"]).to_record(&TagConfig::default());
        assert_eq!(record.track_total.as_deref(), Some("10"));

        let record = comment(&["DISCNUMBER=1", "TOTALDISCS=2"]).to_record(&TagConfig::default());
        assert_eq!(record.disc_total.as_deref(), Some("2"));
        assert!(record.dirty);
    }

    #[test]
    fn test_description_wins_over_comment() {
        let record = comment(&["COMMENT=old", "DESCRIPTION=new"]).to_record(&TagConfig::default());
        assert_eq!(record.comment.as_deref(), Some("new - old"));
        assert!(record.dirty);

        let record = comment(&["COMMENT=only"]).to_record(&TagConfig::default());
        assert_eq!(record.comment.as_deref(), Some("only"));
    }

    #[test]
    fn test_set_record_separates_totals() {
        let mut record = TagRecord::new();
        record.track = Some("3".to_string());
        record.track_total = Some("12".to_string());
        record.comment = Some("text".to_string());
        record.other = vec!["CUSTOM=kept".to_string()];

        let mut config = TagConfig::default();
        config.number_padding = Some(2);
        let mut vc = VorbisComment::new("v");
        vc.set_record(&record, &config, true);
        assert_eq!(
            vc.comments,
            vec!["TRACKNUMBER=03", "TRACKTOTAL=12", "DESCRIPTION=text", "CUSTOM=kept"]
        );
    }

    #[test]
    fn test_split_join_idempotence() {
        let mut config = TagConfig::default();
        config.vorbis = SplitFields::all();
        let mut record = TagRecord::new();
        record.artist = Some("A - B - C".to_string());

        let mut vc = VorbisComment::new("v");
        vc.set_record(&record, &config, false);
        assert_eq!(vc.get_all("ARTIST").count(), 3);
        assert_eq!(vc.to_record(&config), record);
    }

    #[test]
    fn test_split_skips_blank_segments() {
        let mut config = TagConfig::default();
        config.vorbis = SplitFields::all();
        let mut record = TagRecord::new();
        record.artist = Some("a - ".to_string());
        record.genre = Some(" - ".to_string());

        let mut vc = VorbisComment::new("v");
        vc.set_record(&record, &config, false);
        assert_eq!(vc.comments, vec!["ARTIST=a"]);
        assert_eq!(vc.to_record(&config).artist.as_deref(), Some("a"));
    }

    #[test]
    fn test_pictures() {
        let mut record = TagRecord::new();
        record.add_picture(Picture::new(PictureType::CoverFront, vec![0xFF, 0xD8, 1, 2]));
        let mut vc = VorbisComment::new("v");
        vc.set_record(&record, &TagConfig::default(), true);
        assert!(vc.comments[0].starts_with("METADATA_BLOCK_PICTURE="));
        assert_eq!(vc.to_record(&TagConfig::default()), record);
    }

    #[test]
    fn test_malformed_block_picture_is_dropped() {
        let mut bytes = Picture::new(PictureType::CoverFront, vec![0xFF, 0xD8, 1, 2]).to_flac_bytes();
        let len = bytes.len();
        // Declared data length larger than what follows
        bytes[len - 8..len - 4].copy_from_slice(&100u32.to_be_bytes());
        let entry = format!("METADATA_BLOCK_PICTURE={}", base64::encode(&bytes));

        let record = comment(&[&entry, "TITLE=t"]).to_record(&TagConfig::default());
        assert!(record.pictures.is_empty());
        assert_eq!(record.title.as_deref(), Some("t"));
        assert!(record.dirty);

        let record = comment(&["METADATA_BLOCK_PICTURE=!!notbase64"]).to_record(&TagConfig::default());
        assert!(record.pictures.is_empty());
        assert!(record.dirty);
    }

    #[test]
    fn test_legacy_coverart() {
        let data = base64::encode(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
        let art = format!("COVERART={data}");
        let record = comment(&[&art, "COVERARTMIME=image/png", "COVERARTTYPE=4"])
            .to_record(&TagConfig::default());
        assert_eq!(record.pictures.len(), 1);
        assert_eq!(record.pictures[0].picture_type, PictureType::CoverBack);
        assert!(record.dirty);
        assert!(record.other.is_empty());
    }
}
