// Mapping between ID3v2 frames and the tag record

use log::{debug, warn};

use crate::config::{EncoderCapabilities, GenreStyle, Id3TextEncoding, TagConfig};
use crate::error::Result;
use crate::field_mapping::{FieldMappings, StandardField, ValueConverter};
use crate::id3::frames::{
    decode_text_frame, encode_text_frame, parse_genre, parse_picture, parse_user_url,
    render_picture, render_user_url, CommentFrame, Frame,
};
use crate::id3::genres::genre_index;
use crate::record::TagRecord;
use crate::report::{TagWarning, WriteReport};
use crate::utils::encoding::TextEncoding;

/// Build a record from parsed frames
pub fn frames_to_record(frames: &[Frame], major: u8, config: &TagConfig) -> TagRecord {
    let mut record = TagRecord::new();
    let legacy = config.legacy_charset;
    let separator = config.multi_value_separator.as_str();
    let mut comments = Vec::new();

    for frame in frames {
        if frame.id == FieldMappings::ID3V2_PICTURE {
            match parse_picture(&frame.data, major == 2, legacy) {
                Ok(picture) => record.add_picture(picture),
                Err(e) => {
                    warn!("Dropping picture frame: {e}");
                    record.dirty = true;
                }
            }
            continue;
        }

        let Some(field) = FieldMappings::from_id3v2(&frame.id) else {
            continue;
        };

        let decoded = match field {
            StandardField::Comment => {
                match CommentFrame::parse(&frame.data, legacy) {
                    Ok(comment) => comments.push(comment),
                    Err(e) => debug!("Skipping COMM frame: {e}"),
                }
                continue;
            }
            StandardField::Url => parse_user_url(&frame.data, legacy).map(|(_, url)| vec![url]),
            _ => decode_text_frame(&frame.data, legacy),
        };
        let values = match decoded {
            Ok(values) => values,
            Err(e) => {
                debug!("Skipping {} frame: {e}", frame.id);
                continue;
            }
        };

        // The first frame of a kind wins (TDRC before a stray TYER, for instance)
        if record.get(field).is_some() {
            continue;
        }

        match field {
            StandardField::Track | StandardField::DiscNumber => {
                let (number, total) = values
                    .first()
                    .map(|v| ValueConverter::split_number_total(v))
                    .unwrap_or_default();
                let total_field = if field == StandardField::Track {
                    StandardField::TrackTotal
                } else {
                    StandardField::DiscTotal
                };
                record.set(field, ValueConverter::pad_optional(number, config.number_padding));
                record.set(total_field, ValueConverter::pad_optional(total, config.number_padding));
            }
            StandardField::Genre => {
                let genres: Vec<String> = values.iter().map(|v| parse_genre(v)).collect();
                record.set(field, ValueConverter::join_values(&genres, separator));
            }
            _ => record.set(field, ValueConverter::join_values(&values, separator)),
        }
    }

    // Prefer the plain comment over descriptive or iTunes-private ones
    let chosen = comments
        .iter()
        .filter(|c| !c.is_itunes_private())
        .min_by_key(|c| !c.description.is_empty());
    if let Some(comment) = chosen {
        record.set(StandardField::Comment, Some(comment.text.clone()));
    }

    record
}

/// Frames written from the record; anything else a new tag may carry over
pub fn is_managed(frame: &Frame) -> bool {
    match frame.id.as_str() {
        "TYER" | "TDRC" | FieldMappings::ID3V2_PICTURE => true,
        id if id == FieldMappings::ID3V2_COMMENT => {
            // iTunes normalization data survives a rewrite
            !frame.data.get(4..).is_some_and(|rest| {
                crate::utils::encoding::decode_text(
                    rest,
                    TextEncoding::from_byte(frame.data[0]).unwrap_or(TextEncoding::Iso8859_1),
                    Default::default(),
                )
                .starts_with("iTun")
            })
        }
        id => FieldMappings::from_id3v2(id).is_some(),
    }
}

struct EncodingChooser<'a> {
    config: &'a TagConfig,
    capabilities: EncoderCapabilities,
    major: u8,
}

impl EncodingChooser<'_> {
    fn choose(&self, text: &str, report: &mut WriteReport) -> TextEncoding {
        let encoding = match self.config.id3.text_encoding {
            Id3TextEncoding::Auto if self.config.legacy_charset.can_represent(text) => {
                TextEncoding::Iso8859_1
            }
            Id3TextEncoding::Auto | Id3TextEncoding::Utf16 => TextEncoding::Utf16,
            Id3TextEncoding::Utf8 if self.major >= 4 => TextEncoding::Utf8,
            Id3TextEncoding::Utf8 => TextEncoding::Utf16,
            Id3TextEncoding::Legacy => TextEncoding::Iso8859_1,
        };
        if encoding.is_unicode() && !self.capabilities.unicode_reliable {
            report.warn(TagWarning::UnreliableUnicode);
        }
        encoding
    }
}

/// Build a fresh frame set from the record
pub fn record_to_frames(
    record: &TagRecord,
    config: &TagConfig,
    report: &mut WriteReport,
) -> Result<Vec<Frame>> {
    let major = config.id3.version.major();
    let legacy = config.legacy_charset;
    let policy = config.unmappable;
    let chooser = EncodingChooser {
        config,
        capabilities: config.capabilities,
        major,
    };
    let pad = |value: Option<&str>| value.map(|v| ValueConverter::pad_number(v, config.number_padding));

    let mut frames = Vec::new();
    for field in StandardField::ALL {
        let Some(id) = FieldMappings::to_id3v2(field, major) else { continue };

        let value = match field {
            StandardField::Track => ValueConverter::join_number_total(
                pad(record.get(StandardField::Track)).as_deref(),
                pad(record.get(StandardField::TrackTotal)).as_deref(),
            ),
            StandardField::DiscNumber => ValueConverter::join_number_total(
                pad(record.get(StandardField::DiscNumber)).as_deref(),
                pad(record.get(StandardField::DiscTotal)).as_deref(),
            ),
            StandardField::Genre => record.get(field).map(|genre| {
                match (config.id3.genre_style, genre_index(genre)) {
                    (GenreStyle::Numeric, Some(index)) => format!("({index})"),
                    _ => genre.to_string(),
                }
            }),
            _ => record.get(field).map(str::to_string),
        };
        let Some(value) = value else { continue };

        let data = match field {
            StandardField::Comment => {
                let comment = CommentFrame {
                    language: *b"eng",
                    description: String::new(),
                    text: value,
                };
                let encoding = chooser.choose(&comment.text, report);
                comment.render(encoding, legacy, policy)?
            }
            StandardField::Url => render_user_url(&value, policy)?,
            _ => {
                let encoding = chooser.choose(&value, report);
                encode_text_frame(&value, encoding, legacy, policy)?
            }
        };
        frames.push(Frame::new(id, data));
    }

    for picture in &record.pictures {
        let description = picture.description.as_deref().unwrap_or("");
        let encoding = if description.is_empty() {
            TextEncoding::Iso8859_1
        } else {
            chooser.choose(description, report)
        };
        frames.push(Frame::new(
            FieldMappings::ID3V2_PICTURE,
            render_picture(picture, encoding, legacy, policy)?,
        ));
    }

    Ok(frames)
}
