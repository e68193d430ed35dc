// ID3v1 tag implementation

use std::io::{Read, Seek, SeekFrom};

use crate::config::TagConfig;
use crate::error::Result;
use crate::field_mapping::{StandardField, ValueConverter};
use crate::id3::genres::{genre_index, genre_name, GENRE_UNSET};
use crate::record::TagRecord;
use crate::report::{TagWarning, WriteReport};
use crate::utils::encoding::Charset;
use crate::utils::io::read_exact_or_short;

/// ID3v1 tag structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id3v1Tag {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    pub comment: String,
    /// ID3v1.1 track byte
    pub track: Option<u8>,
    pub genre: u8,
}

impl Default for Id3v1Tag {
    fn default() -> Self {
        Id3v1Tag {
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            year: String::new(),
            comment: String::new(),
            track: None,
            genre: GENRE_UNSET,
        }
    }
}

impl Id3v1Tag {
    pub const TAG_SIZE: usize = 128;
    const TAG_ID: [u8; 3] = [b'T', b'A', b'G'];

    /// Check whether the last 128 bytes before `end` hold an ID3v1 tag
    pub fn find<R: Read + Seek>(reader: &mut R, end: u64) -> Result<Option<[u8; 128]>> {
        if end < Self::TAG_SIZE as u64 {
            return Ok(None);
        }

        reader.seek(SeekFrom::Start(end - Self::TAG_SIZE as u64))?;
        let mut buffer = [0u8; Self::TAG_SIZE];
        read_exact_or_short(reader, &mut buffer)?;

        // Check for TAG identifier
        if buffer[0..3] != Self::TAG_ID {
            return Ok(None);
        }
        Ok(Some(buffer))
    }

    /// Parse ID3v1 tag from buffer
    pub fn parse(buffer: &[u8; 128], charset: Charset) -> Self {
        let text = |range: std::ops::Range<usize>| Self::parse_string(&buffer[range], charset);

        // Check for ID3v1.1 track number
        let (comment, track) = if buffer[125] == 0 && buffer[126] != 0 {
            (text(97..125), Some(buffer[126]))
        } else {
            (text(97..127), None)
        };

        Id3v1Tag {
            title: text(3..33),
            artist: text(33..63),
            album: text(63..93),
            year: text(93..97),
            comment,
            track,
            genre: buffer[127],
        }
    }

    /// Parse a null/space padded string
    fn parse_string(bytes: &[u8], charset: Charset) -> String {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        charset.decode(&bytes[..end]).trim().to_string()
    }

    pub fn to_record(&self, config: &TagConfig) -> TagRecord {
        let mut record = TagRecord::new();
        record.set(StandardField::Title, Some(self.title.clone()));
        record.set(StandardField::Artist, Some(self.artist.clone()));
        record.set(StandardField::Album, Some(self.album.clone()));
        record.set(StandardField::Year, Some(self.year.clone()));
        record.set(StandardField::Comment, Some(self.comment.clone()));
        record.set(
            StandardField::Track,
            self.track
                .map(|t| ValueConverter::pad_number(&t.to_string(), config.number_padding)),
        );
        record.set(StandardField::Genre, genre_name(self.genre).map(str::to_string));
        record
    }

    pub fn from_record(record: &TagRecord) -> Self {
        let text = |field| record.get(field).unwrap_or_default().to_string();
        Id3v1Tag {
            title: text(StandardField::Title),
            artist: text(StandardField::Artist),
            album: text(StandardField::Album),
            year: ValueConverter::normalize_year(&text(StandardField::Year)),
            comment: text(StandardField::Comment),
            track: record
                .track
                .as_deref()
                .and_then(|t| t.trim().parse::<u8>().ok())
                .filter(|&t| t != 0),
            genre: record
                .genre
                .as_deref()
                .and_then(genre_index)
                .unwrap_or(GENRE_UNSET),
        }
    }

    /// Render the 128-byte trailer, truncating fields that do not fit
    pub fn render(&self, config: &TagConfig, report: &mut WriteReport) -> Result<[u8; 128]> {
        let mut buffer = [0u8; Self::TAG_SIZE];
        buffer[..3].copy_from_slice(&Self::TAG_ID);

        let comment_width = if self.track.is_some() { 28 } else { 30 };
        let fields = [
            (StandardField::Title, &self.title, 3, 30),
            (StandardField::Artist, &self.artist, 33, 30),
            (StandardField::Album, &self.album, 63, 30),
            (StandardField::Year, &self.year, 93, 4),
            (StandardField::Comment, &self.comment, 97, comment_width),
        ];
        for (field, value, offset, width) in fields {
            let bytes = config.legacy_charset.encode(value, config.unmappable)?;
            if bytes.len() > width {
                report.warn(TagWarning::FieldTruncated { field, limit: width });
            }
            let len = bytes.len().min(width);
            buffer[offset..offset + len].copy_from_slice(&bytes[..len]);
        }

        if let Some(track) = self.track {
            buffer[125] = 0;
            buffer[126] = track;
        }
        buffer[127] = self.genre;

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> [u8; 128] {
        let mut buffer = [0u8; 128];
        buffer[..3].copy_from_slice(b"TAG");
        buffer[3..8].copy_from_slice(b"Title");
        buffer[33..39].copy_from_slice(b"Artist");
        buffer[93..97].copy_from_slice(b"1999");
        buffer[97..104].copy_from_slice(b"Comment");
        buffer[126] = 7;
        buffer[127] = 17;
        buffer
    }

    #[test]
    fn test_parse_v11() {
        let tag = Id3v1Tag::parse(&sample(), Charset::Latin1);
        assert_eq!(tag.title, "Title");
        assert_eq!(tag.artist, "Artist");
        assert_eq!(tag.year, "1999");
        assert_eq!(tag.comment, "Comment");
        assert_eq!(tag.track, Some(7));

        let mut config = TagConfig::default();
        config.number_padding = Some(2);
        let record = tag.to_record(&config);
        assert_eq!(record.track.as_deref(), Some("07"));
        assert_eq!(record.genre.as_deref(), Some("Rock"));
        assert_eq!(record.album, None);
    }

    #[test]
    fn test_genre_edge_codes() {
        let mut buffer = sample();
        buffer[127] = 200;
        let record = Id3v1Tag::parse(&buffer, Charset::Latin1).to_record(&TagConfig::default());
        assert_eq!(record.genre.as_deref(), Some("Unknown"));

        buffer[127] = 255;
        let record = Id3v1Tag::parse(&buffer, Charset::Latin1).to_record(&TagConfig::default());
        assert_eq!(record.genre, None);
    }

    #[test]
    fn test_find() {
        let mut data = vec![1u8; 300];
        data.extend_from_slice(&sample());
        let len = data.len() as u64;
        let mut cursor = Cursor::new(data);
        assert!(Id3v1Tag::find(&mut cursor, len).unwrap().is_some());
        assert!(Id3v1Tag::find(&mut cursor, len - 1).unwrap().is_none());
        assert!(Id3v1Tag::find(&mut cursor, 100).unwrap().is_none());
    }

    #[test]
    fn test_render_truncates() {
        let mut record = TagRecord::new();
        record.title = Some("A title that is definitely longer than thirty bytes".to_string());
        record.track = Some("3".to_string());
        record.genre = Some("rock".to_string());
        record.year = Some("2024-05-01".to_string());

        let mut report = WriteReport::new();
        let tag = Id3v1Tag::from_record(&record);
        let buffer = tag.render(&TagConfig::default(), &mut report).unwrap();

        assert_eq!(&buffer[3..33], &record.title.as_deref().unwrap().as_bytes()[..30]);
        assert_eq!(&buffer[93..97], b"2024");
        assert_eq!(buffer[126], 3);
        assert_eq!(buffer[127], 17);
        assert_eq!(
            report.warnings,
            vec![TagWarning::FieldTruncated { field: StandardField::Title, limit: 30 }]
        );

        let back = Id3v1Tag::parse(&buffer, Charset::Latin1);
        assert_eq!(back.track, Some(3));
    }
}
