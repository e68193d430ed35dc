// Unified metadata field mapping system
//
// Each format has its own field names and conventions:
// - ID3v2: Frame IDs (TIT2, TPE1, TALB, etc.; three characters in v2.2)
// - FLAC/OGG: Vorbis Comment keys (TITLE, ARTIST, ALBUM, etc.)
// - MP4: iTunes atoms, handled through mp4ameta accessors
// - APE: Tag item names (Title, Artist, Album, etc.)
// - WavPack: APE items with lower-case names (title, artist, album, etc.)
//
// This module standardizes field access across formats.

use std::fmt;
use std::str::FromStr;

/// Standard metadata fields of a [`TagRecord`](crate::TagRecord)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardField {
    Title,
    Artist,
    AlbumArtist,
    Album,
    DiscNumber,
    DiscTotal,
    Year,
    Track,
    TrackTotal,
    Genre,
    Comment,
    Composer,
    OriginalArtist,
    Copyright,
    Url,
    EncodedBy,
}

impl StandardField {
    pub const ALL: [StandardField; 16] = [
        StandardField::Title,
        StandardField::Artist,
        StandardField::AlbumArtist,
        StandardField::Album,
        StandardField::DiscNumber,
        StandardField::DiscTotal,
        StandardField::Year,
        StandardField::Track,
        StandardField::TrackTotal,
        StandardField::Genre,
        StandardField::Comment,
        StandardField::Composer,
        StandardField::OriginalArtist,
        StandardField::Copyright,
        StandardField::Url,
        StandardField::EncodedBy,
    ];

    /// Get standard field name (lowercase)
    pub fn as_str(&self) -> &'static str {
        match self {
            StandardField::Title => "title",
            StandardField::Artist => "artist",
            StandardField::AlbumArtist => "album_artist",
            StandardField::Album => "album",
            StandardField::DiscNumber => "disc_number",
            StandardField::DiscTotal => "disc_total",
            StandardField::Year => "year",
            StandardField::Track => "track",
            StandardField::TrackTotal => "track_total",
            StandardField::Genre => "genre",
            StandardField::Comment => "comment",
            StandardField::Composer => "composer",
            StandardField::OriginalArtist => "original_artist",
            StandardField::Copyright => "copyright",
            StandardField::Url => "url",
            StandardField::EncodedBy => "encoded_by",
        }
    }

    /// Fields holding a number or a total rather than free text
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            StandardField::DiscNumber
                | StandardField::DiscTotal
                | StandardField::Track
                | StandardField::TrackTotal
        )
    }
}

impl fmt::Display for StandardField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StandardField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        let field = match key.as_str() {
            "title" => StandardField::Title,
            "artist" => StandardField::Artist,
            "album_artist" | "albumartist" => StandardField::AlbumArtist,
            "album" => StandardField::Album,
            "disc_number" | "disc" => StandardField::DiscNumber,
            "disc_total" => StandardField::DiscTotal,
            "year" | "date" => StandardField::Year,
            "track" | "track_number" => StandardField::Track,
            "track_total" => StandardField::TrackTotal,
            "genre" => StandardField::Genre,
            "comment" => StandardField::Comment,
            "composer" => StandardField::Composer,
            "original_artist" => StandardField::OriginalArtist,
            "copyright" => StandardField::Copyright,
            "url" => StandardField::Url,
            "encoded_by" | "encoder" => StandardField::EncodedBy,
            _ => return Err(format!("unknown field \"{s}\"")),
        };
        Ok(field)
    }
}

/// Naming convention of an APEv2 tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApeKeyStyle {
    /// Musepack, Monkey's Audio, OptimFROG, MP3 leftovers
    Ape,
    /// WavPack's lower-case item names
    WavPack,
}

/// Format-specific field mappings
pub struct FieldMappings;

impl FieldMappings {
    // ID3v2 frame IDs
    pub const ID3V2_TITLE: &'static str = "TIT2";
    pub const ID3V2_ARTIST: &'static str = "TPE1";
    pub const ID3V2_ALBUM_ARTIST: &'static str = "TPE2";
    pub const ID3V2_ALBUM: &'static str = "TALB";
    pub const ID3V2_DISC: &'static str = "TPOS";
    pub const ID3V2_YEAR_V3: &'static str = "TYER";
    pub const ID3V2_YEAR_V4: &'static str = "TDRC";
    pub const ID3V2_TRACK: &'static str = "TRCK";
    pub const ID3V2_GENRE: &'static str = "TCON";
    pub const ID3V2_COMMENT: &'static str = "COMM";
    pub const ID3V2_COMPOSER: &'static str = "TCOM";
    pub const ID3V2_ORIGINAL_ARTIST: &'static str = "TOPE";
    pub const ID3V2_COPYRIGHT: &'static str = "TCOP";
    pub const ID3V2_URL: &'static str = "WXXX";
    pub const ID3V2_ENCODED_BY: &'static str = "TENC";
    pub const ID3V2_PICTURE: &'static str = "APIC";

    // Vorbis Comment keys (FLAC/OGG)
    pub const VORBIS_TITLE: &'static str = "TITLE";
    pub const VORBIS_ARTIST: &'static str = "ARTIST";
    pub const VORBIS_ALBUM_ARTIST: &'static str = "ALBUMARTIST";
    pub const VORBIS_ALBUM: &'static str = "ALBUM";
    pub const VORBIS_DISC: &'static str = "DISCNUMBER";
    pub const VORBIS_DISC_TOTAL: &'static str = "DISCTOTAL";
    pub const VORBIS_YEAR: &'static str = "DATE";
    pub const VORBIS_TRACK: &'static str = "TRACKNUMBER";
    pub const VORBIS_TRACK_TOTAL: &'static str = "TRACKTOTAL";
    pub const VORBIS_GENRE: &'static str = "GENRE";
    pub const VORBIS_DESCRIPTION: &'static str = "DESCRIPTION";
    pub const VORBIS_COMMENT: &'static str = "COMMENT";
    pub const VORBIS_COMPOSER: &'static str = "COMPOSER";
    pub const VORBIS_PERFORMER: &'static str = "PERFORMER";
    pub const VORBIS_COPYRIGHT: &'static str = "COPYRIGHT";
    pub const VORBIS_LICENSE: &'static str = "LICENSE";
    pub const VORBIS_ENCODED_BY: &'static str = "ENCODED-BY";

    /// ID3v2.3/v2.4 frame holding a field; disc and track totals share their number's frame
    pub fn to_id3v2(field: StandardField, major: u8) -> Option<&'static str> {
        let id = match field {
            StandardField::Title => Self::ID3V2_TITLE,
            StandardField::Artist => Self::ID3V2_ARTIST,
            StandardField::AlbumArtist => Self::ID3V2_ALBUM_ARTIST,
            StandardField::Album => Self::ID3V2_ALBUM,
            StandardField::DiscNumber => Self::ID3V2_DISC,
            StandardField::Year if major >= 4 => Self::ID3V2_YEAR_V4,
            StandardField::Year => Self::ID3V2_YEAR_V3,
            StandardField::Track => Self::ID3V2_TRACK,
            StandardField::Genre => Self::ID3V2_GENRE,
            StandardField::Comment => Self::ID3V2_COMMENT,
            StandardField::Composer => Self::ID3V2_COMPOSER,
            StandardField::OriginalArtist => Self::ID3V2_ORIGINAL_ARTIST,
            StandardField::Copyright => Self::ID3V2_COPYRIGHT,
            StandardField::Url => Self::ID3V2_URL,
            StandardField::EncodedBy => Self::ID3V2_ENCODED_BY,
            StandardField::DiscTotal | StandardField::TrackTotal => return None,
        };
        Some(id)
    }

    /// Convert an ID3v2 frame to the field it carries
    pub fn from_id3v2(frame_id: &str) -> Option<StandardField> {
        match frame_id {
            Self::ID3V2_TITLE => Some(StandardField::Title),
            Self::ID3V2_ARTIST => Some(StandardField::Artist),
            Self::ID3V2_ALBUM_ARTIST => Some(StandardField::AlbumArtist),
            Self::ID3V2_ALBUM => Some(StandardField::Album),
            Self::ID3V2_DISC => Some(StandardField::DiscNumber),
            Self::ID3V2_YEAR_V4 | Self::ID3V2_YEAR_V3 => Some(StandardField::Year),
            Self::ID3V2_TRACK => Some(StandardField::Track),
            Self::ID3V2_GENRE => Some(StandardField::Genre),
            Self::ID3V2_COMMENT => Some(StandardField::Comment),
            Self::ID3V2_COMPOSER => Some(StandardField::Composer),
            Self::ID3V2_ORIGINAL_ARTIST => Some(StandardField::OriginalArtist),
            Self::ID3V2_COPYRIGHT => Some(StandardField::Copyright),
            Self::ID3V2_URL => Some(StandardField::Url),
            Self::ID3V2_ENCODED_BY => Some(StandardField::EncodedBy),
            _ => None,
        }
    }

    /// Get the Vorbis Comment key written for a standard field
    pub fn to_vorbis(field: StandardField) -> &'static str {
        match field {
            StandardField::Title => Self::VORBIS_TITLE,
            StandardField::Artist => Self::VORBIS_ARTIST,
            StandardField::AlbumArtist => Self::VORBIS_ALBUM_ARTIST,
            StandardField::Album => Self::VORBIS_ALBUM,
            StandardField::DiscNumber => Self::VORBIS_DISC,
            StandardField::DiscTotal => Self::VORBIS_DISC_TOTAL,
            StandardField::Year => Self::VORBIS_YEAR,
            StandardField::Track => Self::VORBIS_TRACK,
            StandardField::TrackTotal => Self::VORBIS_TRACK_TOTAL,
            StandardField::Genre => Self::VORBIS_GENRE,
            StandardField::Comment => Self::VORBIS_DESCRIPTION,
            StandardField::Composer => Self::VORBIS_COMPOSER,
            StandardField::OriginalArtist => Self::VORBIS_PERFORMER,
            StandardField::Copyright => Self::VORBIS_COPYRIGHT,
            StandardField::Url => Self::VORBIS_LICENSE,
            StandardField::EncodedBy => Self::VORBIS_ENCODED_BY,
        }
    }

    /// Convert an upper-cased Vorbis Comment key to a standard field.
    /// The flag is set for legacy spellings that a save should normalize.
    pub fn from_vorbis(key: &str) -> Option<(StandardField, bool)> {
        let mapped = match key {
            Self::VORBIS_TITLE => (StandardField::Title, false),
            Self::VORBIS_ARTIST => (StandardField::Artist, false),
            Self::VORBIS_ALBUM_ARTIST => (StandardField::AlbumArtist, false),
            "ALBUM ARTIST" | "ALBUM_ARTIST" => (StandardField::AlbumArtist, true),
            Self::VORBIS_ALBUM => (StandardField::Album, false),
            Self::VORBIS_DISC => (StandardField::DiscNumber, false),
            Self::VORBIS_DISC_TOTAL => (StandardField::DiscTotal, false),
            "TOTALDISCS" => (StandardField::DiscTotal, true),
            Self::VORBIS_YEAR => (StandardField::Year, false),
            Self::VORBIS_TRACK => (StandardField::Track, false),
            Self::VORBIS_TRACK_TOTAL => (StandardField::TrackTotal, false),
            "TOTALTRACKS" => (StandardField::TrackTotal, true),
            Self::VORBIS_GENRE => (StandardField::Genre, false),
            Self::VORBIS_DESCRIPTION => (StandardField::Comment, false),
            Self::VORBIS_COMPOSER => (StandardField::Composer, false),
            Self::VORBIS_PERFORMER => (StandardField::OriginalArtist, false),
            Self::VORBIS_COPYRIGHT => (StandardField::Copyright, false),
            Self::VORBIS_LICENSE => (StandardField::Url, false),
            Self::VORBIS_ENCODED_BY => (StandardField::EncodedBy, false),
            _ => return None,
        };
        Some(mapped)
    }

    /// APE item name of a field; totals are folded into `Part`/`Track`
    pub fn to_ape(field: StandardField, style: ApeKeyStyle) -> Option<&'static str> {
        let (ape, wavpack) = match field {
            StandardField::Title => ("Title", "title"),
            StandardField::Artist => ("Artist", "artist"),
            StandardField::AlbumArtist => ("Album Artist", "album artist"),
            StandardField::Album => ("Album", "album"),
            StandardField::DiscNumber => ("Part", "part"),
            StandardField::Year => ("Year", "year"),
            StandardField::Track => ("Track", "track"),
            StandardField::Genre => ("Genre", "genre"),
            StandardField::Comment => ("Comment", "comment"),
            StandardField::Composer => ("Composer", "composer"),
            StandardField::OriginalArtist => ("Original Artist", "original artist"),
            StandardField::Copyright => ("Copyright", "copyright"),
            StandardField::Url => ("Related URL", "copyright url"),
            StandardField::EncodedBy => ("Encoded By", "encoded by"),
            StandardField::DiscTotal | StandardField::TrackTotal => return None,
        };
        Some(match style {
            ApeKeyStyle::Ape => ape,
            ApeKeyStyle::WavPack => wavpack,
        })
    }
}

/// Metadata value converter for handling format-specific value formats
pub struct ValueConverter;

impl ValueConverter {
    /// Extract a 4-digit year from various formats
    pub fn normalize_year(year: &str) -> String {
        let year_str = year.trim();
        year_str.chars().take(4).collect()
    }

    /// Split "3/12" into number and total; empty halves are absent
    pub fn split_number_total(value: &str) -> (Option<String>, Option<String>) {
        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        match value.split_once('/') {
            Some((number, total)) => (non_empty(number), non_empty(total)),
            None => (non_empty(value), None),
        }
    }

    /// Combine number and total as "N/M", "N" without a total, or "/M" without a number
    pub fn join_number_total(number: Option<&str>, total: Option<&str>) -> Option<String> {
        match (number, total) {
            (Some(n), Some(t)) => Some(format!("{n}/{t}")),
            (Some(n), None) => Some(n.to_string()),
            (None, Some(t)) => Some(format!("/{t}")),
            (None, None) => None,
        }
    }

    /// Zero-pad a numeric string to `width` digits; non-numeric text is kept as is
    pub fn pad_number(value: &str, width: Option<usize>) -> String {
        let trimmed = value.trim();
        match width {
            Some(width) if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) => {
                let digits = trimmed.trim_start_matches('0');
                let digits = if digits.is_empty() { "0" } else { digits };
                format!("{digits:0>width$}")
            }
            _ => trimmed.to_string(),
        }
    }

    pub fn pad_optional(value: Option<String>, width: Option<usize>) -> Option<String> {
        value
            .map(|v| Self::pad_number(&v, width))
            .filter(|v| !v.is_empty())
    }

    /// Join multiple values of one field with the separator
    pub fn join_values<S: AsRef<str>>(values: &[S], separator: &str) -> Option<String> {
        if values.is_empty() {
            return None;
        }
        let joined = values
            .iter()
            .map(|v| v.as_ref())
            .collect::<Vec<_>>()
            .join(separator);
        (!joined.trim().is_empty()).then_some(joined)
    }

    /// Split a joined field back into its values. Blank segments are dropped.
    pub fn split_values<'a>(value: &'a str, separator: &str) -> Vec<&'a str> {
        if separator.is_empty() {
            return vec![value];
        }
        value.split(separator).filter(|part| !part.trim().is_empty()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_field_parsing() {
        assert_eq!("title".parse(), Ok(StandardField::Title));
        assert_eq!("TITLE".parse(), Ok(StandardField::Title));
        assert_eq!("Album Artist".parse(), Ok(StandardField::AlbumArtist));
        assert_eq!("track-total".parse(), Ok(StandardField::TrackTotal));
        assert!("unknown".parse::<StandardField>().is_err());
        for field in StandardField::ALL {
            assert_eq!(field.as_str().parse(), Ok(field));
        }
    }

    #[test]
    fn test_field_mapping() {
        assert_eq!(FieldMappings::to_id3v2(StandardField::Title, 3), Some("TIT2"));
        assert_eq!(FieldMappings::to_id3v2(StandardField::Year, 3), Some("TYER"));
        assert_eq!(FieldMappings::to_id3v2(StandardField::Year, 4), Some("TDRC"));
        assert_eq!(FieldMappings::to_id3v2(StandardField::TrackTotal, 4), None);
        assert_eq!(FieldMappings::to_vorbis(StandardField::Comment), "DESCRIPTION");
        assert_eq!(FieldMappings::to_ape(StandardField::Url, ApeKeyStyle::Ape), Some("Related URL"));
        assert_eq!(
            FieldMappings::to_ape(StandardField::Url, ApeKeyStyle::WavPack),
            Some("copyright url")
        );

        assert_eq!(FieldMappings::from_id3v2("TDRC"), Some(StandardField::Year));
        assert_eq!(FieldMappings::from_vorbis("TITLE"), Some((StandardField::Title, false)));
        assert_eq!(
            FieldMappings::from_vorbis("TOTALTRACKS"),
            Some((StandardField::TrackTotal, true))
        );
        assert_eq!(FieldMappings::from_vorbis("COMMENT"), None);
    }

    #[test]
    fn test_number_total() {
        assert_eq!(
            ValueConverter::split_number_total("3/12"),
            (Some("3".to_string()), Some("12".to_string()))
        );
        assert_eq!(ValueConverter::split_number_total("3"), (Some("3".to_string()), None));
        assert_eq!(ValueConverter::split_number_total("/12"), (None, Some("12".to_string())));
        assert_eq!(ValueConverter::join_number_total(Some("3"), Some("12")), Some("3/12".to_string()));
        assert_eq!(ValueConverter::join_number_total(Some("3"), None), Some("3".to_string()));
        assert_eq!(ValueConverter::join_number_total(None, Some("12")), Some("/12".to_string()));
        assert_eq!(ValueConverter::join_number_total(None, None), None);
    }

    #[test]
    fn test_value_normalization() {
        assert_eq!(ValueConverter::normalize_year("2024-01-15"), "2024");
        assert_eq!(ValueConverter::normalize_year("2024"), "2024");
        assert_eq!(ValueConverter::pad_number("3", Some(2)), "03");
        assert_eq!(ValueConverter::pad_number("003", Some(2)), "03");
        assert_eq!(ValueConverter::pad_number("123", Some(2)), "123");
        assert_eq!(ValueConverter::pad_number("03", None), "03");
        assert_eq!(ValueConverter::pad_number("A1", Some(2)), "A1");
        assert_eq!(ValueConverter::pad_number("0", Some(2)), "00");
    }

    #[test]
    fn test_join_split() {
        let values = ["A", "B"];
        assert_eq!(ValueConverter::join_values(&values, " - "), Some("A - B".to_string()));
        assert_eq!(ValueConverter::split_values("A - B", " - "), vec!["A", "B"]);
        assert_eq!(ValueConverter::split_values("a - ", " - "), vec!["a"]);
        assert_eq!(ValueConverter::split_values(" - A -  - B", " - "), vec!["A", "B"]);
        assert_eq!(ValueConverter::join_values::<&str>(&[], " - "), None);
    }
}
