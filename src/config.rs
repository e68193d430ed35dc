// Read/write configuration passed explicitly into every codec call

use serde::{Deserialize, Serialize};

use crate::field_mapping::StandardField;
use crate::utils::encoding::{decode_text, encode_text, Charset, TextEncoding, UnmappablePolicy};

/// Default separator between joined values of a multi-valued field
pub const DEFAULT_SEPARATOR: &str = " - ";

/// Settings shared by every format codec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    /// Token placed between values of one field when several are joined
    pub multi_value_separator: String,
    /// Zero-pad width for track/disc numbers and totals
    pub number_padding: Option<usize>,
    /// Charset of non-Unicode text fields
    pub legacy_charset: Charset,
    pub unmappable: UnmappablePolicy,
    pub id3: Id3Config,
    /// Vorbis fields written as one comment per joined value
    pub vorbis: SplitFields,
    #[serde(skip)]
    pub capabilities: EncoderCapabilities,
}

impl Default for TagConfig {
    fn default() -> Self {
        TagConfig {
            multi_value_separator: DEFAULT_SEPARATOR.to_string(),
            number_padding: None,
            legacy_charset: Charset::Latin1,
            unmappable: UnmappablePolicy::Substitute,
            id3: Id3Config::default(),
            vorbis: SplitFields::default(),
            capabilities: EncoderCapabilities::default(),
        }
    }
}

impl TagConfig {
    /// Parse a JSON configuration; missing keys take their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn with_capabilities(mut self, capabilities: EncoderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Id3Version {
    #[serde(rename = "2.3")]
    V3,
    #[default]
    #[serde(rename = "2.4")]
    V4,
}

impl Id3Version {
    pub fn major(self) -> u8 {
        match self {
            Id3Version::V3 => 3,
            Id3Version::V4 => 4,
        }
    }
}

/// How ID3v2 text frames choose their encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Id3TextEncoding {
    /// ISO-8859-1 when representable, UTF-16 otherwise
    #[default]
    Auto,
    Utf16,
    /// UTF-8; only valid for ID3v2.4, falls back to UTF-16 for v2.3
    Utf8,
    /// Always the configured legacy charset
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenreStyle {
    /// `(17)` when the genre is in the ID3v1 table
    Numeric,
    #[default]
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Id3Config {
    pub write_id3v2: bool,
    pub write_id3v1: bool,
    pub version: Id3Version,
    pub text_encoding: Id3TextEncoding,
    pub genre_style: GenreStyle,
    /// Remove every ID3 tag when the record has no fields
    pub strip_empty_tags: bool,
    /// Padding appended to a tag that has to grow
    pub padding: usize,
}

impl Default for Id3Config {
    fn default() -> Self {
        Id3Config {
            write_id3v2: true,
            write_id3v1: true,
            version: Id3Version::V4,
            text_encoding: Id3TextEncoding::Auto,
            genre_style: GenreStyle::Text,
            strip_empty_tags: true,
            padding: 1024,
        }
    }
}

/// Per-field policy for splitting joined values into repeated Vorbis comments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitFields {
    pub title: bool,
    pub artist: bool,
    pub album_artist: bool,
    pub album: bool,
    pub genre: bool,
    pub comment: bool,
    pub composer: bool,
    pub original_artist: bool,
}

impl SplitFields {
    pub fn all() -> Self {
        SplitFields {
            title: true,
            artist: true,
            album_artist: true,
            album: true,
            genre: true,
            comment: true,
            composer: true,
            original_artist: true,
        }
    }

    pub fn splits(&self, field: StandardField) -> bool {
        match field {
            StandardField::Title => self.title,
            StandardField::Artist => self.artist,
            StandardField::AlbumArtist => self.album_artist,
            StandardField::Album => self.album,
            StandardField::Genre => self.genre,
            StandardField::Comment => self.comment,
            StandardField::Composer => self.composer,
            StandardField::OriginalArtist => self.original_artist,
            _ => false,
        }
    }
}

/// Result of the one-time Unicode writer self-test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderCapabilities {
    /// UTF-16 text survives an encode/decode round trip unchanged
    pub unicode_reliable: bool,
}

impl Default for EncoderCapabilities {
    fn default() -> Self {
        EncoderCapabilities {
            unicode_reliable: true,
        }
    }
}

impl EncoderCapabilities {
    /// Characters that broken UTF-16 writers are known to mangle
    const PROBE: &'static str = "\u{e9}\u{df}\u{4e2d}\u{1f3b5}\u{fffd}";

    /// Run the self-test; call once at startup and share the result
    pub fn detect() -> Self {
        let unicode_reliable = [TextEncoding::Utf16, TextEncoding::Utf16BE, TextEncoding::Utf8]
            .into_iter()
            .all(|encoding| {
                encode_text(Self::PROBE, encoding, Charset::Latin1, UnmappablePolicy::Strict)
                    .map(|bytes| decode_text(&bytes, encoding, Charset::Latin1) == Self::PROBE)
                    .unwrap_or(false)
            });
        if !unicode_reliable {
            log::warn!("Unicode text does not survive a round trip; Unicode writes will be flagged");
        }
        EncoderCapabilities { unicode_reliable }
    }
}
