// Encoding utilities

use std::fmt;

use encoding_rs::{Encoding, EncoderResult, UTF_16BE, UTF_16LE};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, TagError};

/// Text encoding types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Iso8859_1 = 0,
    Utf16 = 1,
    Utf16BE = 2,
    Utf8 = 3,
}

impl TextEncoding {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(TextEncoding::Iso8859_1),
            1 => Some(TextEncoding::Utf16),
            2 => Some(TextEncoding::Utf16BE),
            3 => Some(TextEncoding::Utf8),
            _ => None,
        }
    }

    pub fn is_unicode(self) -> bool {
        self != TextEncoding::Iso8859_1
    }

    pub fn terminator(self) -> &'static [u8] {
        match self {
            TextEncoding::Utf16 | TextEncoding::Utf16BE => &[0, 0],
            TextEncoding::Iso8859_1 | TextEncoding::Utf8 => &[0],
        }
    }
}

/// What to do with a character the target charset cannot represent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappablePolicy {
    /// Replace it with `?`
    #[default]
    Substitute,
    /// Drop it
    Ignore,
    /// Fail with `EncodingConversionFailed`
    Strict,
}

/// A non-Unicode charset used for legacy text fields
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// True ISO-8859-1 (every byte maps to U+0000..U+00FF)
    #[default]
    Latin1,
    Other(&'static Encoding),
}

impl Charset {
    /// Resolve a WHATWG label such as `windows-1251` or `latin1`
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "iso-8859-1" | "iso8859-1" | "iso_8859-1" | "latin1" | "latin-1" | "l1" => {
                Some(Charset::Latin1)
            }
            _ => {
                let encoding = Encoding::for_label(normalized.as_bytes())?;
                // UTF-16 labels have no encoder in encoding_rs
                if encoding.output_encoding() != encoding {
                    return None;
                }
                Some(Charset::Other(encoding))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Charset::Latin1 => "ISO-8859-1",
            Charset::Other(encoding) => encoding.name(),
        }
    }

    pub fn decode(&self, data: &[u8]) -> String {
        match self {
            Charset::Latin1 => encoding_rs::mem::decode_latin1(data).into_owned(),
            Charset::Other(encoding) => encoding.decode_without_bom_handling(data).0.into_owned(),
        }
    }

    /// Whether every character of `text` exists in this charset
    pub fn can_represent(&self, text: &str) -> bool {
        match self {
            Charset::Latin1 => encoding_rs::mem::is_str_latin1(text),
            Charset::Other(_) => self.encode(text, UnmappablePolicy::Strict).is_ok(),
        }
    }

    pub fn encode(&self, text: &str, policy: UnmappablePolicy) -> Result<Vec<u8>> {
        match self {
            Charset::Latin1 => {
                let mut out = Vec::with_capacity(text.len());
                for c in text.chars() {
                    if (c as u32) < 0x100 {
                        out.push(c as u32 as u8);
                    } else {
                        self.unmappable(text, policy, &mut out)?;
                    }
                }
                Ok(out)
            }
            Charset::Other(encoding) => {
                let mut encoder = encoding.new_encoder();
                let mut out = Vec::with_capacity(text.len() + 8);
                let mut src = text;
                loop {
                    let needed = encoder
                        .max_buffer_length_from_utf8_without_replacement(src.len())
                        .unwrap_or(src.len() * 4 + 16);
                    let start = out.len();
                    out.resize(start + needed.max(16), 0);
                    let (result, read, written) =
                        encoder.encode_from_utf8_without_replacement(src, &mut out[start..], true);
                    out.truncate(start + written);
                    src = &src[read..];
                    match result {
                        EncoderResult::InputEmpty => break,
                        EncoderResult::OutputFull => {}
                        EncoderResult::Unmappable(_) => self.unmappable(text, policy, &mut out)?,
                    }
                }
                Ok(out)
            }
        }
    }

    fn unmappable(&self, text: &str, policy: UnmappablePolicy, out: &mut Vec<u8>) -> Result<()> {
        match policy {
            UnmappablePolicy::Substitute => {
                out.push(b'?');
                Ok(())
            }
            UnmappablePolicy::Ignore => Ok(()),
            UnmappablePolicy::Strict => Err(TagError::EncodingConversionFailed {
                charset: self.name().to_string(),
                text: text.to_string(),
            }),
        }
    }
}

impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Charset({})", self.name())
    }
}

impl Serialize for Charset {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Charset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Charset::from_label(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown charset \"{label}\"")))
    }
}

/// Decode ID3 text with the declared encoding; ISO-8859-1 text goes through `legacy`
pub fn decode_text(data: &[u8], encoding: TextEncoding, legacy: Charset) -> String {
    match encoding {
        TextEncoding::Iso8859_1 => legacy.decode(data),
        TextEncoding::Utf16 => {
            // Detect BOM
            if data.len() >= 2 && data[0..2] == [0xFF, 0xFE] {
                UTF_16LE.decode_without_bom_handling(&data[2..]).0.into_owned()
            } else if data.len() >= 2 && data[0..2] == [0xFE, 0xFF] {
                UTF_16BE.decode_without_bom_handling(&data[2..]).0.into_owned()
            } else {
                UTF_16LE.decode_without_bom_handling(data).0.into_owned()
            }
        }
        TextEncoding::Utf16BE => UTF_16BE.decode_without_bom_handling(data).0.into_owned(),
        TextEncoding::Utf8 => String::from_utf8_lossy(data).into_owned(),
    }
}

/// Encode ID3 text with the given encoding, without terminator
pub fn encode_text(
    text: &str,
    encoding: TextEncoding,
    legacy: Charset,
    policy: UnmappablePolicy,
) -> Result<Vec<u8>> {
    match encoding {
        TextEncoding::Iso8859_1 => legacy.encode(text, policy),
        TextEncoding::Utf16 => {
            let mut out = Vec::with_capacity(2 + text.len() * 2);
            out.extend_from_slice(&[0xFF, 0xFE]);
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            Ok(out)
        }
        TextEncoding::Utf16BE => {
            let mut out = Vec::with_capacity(text.len() * 2);
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_be_bytes());
            }
            Ok(out)
        }
        TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
    }
}

/// Split `data` at the first terminator of `encoding`; UTF-16 terminators are 2-byte aligned
pub fn split_terminated(data: &[u8], encoding: TextEncoding) -> Option<(&[u8], &[u8])> {
    match encoding {
        TextEncoding::Iso8859_1 | TextEncoding::Utf8 => {
            let end = data.iter().position(|&b| b == 0)?;
            Some((&data[..end], &data[end + 1..]))
        }
        TextEncoding::Utf16 | TextEncoding::Utf16BE => {
            let end = data.chunks_exact(2).position(|c| c == [0, 0])? * 2;
            Some((&data[..end], &data[end + 2..]))
        }
    }
}

/// Split a string list on terminators, dropping trailing empty entries
pub fn split_string_list(data: &[u8], encoding: TextEncoding) -> Vec<&[u8]> {
    let mut values = Vec::new();
    let mut rest = data;
    while let Some((value, tail)) = split_terminated(rest, encoding) {
        values.push(value);
        rest = tail;
    }
    if !rest.is_empty() {
        values.push(rest);
    }
    while values.last().map_or(false, |v| v.is_empty()) {
        values.pop();
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_roundtrip() {
        let bytes = Charset::Latin1.encode("Café", UnmappablePolicy::Strict).unwrap();
        assert_eq!(bytes, b"Caf\xE9");
        assert_eq!(Charset::Latin1.decode(&bytes), "Café");
        // 0x80..0x9F are C1 controls in ISO-8859-1, not windows-1252 punctuation
        assert_eq!(Charset::Latin1.decode(&[0x80]), "\u{80}");
    }

    #[test]
    fn test_unmappable_policies() {
        let latin = Charset::Latin1;
        assert_eq!(latin.encode("a中b", UnmappablePolicy::Substitute).unwrap(), b"a?b");
        assert_eq!(latin.encode("a中b", UnmappablePolicy::Ignore).unwrap(), b"ab");
        let err = latin.encode("a中b", UnmappablePolicy::Strict).unwrap_err();
        assert!(matches!(err, TagError::EncodingConversionFailed { .. }));
    }

    #[test]
    fn test_other_charset() {
        let cyr = Charset::from_label("windows-1251").unwrap();
        let bytes = cyr.encode("Привет", UnmappablePolicy::Strict).unwrap();
        assert_eq!(bytes.len(), 6);
        assert_eq!(cyr.decode(&bytes), "Привет");
        assert!(!cyr.can_represent("日本"));
        assert_eq!(cyr.encode("ж日", UnmappablePolicy::Substitute).unwrap(), [0xE6, b'?']);
    }

    #[test]
    fn test_charset_labels() {
        assert_eq!(Charset::from_label("Latin1"), Some(Charset::Latin1));
        assert!(Charset::from_label("utf-16le").is_none());
        assert!(Charset::from_label("no-such-charset").is_none());
        assert_eq!(Charset::from_label("koi8-r").unwrap().name(), "KOI8-R");
    }

    #[test]
    fn test_utf16_roundtrip() {
        let text = "é中🎵";
        let bytes = encode_text(text, TextEncoding::Utf16, Charset::Latin1, UnmappablePolicy::Strict)
            .unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xFE]);
        assert_eq!(decode_text(&bytes, TextEncoding::Utf16, Charset::Latin1), text);

        let be = encode_text(text, TextEncoding::Utf16BE, Charset::Latin1, UnmappablePolicy::Strict)
            .unwrap();
        assert_eq!(decode_text(&be, TextEncoding::Utf16BE, Charset::Latin1), text);
    }

    #[test]
    fn test_split_string_list() {
        let data = b"one\0two\0\0";
        let values = split_string_list(data, TextEncoding::Iso8859_1);
        assert_eq!(values, vec![&b"one"[..], &b"two"[..]]);

        // A zero byte inside a UTF-16 code unit is not a terminator
        let utf16 = [0x41, 0x00, 0x00, 0x00, 0x42, 0x00];
        let values = split_string_list(&utf16, TextEncoding::Utf16BE);
        assert_eq!(values, vec![&[0x41, 0x00][..], &[0x42, 0x00][..]]);
    }
}
