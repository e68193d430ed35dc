// ID3 frame definitions and parsers

use crate::error::{Result, TagError};
use crate::picture::{Picture, PictureFormat, PictureType};
use crate::utils::encoding::{
    decode_text, encode_text, split_string_list, split_terminated, Charset, TextEncoding,
    UnmappablePolicy,
};

/// One frame of an ID3v2 tag, with format flags already undone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Four-character ID; v2.2 frames are upgraded where a mapping exists
    pub id: String,
    pub data: Vec<u8>,
    /// "Discard when the tag is altered" status flag
    pub discard_on_alter: bool,
}

impl Frame {
    pub fn new(id: &str, data: Vec<u8>) -> Self {
        Frame {
            id: id.to_string(),
            data,
            discard_on_alter: false,
        }
    }
}

/// Map an ID3v2.2 three-character frame ID to its v2.3 equivalent
pub fn upgrade_v22_id(id: &str) -> Option<&'static str> {
    let upgraded = match id {
        "BUF" => "RBUF",
        "CNT" => "PCNT",
        "COM" => "COMM",
        "CRA" => "AENC",
        "ETC" => "ETCO",
        "GEO" => "GEOB",
        "IPL" => "IPLS",
        "MCI" => "MCDI",
        "MLL" => "MLLT",
        "PIC" => "APIC",
        "POP" => "POPM",
        "REV" => "RVRB",
        "SLT" => "SYLT",
        "STC" => "SYTC",
        "TAL" => "TALB",
        "TBP" => "TBPM",
        "TCM" => "TCOM",
        "TCO" => "TCON",
        "TCR" => "TCOP",
        "TDA" => "TDAT",
        "TDY" => "TDLY",
        "TEN" => "TENC",
        "TFT" => "TFLT",
        "TIM" => "TIME",
        "TKE" => "TKEY",
        "TLA" => "TLAN",
        "TLE" => "TLEN",
        "TMT" => "TMED",
        "TOA" => "TOPE",
        "TOF" => "TOFN",
        "TOL" => "TOLY",
        "TOR" => "TORY",
        "TOT" => "TOAL",
        "TP1" => "TPE1",
        "TP2" => "TPE2",
        "TP3" => "TPE3",
        "TP4" => "TPE4",
        "TPA" => "TPOS",
        "TPB" => "TPUB",
        "TRC" => "TSRC",
        "TRD" => "TRDA",
        "TRK" => "TRCK",
        "TSI" => "TSIZ",
        "TSS" => "TSSE",
        "TT1" => "TIT1",
        "TT2" => "TIT2",
        "TT3" => "TIT3",
        "TXT" => "TEXT",
        "TXX" => "TXXX",
        "TYE" => "TYER",
        "UFI" => "UFID",
        "ULT" => "USLT",
        "WAF" => "WOAF",
        "WAR" => "WOAR",
        "WAS" => "WOAS",
        "WCM" => "WCOM",
        "WCP" => "WCOP",
        "WPB" => "WPUB",
        "WXX" => "WXXX",
        _ => return None,
    };
    Some(upgraded)
}

/// Frame IDs are upper-case ASCII letters and digits
pub fn is_valid_id(id: &[u8]) -> bool {
    !id.is_empty() && id.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

fn frame_encoding(data: &[u8]) -> Result<(TextEncoding, &[u8])> {
    let (&byte, rest) = data
        .split_first()
        .ok_or_else(|| TagError::corrupt("empty frame"))?;
    let encoding = TextEncoding::from_byte(byte)
        .ok_or_else(|| TagError::UnsupportedFeature(format!("text encoding {byte}")))?;
    Ok((encoding, rest))
}

/// Decode a text frame into its list of values
pub fn decode_text_frame(data: &[u8], legacy: Charset) -> Result<Vec<String>> {
    let (encoding, text) = frame_encoding(data)?;
    Ok(split_string_list(text, encoding)
        .into_iter()
        .map(|value| decode_text(value, encoding, legacy))
        .collect())
}

/// Encode text frame data
pub fn encode_text_frame(
    text: &str,
    encoding: TextEncoding,
    legacy: Charset,
    policy: UnmappablePolicy,
) -> Result<Vec<u8>> {
    let mut result = vec![encoding as u8];
    result.extend(encode_text(text, encoding, legacy, policy)?);
    Ok(result)
}

/// COMM / USLT payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentFrame {
    pub language: [u8; 3],
    pub description: String,
    pub text: String,
}

impl CommentFrame {
    pub fn parse(data: &[u8], legacy: Charset) -> Result<Self> {
        let (encoding, rest) = frame_encoding(data)?;
        if rest.len() < 3 {
            return Err(TagError::corrupt("COMM frame too short"));
        }
        let mut language = [0u8; 3];
        language.copy_from_slice(&rest[..3]);

        let (description, text) = split_terminated(&rest[3..], encoding).unwrap_or((&rest[3..], &[]));
        let text = split_string_list(text, encoding)
            .first()
            .map(|t| decode_text(t, encoding, legacy))
            .unwrap_or_default();

        Ok(CommentFrame {
            language,
            description: decode_text(description, encoding, legacy),
            text,
        })
    }

    pub fn render(
        &self,
        encoding: TextEncoding,
        legacy: Charset,
        policy: UnmappablePolicy,
    ) -> Result<Vec<u8>> {
        let mut out = vec![encoding as u8];
        out.extend_from_slice(&self.language);
        out.extend(encode_text(&self.description, encoding, legacy, policy)?);
        out.extend_from_slice(encoding.terminator());
        out.extend(encode_text(&self.text, encoding, legacy, policy)?);
        Ok(out)
    }

    /// iTunes stores normalization and gapless data as comments
    pub fn is_itunes_private(&self) -> bool {
        self.description.starts_with("iTun")
    }
}

/// WXXX payload: description plus a Latin-1 URL
pub fn parse_user_url(data: &[u8], legacy: Charset) -> Result<(String, String)> {
    let (encoding, rest) = frame_encoding(data)?;
    let (description, url) = split_terminated(rest, encoding)
        .ok_or_else(|| TagError::corrupt("WXXX frame without description terminator"))?;
    let url_end = url.iter().position(|&b| b == 0).unwrap_or(url.len());
    Ok((
        decode_text(description, encoding, legacy),
        Charset::Latin1.decode(&url[..url_end]),
    ))
}

pub fn render_user_url(url: &str, policy: UnmappablePolicy) -> Result<Vec<u8>> {
    let mut out = vec![TextEncoding::Iso8859_1 as u8, 0];
    out.extend(Charset::Latin1.encode(url, policy)?);
    Ok(out)
}

/// Decode APIC (v2.3/v2.4) or PIC (v2.2) frame data
pub fn parse_picture(data: &[u8], v22: bool, legacy: Charset) -> Result<Picture> {
    let (encoding, rest) = frame_encoding(data)?;

    let rest = if v22 {
        // Three-letter image format instead of a MIME type
        rest.get(3..)
            .ok_or_else(|| TagError::corrupt("PIC frame too short"))?
    } else {
        let (_mime, rest) = split_terminated(rest, TextEncoding::Iso8859_1)
            .ok_or_else(|| TagError::corrupt("APIC MIME type is not terminated"))?;
        rest
    };

    let (&type_code, rest) = rest
        .split_first()
        .ok_or_else(|| TagError::corrupt("APIC frame too short"))?;
    let picture_type = PictureType::from_u32(u32::from(type_code))
        .ok_or_else(|| TagError::corrupt(format!("invalid picture type {type_code}")))?;

    let (description, image) = split_terminated(rest, encoding)
        .ok_or_else(|| TagError::corrupt("APIC description is not terminated"))?;
    if image.is_empty() {
        return Err(TagError::corrupt("APIC frame without image data"));
    }

    let description = decode_text(description, encoding, legacy);
    Ok(Picture {
        picture_type,
        description: (!description.is_empty()).then_some(description),
        width: 0,
        height: 0,
        data: image.to_vec(),
    })
}

pub fn render_picture(
    picture: &Picture,
    encoding: TextEncoding,
    legacy: Charset,
    policy: UnmappablePolicy,
) -> Result<Vec<u8>> {
    let description = picture.description.as_deref().unwrap_or("");
    let mime = PictureFormat::from_data(&picture.data).mime_type();

    let mut out = Vec::new();
    out.try_reserve(picture.data.len() + mime.len() + description.len() * 2 + 8)?;
    out.push(encoding as u8);
    out.extend_from_slice(mime.as_bytes());
    out.push(0);
    out.push(picture.picture_type as u8);
    out.extend(encode_text(description, encoding, legacy, policy)?);
    out.extend_from_slice(encoding.terminator());
    out.extend_from_slice(&picture.data);
    Ok(out)
}

/// Resolve a TCON value: `(N)`, `(N)Refinement`, bare `N`, `(RX)`, `(CR)` or free text
pub fn parse_genre(value: &str) -> String {
    use crate::id3::genres::genre_name;

    let value = value.trim();
    if let Ok(code) = value.parse::<u8>() {
        return genre_name(code).unwrap_or_default().to_string();
    }

    let mut names = Vec::new();
    let mut rest = value;
    while let Some(inner) = rest.strip_prefix('(') {
        // "((" escapes a literal parenthesis
        if inner.starts_with('(') {
            rest = inner;
            break;
        }
        let Some(close) = inner.find(')') else { break };
        let reference = &inner[..close];
        match reference {
            "RX" => names.push("Remix"),
            "CR" => names.push("Cover"),
            _ => match reference.parse::<u8>().ok().and_then(genre_name) {
                Some(name) => names.push(name),
                None => break,
            },
        }
        rest = &inner[close + 1..];
    }

    let refinement = rest.trim();
    if !refinement.is_empty() {
        refinement.to_string()
    } else {
        names.join(" / ")
    }
}
