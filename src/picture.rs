// Embedded picture handling shared by every format

use serde::{Deserialize, Serialize};

use crate::error::{Result, TagError};
use crate::utils::io::{write_u32_be, SliceReader};

/// Picture types according to the ID3v2 APIC specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PictureType {
    Other = 0,
    FileIcon = 1,
    OtherFileIcon = 2,
    #[default]
    CoverFront = 3,
    CoverBack = 4,
    LeafletPage = 5,
    Media = 6,
    LeadArtist = 7,
    Artist = 8,
    Conductor = 9,
    Band = 10,
    Composer = 11,
    Lyricist = 12,
    RecordingLocation = 13,
    DuringRecording = 14,
    DuringPerformance = 15,
    VideoScreenCapture = 16,
    BrightColouredFish = 17,
    Illustration = 18,
    BandLogo = 19,
    PublisherLogo = 20,
}

impl PictureType {
    pub const ALL: [PictureType; 21] = [
        PictureType::Other,
        PictureType::FileIcon,
        PictureType::OtherFileIcon,
        PictureType::CoverFront,
        PictureType::CoverBack,
        PictureType::LeafletPage,
        PictureType::Media,
        PictureType::LeadArtist,
        PictureType::Artist,
        PictureType::Conductor,
        PictureType::Band,
        PictureType::Composer,
        PictureType::Lyricist,
        PictureType::RecordingLocation,
        PictureType::DuringRecording,
        PictureType::DuringPerformance,
        PictureType::VideoScreenCapture,
        PictureType::BrightColouredFish,
        PictureType::Illustration,
        PictureType::BandLogo,
        PictureType::PublisherLogo,
    ];

    /// Codes outside 0..=20 are not part of the enumeration
    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PictureType::Other => "Other",
            PictureType::FileIcon => "File Icon",
            PictureType::OtherFileIcon => "Other File Icon",
            PictureType::CoverFront => "Cover (front)",
            PictureType::CoverBack => "Cover (back)",
            PictureType::LeafletPage => "Leaflet page",
            PictureType::Media => "Media",
            PictureType::LeadArtist => "Lead artist",
            PictureType::Artist => "Artist",
            PictureType::Conductor => "Conductor",
            PictureType::Band => "Band",
            PictureType::Composer => "Composer",
            PictureType::Lyricist => "Lyricist",
            PictureType::RecordingLocation => "Recording Location",
            PictureType::DuringRecording => "During recording",
            PictureType::DuringPerformance => "During performance",
            PictureType::VideoScreenCapture => "Video screen capture",
            PictureType::BrightColouredFish => "Bright coloured fish",
            PictureType::Illustration => "Illustration",
            PictureType::BandLogo => "Band logo",
            PictureType::PublisherLogo => "Publisher logo",
        }
    }
}

/// Image format, sniffed from the leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Unknown,
}

impl PictureFormat {
    pub fn from_data(data: &[u8]) -> Self {
        if data.starts_with(&[0xFF, 0xD8]) {
            PictureFormat::Jpeg
        } else if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            PictureFormat::Png
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            PictureFormat::Gif
        } else if is_bmp_header(data) {
            PictureFormat::Bmp
        } else {
            PictureFormat::Unknown
        }
    }

    pub fn from_mime_type(mime: &str) -> Self {
        match mime.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => PictureFormat::Jpeg,
            "image/png" => PictureFormat::Png,
            "image/gif" => PictureFormat::Gif,
            "image/bmp" | "image/x-ms-bmp" => PictureFormat::Bmp,
            _ => PictureFormat::Unknown,
        }
    }

    /// Unknown images are labelled as JPEG, the most widely accepted type
    pub fn mime_type(&self) -> &'static str {
        match self {
            PictureFormat::Jpeg | PictureFormat::Unknown => "image/jpeg",
            PictureFormat::Png => "image/png",
            PictureFormat::Gif => "image/gif",
            PictureFormat::Bmp => "image/bmp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            PictureFormat::Jpeg | PictureFormat::Unknown => "jpg",
            PictureFormat::Png => "png",
            PictureFormat::Gif => "gif",
            PictureFormat::Bmp => "bmp",
        }
    }
}

/// "BM", a 14-byte file header with zero reserved bytes, and a pixel offset inside the file
fn is_bmp_header(data: &[u8]) -> bool {
    data.len() >= 14
        && data.starts_with(b"BM")
        && data[6..10] == [0, 0, 0, 0]
        && u32::from_le_bytes([data[10], data[11], data[12], data[13]]) as usize >= 14
}

/// One embedded picture
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Picture {
    pub picture_type: PictureType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Display hints only
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(with = "crate::utils::base64::serde_bytes")]
    pub data: Vec<u8>,
}

impl Picture {
    pub fn new(picture_type: PictureType, data: Vec<u8>) -> Self {
        Picture {
            picture_type,
            data,
            ..Default::default()
        }
    }

    pub fn format(&self) -> PictureFormat {
        PictureFormat::from_data(&self.data)
    }

    pub fn mime_type(&self) -> &'static str {
        self.format().mime_type()
    }

    /// Decode the FLAC PICTURE / METADATA_BLOCK_PICTURE layout, rejecting any
    /// sub-field that does not fit in `data`
    pub fn from_flac_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = SliceReader::new(data);

        let type_code = reader.read_u32_be()?;
        let picture_type = PictureType::from_u32(type_code)
            .ok_or_else(|| TagError::corrupt(format!("invalid picture type {type_code}")))?;

        let mime_length = reader.read_u32_be()? as usize;
        let mime_type = String::from_utf8_lossy(reader.take(mime_length)?).into_owned();
        if PictureFormat::from_mime_type(&mime_type) == PictureFormat::Unknown {
            return Err(TagError::corrupt(format!("unsupported picture MIME type \"{mime_type}\"")));
        }

        let desc_length = reader.read_u32_be()? as usize;
        let description = String::from_utf8_lossy(reader.take(desc_length)?).into_owned();

        let width = reader.read_u32_be()?;
        let height = reader.read_u32_be()?;
        let _depth = reader.read_u32_be()?;
        let _colors = reader.read_u32_be()?;

        let data_length = reader.read_u32_be()? as usize;
        let picture_data = reader.take(data_length)?.to_vec();

        Ok(Picture {
            picture_type,
            description: (!description.is_empty()).then_some(description),
            width,
            height,
            data: picture_data,
        })
    }

    /// Encode the picture using the FLAC PICTURE layout
    pub fn to_flac_bytes(&self) -> Vec<u8> {
        let mime_type = self.mime_type();
        let description = self.description.as_deref().unwrap_or("");

        let mut result = Vec::with_capacity(32 + mime_type.len() + description.len() + self.data.len());
        write_u32_be(self.picture_type as u32, &mut result);
        write_u32_be(mime_type.len() as u32, &mut result);
        result.extend_from_slice(mime_type.as_bytes());
        write_u32_be(description.len() as u32, &mut result);
        result.extend_from_slice(description.as_bytes());
        write_u32_be(self.width, &mut result);
        write_u32_be(self.height, &mut result);
        // Colour depth and palette size are not tracked
        write_u32_be(0, &mut result);
        write_u32_be(0, &mut result);
        write_u32_be(self.data.len() as u32, &mut result);
        result.extend_from_slice(&self.data);

        result
    }
}
