// The format-agnostic tag record every codec reads into and writes from

use serde::{Deserialize, Serialize};

use crate::field_mapping::StandardField;
use crate::picture::Picture;

/// Normalized tag of one audio file
///
/// Track and disc numbers are kept as display strings; codecs split `N/M` on read and
/// recombine them on write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disc_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disc_total: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_total: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded_by: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pictures: Vec<Picture>,
    /// Unsupported `KEY=value` fields kept for lossless round trips
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub other: Vec<String>,
    /// The on-disk tag needs normalizing by the next save
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dirty: bool,
}

impl TagRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: StandardField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    /// Set a text field; empty or whitespace-only values clear it
    pub fn set(&mut self, field: StandardField, value: Option<String>) {
        *self.slot_mut(field) = value.filter(|v| !v.trim().is_empty());
    }

    pub fn add_picture(&mut self, picture: Picture) {
        self.pictures.push(picture);
    }

    /// True when no text field, picture or preserved field is set
    pub fn is_empty(&self) -> bool {
        !self.has_text_fields() && self.pictures.is_empty() && self.other.is_empty()
    }

    pub fn has_text_fields(&self) -> bool {
        StandardField::ALL.iter().any(|&f| self.get(f).is_some())
    }

    fn slot(&self, field: StandardField) -> &Option<String> {
        match field {
            StandardField::Title => &self.title,
            StandardField::Artist => &self.artist,
            StandardField::AlbumArtist => &self.album_artist,
            StandardField::Album => &self.album,
            StandardField::DiscNumber => &self.disc_number,
            StandardField::DiscTotal => &self.disc_total,
            StandardField::Year => &self.year,
            StandardField::Track => &self.track,
            StandardField::TrackTotal => &self.track_total,
            StandardField::Genre => &self.genre,
            StandardField::Comment => &self.comment,
            StandardField::Composer => &self.composer,
            StandardField::OriginalArtist => &self.original_artist,
            StandardField::Copyright => &self.copyright,
            StandardField::Url => &self.url,
            StandardField::EncodedBy => &self.encoded_by,
        }
    }

    fn slot_mut(&mut self, field: StandardField) -> &mut Option<String> {
        match field {
            StandardField::Title => &mut self.title,
            StandardField::Artist => &mut self.artist,
            StandardField::AlbumArtist => &mut self.album_artist,
            StandardField::Album => &mut self.album,
            StandardField::DiscNumber => &mut self.disc_number,
            StandardField::DiscTotal => &mut self.disc_total,
            StandardField::Year => &mut self.year,
            StandardField::Track => &mut self.track,
            StandardField::TrackTotal => &mut self.track_total,
            StandardField::Genre => &mut self.genre,
            StandardField::Comment => &mut self.comment,
            StandardField::Composer => &mut self.composer,
            StandardField::OriginalArtist => &mut self.original_artist,
            StandardField::Copyright => &mut self.copyright,
            StandardField::Url => &mut self.url,
            StandardField::EncodedBy => &mut self.encoded_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picture::PictureType;

    #[test]
    fn test_set_clears_empty() {
        let mut record = TagRecord::new();
        record.set(StandardField::Title, Some("Song".to_string()));
        assert_eq!(record.get(StandardField::Title), Some("Song"));
        record.set(StandardField::Title, Some("   ".to_string()));
        assert_eq!(record.title, None);
        assert!(record.is_empty());
    }

    #[test]
    fn test_emptiness() {
        let mut record = TagRecord::new();
        record.add_picture(Picture::new(PictureType::CoverFront, vec![0xFF, 0xD8]));
        assert!(!record.is_empty());
        assert!(!record.has_text_fields());
    }

    #[test]
    fn test_json_shape() {
        let mut record = TagRecord::new();
        record.artist = Some("A".to_string());
        record.add_picture(Picture::new(PictureType::CoverFront, b"hello".to_vec()));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["artist"], "A");
        assert_eq!(json["pictures"][0]["data"], "aGVsbG8=");
        assert_eq!(json["pictures"][0]["picture_type"], "cover_front");
        assert!(json.get("dirty").is_none());

        let back: TagRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
