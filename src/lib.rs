//! Tagforge - tag codecs for batch audio tag editing
//!
//! Every format is read into a [`TagRecord`] and written back from one. The two
//! entry points are [`read_tag`] and [`write_tag`], which pick the codec from the
//! file extension.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;
use serde::Serialize;

pub mod ape;
pub mod config;
pub mod error;
pub mod field_mapping;
pub mod file_type;
pub mod flac;
pub mod id3;
pub mod mp4;
pub mod ogg;
pub mod opus;
pub mod picture;
pub mod record;
pub mod report;
pub mod rewrite;
pub mod utils;
pub mod wavpack;

pub use config::{EncoderCapabilities, TagConfig};
pub use error::{ErrorKind, Result, TagError};
pub use field_mapping::StandardField;
pub use file_type::{describe_file, FileDescription, FileKind};
pub use picture::{Picture, PictureFormat, PictureType};
pub use record::TagRecord;
pub use report::{TagWarning, WriteReport};

use field_mapping::ApeKeyStyle;
use utils::io::is_zero_filled;

/// Tag codec of a file kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagFormat {
    /// ID3v2 with an ID3v1 trailer (MP3, MP2)
    Id3,
    /// APEv2 (Musepack, Monkey's Audio, OptimFROG)
    Ape,
    /// Vorbis comment in an Ogg Vorbis or Speex stream
    VorbisComment,
    /// OpusTags in an Ogg Opus stream
    Opus,
    Flac,
    Mp4,
    WavPack,
}

impl TagFormat {
    pub fn name(self) -> &'static str {
        match self {
            TagFormat::Id3 => "ID3",
            TagFormat::Ape => "APEv2",
            TagFormat::VorbisComment => "Vorbis comment",
            TagFormat::Opus => "Opus tags",
            TagFormat::Flac => "FLAC metadata",
            TagFormat::Mp4 => "MP4 metadata",
            TagFormat::WavPack => "WavPack APEv2",
        }
    }

    pub fn read<P: AsRef<Path>>(self, path: P, config: &TagConfig) -> Result<TagRecord> {
        match self {
            TagFormat::Id3 => id3::read(path, config),
            TagFormat::Ape => ape::file::read(path, ApeKeyStyle::Ape, config),
            TagFormat::VorbisComment => ogg::vorbis::read(path, None, config),
            TagFormat::Opus => opus::read(path, config),
            TagFormat::Flac => flac::read(path, config),
            TagFormat::Mp4 => mp4::read(path, config),
            TagFormat::WavPack => wavpack::read(path, config),
        }
    }

    pub fn write<P: AsRef<Path>>(self, path: P, record: &TagRecord, config: &TagConfig) -> Result<WriteReport> {
        match self {
            TagFormat::Id3 => id3::write(path, record, config),
            TagFormat::Ape => ape::file::write(path, record, ApeKeyStyle::Ape, config),
            TagFormat::VorbisComment => ogg::vorbis::write(path, record, None, config),
            TagFormat::Opus => opus::write(path, record, config),
            TagFormat::Flac => flac::write(path, record, config),
            TagFormat::Mp4 => mp4::write(path, record, config),
            TagFormat::WavPack => wavpack::write(path, record, config),
        }
    }
}

impl std::fmt::Display for TagFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Codec for `path`, after rejecting all-zero files
fn format_for(path: &Path) -> Result<TagFormat> {
    let mut reader = BufReader::new(File::open(path)?);
    if is_zero_filled(&mut reader)? {
        return Err(TagError::CorruptedFile);
    }

    let description = describe_file(path);
    let format = description.tag_format.ok_or_else(|| {
        TagError::UnsupportedFeature(format!("no tag codec for \"{}\"", path.display()))
    })?;
    debug!("Using {format} codec for {}", path.display());
    Ok(format)
}

/// Read the tag of a file into a record
pub fn read_tag<P: AsRef<Path>>(path: P, config: &TagConfig) -> Result<TagRecord> {
    let path = path.as_ref();
    format_for(path)?.read(path, config)
}

/// Write a record as the file's tag
pub fn write_tag<P: AsRef<Path>>(path: P, record: &TagRecord, config: &TagConfig) -> Result<WriteReport> {
    let path = path.as_ref();
    format_for(path)?.write(path, record, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_zero_filled_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.mp3");
        fs::write(&path, vec![0u8; 4096]).unwrap();

        let err = read_tag(&path, &TagConfig::default()).unwrap_err();
        assert!(matches!(err, TagError::CorruptedFile));
        assert_eq!(err.kind(), ErrorKind::CorruptData);
        assert!(write_tag(&path, &TagRecord::new(), &TagConfig::default()).is_err());
        assert_eq!(fs::read(&path).unwrap(), vec![0u8; 4096]);
    }

    #[test]
    fn test_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"hello").unwrap();
        let err = read_tag(&path, &TagConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
    }

    #[test]
    fn test_dispatch_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.MP3");
        fs::write(&path, b"\xFF\xFB\x90\x00frames").unwrap();

        let mut record = TagRecord::new();
        record.set(StandardField::Title, Some("Title".to_string()));
        write_tag(&path, &record, &TagConfig::default()).unwrap();
        assert_eq!(read_tag(&path, &TagConfig::default()).unwrap(), record);
    }
}
