// WavPack: APEv2 tags with lower-case item names

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::ape;
use crate::config::TagConfig;
use crate::error::{Result, TagError};
use crate::field_mapping::ApeKeyStyle;
use crate::record::TagRecord;
use crate::report::WriteReport;

/// Block header signature
pub const WAVPACK_SIGNATURE: &[u8; 4] = b"wvpk";

fn check_signature(path: &Path) -> Result<()> {
    let mut signature = [0u8; 4];
    let mut file = File::open(path)?;
    if file.read(&mut signature)? < 4 || &signature != WAVPACK_SIGNATURE {
        return Err(TagError::not_format("WavPack"));
    }
    Ok(())
}

pub fn read<P: AsRef<Path>>(path: P, config: &TagConfig) -> Result<TagRecord> {
    check_signature(path.as_ref())?;
    ape::file::read(path, ApeKeyStyle::WavPack, config)
}

pub fn write<P: AsRef<Path>>(path: P, record: &TagRecord, config: &TagConfig) -> Result<WriteReport> {
    check_signature(path.as_ref())?;
    ape::file::write(path, record, ApeKeyStyle::WavPack, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_mapping::StandardField;
    use crate::picture::{Picture, PictureType};
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn test_lower_case_items() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.wv");
        fs::write(&path, b"wvpk\x20\0\0\0block").unwrap();

        let mut record = TagRecord::new();
        record.set(StandardField::AlbumArtist, Some("Band".to_string()));
        record.set(StandardField::DiscNumber, Some("1".to_string()));
        record.set(StandardField::DiscTotal, Some("2".to_string()));
        record.set(StandardField::Url, Some("http://example.com".to_string()));
        record.add_picture(Picture::new(PictureType::CoverFront, vec![0xFF, 0xD8, 0xFF]));

        let config = TagConfig::default();
        write(&path, &record, &config).unwrap();
        let data = fs::read(&path).unwrap();
        let contains = |needle: &[u8]| data.windows(needle.len()).any(|w| w == needle);
        assert!(contains(b"album artist\0Band"));
        assert!(contains(b"part\x001/2"));
        assert!(contains(b"copyright url\0"));
        assert!(contains(b"cover art (front)\0"));

        assert_eq!(read(&path, &config).unwrap(), record);
    }

    #[test]
    fn test_signature_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.wv");
        fs::write(&path, b"RIFF").unwrap();
        let err = read(&path, &TagConfig::default()).unwrap_err();
        assert!(matches!(err, TagError::NotThisFormat(_)));
    }
}
