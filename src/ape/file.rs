// APE-tagged files: Musepack, Monkey's Audio, OptimFROG and WavPack

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use log::{debug, info};

use super::{find_footer, find_header, ApeLocation, ApeTag};
use crate::config::TagConfig;
use crate::error::Result;
use crate::field_mapping::ApeKeyStyle;
use crate::id3::v1::Id3v1Tag;
use crate::id3::v2::find_id3v2;
use crate::record::TagRecord;
use crate::report::WriteReport;
use crate::rewrite::{apply_splices, read_region, Splice};

/// Tag regions found in an APE-tagged file
#[derive(Debug, Clone, Default)]
pub struct ApeRegions {
    /// End of a leading ID3v2 tag, which is left alone
    pub id3v2_end: u64,
    /// Tag stored at the start of the file, against the APEv2 rules
    pub leading: Option<ApeLocation>,
    /// Tag stored before the end (or before ID3v1)
    pub trailing: Option<ApeLocation>,
    /// Start of a trailing ID3v1 tag
    pub id3v1_start: Option<u64>,
    pub file_len: u64,
}

impl ApeRegions {
    pub fn scan<R: Read + Seek>(reader: &mut R, file_len: u64) -> Result<Self> {
        let id3v2_end = match find_id3v2(reader)? {
            Some(header) => header.total_size().min(file_len),
            None => 0,
        };

        let id3v1_start = Id3v1Tag::find(reader, file_len)?
            .map(|_| file_len - Id3v1Tag::TAG_SIZE as u64);
        let tag_end = id3v1_start.unwrap_or(file_len);

        let trailing = find_footer(reader, tag_end)?;
        let leading = find_header(reader, id3v2_end, file_len)?
            .filter(|leading| trailing.map_or(true, |t| t.start != leading.start));

        Ok(ApeRegions {
            id3v2_end,
            leading,
            trailing,
            id3v1_start,
            file_len,
        })
    }

    /// The tag that is read: the trailing one, or else the leading one
    pub fn primary(&self) -> Option<&ApeLocation> {
        self.trailing.as_ref().or(self.leading.as_ref())
    }

    /// Where the trailing tag starts, or where a new one belongs
    pub fn tail_start(&self) -> u64 {
        match (&self.trailing, self.id3v1_start) {
            (Some(tag), _) => tag.start,
            (None, Some(v1)) => v1,
            (None, None) => self.file_len,
        }
    }
}

fn open(path: &Path) -> Result<(BufReader<File>, u64)> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    Ok((BufReader::new(file), file_len))
}

/// Read the APE tag of a file into a record
pub fn read<P: AsRef<Path>>(path: P, style: ApeKeyStyle, config: &TagConfig) -> Result<TagRecord> {
    let (mut reader, file_len) = open(path.as_ref())?;
    let regions = ApeRegions::scan(&mut reader, file_len)?;

    let Some(location) = regions.primary() else {
        debug!("No APE tag in {}", path.as_ref().display());
        return Ok(TagRecord::new());
    };

    let tag = ApeTag::read(&mut reader, location, config)?;
    let mut record = tag.to_record(style, config);
    // A header-first tag gets moved to the end by the next save
    record.dirty |= regions.trailing.is_none();
    Ok(record)
}

/// Write a record as the file's APE tag, keeping unrelated items and a trailing ID3v1 tag
pub fn write<P: AsRef<Path>>(
    path: P,
    record: &TagRecord,
    style: ApeKeyStyle,
    config: &TagConfig,
) -> Result<WriteReport> {
    let path = path.as_ref();
    let mut report = WriteReport::new();

    let (mut reader, file_len) = open(path)?;
    let regions = ApeRegions::scan(&mut reader, file_len)?;

    let mut tag = match regions.primary() {
        Some(location) => ApeTag::read(&mut reader, location, config)?,
        None => ApeTag::default(),
    };
    tag.apply_record(record, style, config, &mut report);

    let mut new_tail = if tag.is_empty() { Vec::new() } else { tag.render()? };
    if let Some(v1_start) = regions.id3v1_start {
        new_tail.extend(read_region(&mut reader, v1_start, Id3v1Tag::TAG_SIZE)?);
    }
    drop(reader);

    let mut splices = vec![Splice::new(regions.tail_start(), file_len, new_tail)];
    if let Some(leading) = regions.leading {
        debug!("Moving header-first APE tag to the end of {}", path.display());
        splices.push(Splice::remove(leading.start, leading.end));
    }

    let strategy = apply_splices(path, splices)?;
    info!("Wrote APE tag to {} ({strategy:?})", path.display());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_mapping::StandardField;
    use std::fs;

    fn audio_file(contents: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.mpc");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, path) = audio_file(b"MPCKaudio-payload");
        let mut record = TagRecord::new();
        record.set(StandardField::Title, Some("Song".to_string()));
        record.set(StandardField::Track, Some("3".to_string()));
        record.set(StandardField::TrackTotal, Some("12".to_string()));

        let config = TagConfig::default();
        write(&path, &record, ApeKeyStyle::Ape, &config).unwrap();
        let data = fs::read(&path).unwrap();
        assert!(data.starts_with(b"MPCKaudio-payload"));

        let back = read(&path, ApeKeyStyle::Ape, &config).unwrap();
        assert_eq!(back, record);

        // Clearing every field removes the tag entirely
        write(&path, &TagRecord::new(), ApeKeyStyle::Ape, &config).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"MPCKaudio-payload");
    }

    #[test]
    fn test_total_without_number() {
        let (_dir, path) = audio_file(b"MPCKaudio-payload");
        let mut record = TagRecord::new();
        record.set(StandardField::TrackTotal, Some("12".to_string()));
        record.set(StandardField::DiscTotal, Some("2".to_string()));

        let config = TagConfig::default();
        write(&path, &record, ApeKeyStyle::Ape, &config).unwrap();
        let data = fs::read(&path).unwrap();
        let contains = |needle: &[u8]| data.windows(needle.len()).any(|w| w == needle);
        assert!(contains(b"Track\0/12"));
        assert!(contains(b"Part\0/2"));

        let back = read(&path, ApeKeyStyle::Ape, &config).unwrap();
        assert_eq!(back, record);
        write(&path, &back, ApeKeyStyle::Ape, &config).unwrap();
        assert_eq!(read(&path, ApeKeyStyle::Ape, &config).unwrap(), record);
    }

    #[test]
    fn test_trailing_id3v1_is_kept() {
        let mut contents = b"MAC audio".to_vec();
        let mut v1 = [0u8; 128];
        v1[..3].copy_from_slice(b"TAG");
        v1[3..6].copy_from_slice(b"Old");
        contents.extend_from_slice(&v1);
        let (_dir, path) = audio_file(&contents);

        let mut record = TagRecord::new();
        record.set(StandardField::Album, Some("Album".to_string()));
        write(&path, &record, ApeKeyStyle::Ape, &TagConfig::default()).unwrap();

        let data = fs::read(&path).unwrap();
        assert!(data.starts_with(b"MAC audio"));
        assert_eq!(&data[data.len() - 128..], &v1[..]);
        let back = read(&path, ApeKeyStyle::Ape, &TagConfig::default()).unwrap();
        assert_eq!(back.album.as_deref(), Some("Album"));
    }

    #[test]
    fn test_header_first_tag_moves_to_end() {
        let mut tag = ApeTag::default();
        tag.apply_record(
            &{
                let mut r = TagRecord::new();
                r.set(StandardField::Artist, Some("Artist".to_string()));
                r
            },
            ApeKeyStyle::Ape,
            &TagConfig::default(),
            &mut WriteReport::new(),
        );
        // A complete tag placed before the audio
        let mut contents = tag.render().unwrap();
        contents.extend_from_slice(b"audio");
        let (_dir, path) = audio_file(&contents);

        let config = TagConfig::default();
        let record = read(&path, ApeKeyStyle::Ape, &config).unwrap();
        assert!(record.dirty);
        write(&path, &record, ApeKeyStyle::Ape, &config).unwrap();

        let data = fs::read(&path).unwrap();
        assert!(data.starts_with(b"audio"));
        assert_eq!(&data[5..13], b"APETAGEX");
    }
}
