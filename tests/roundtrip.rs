// Copying one record through every codec via the public entry points

use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tagforge::flac::metadata::render_head;
use tagforge::flac::{FlacMetadataBlock, FlacMetadataBlockType, VorbisComment};
use tagforge::ogg::page::paginate;
use tagforge::ogg::{OggCodec, OGG_HEADER_TYPE_BOS, OGG_HEADER_TYPE_EOS};
use tagforge::{read_tag, write_tag, Picture, PictureType, StandardField, TagConfig, TagRecord};

const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0\x00\x10JFIF\x00";

fn record() -> TagRecord {
    let mut record = TagRecord::new();
    record.set(StandardField::Title, Some("Blue in Green".to_string()));
    record.set(StandardField::Artist, Some("Miles Davis - Bill Evans".to_string()));
    record.set(StandardField::Album, Some("Kind of Blue".to_string()));
    record.set(StandardField::Year, Some("1959".to_string()));
    record.set(StandardField::Track, Some("3".to_string()));
    record.set(StandardField::TrackTotal, Some("5".to_string()));
    record.set(StandardField::Genre, Some("Jazz".to_string()));
    record.set(StandardField::Comment, Some("Réédition".to_string()));
    record.add_picture(Picture::new(PictureType::CoverFront, JPEG.to_vec()));
    record
}

fn mp3(dir: &Path) -> PathBuf {
    let path = dir.join("track.mp3");
    fs::write(&path, b"\xFF\xFB\x90\x00mpeg-frames").unwrap();
    path
}

fn flac(dir: &Path) -> PathBuf {
    let path = dir.join("track.flac");
    let stream_info = FlacMetadataBlock::new(FlacMetadataBlockType::StreamInfo, vec![0x11; 34]);
    let mut contents = render_head(&[stream_info]).unwrap();
    contents.extend_from_slice(b"\xFF\xF8flac-frames");
    fs::write(&path, contents).unwrap();
    path
}

fn ogg(dir: &Path) -> PathBuf {
    const SERIAL: u32 = 7;
    let path = dir.join("track.ogg");

    let mut ident = paginate(&[b"\x01vorbis-ident".to_vec()], SERIAL, 0, 0).remove(0);
    ident.header.header_type = OGG_HEADER_TYPE_BOS;
    ident.update_crc();
    let mut contents = ident.to_bytes();

    let comment = OggCodec::Vorbis
        .render_comment_packet(&VorbisComment::new("Xiph.Org libVorbis"), &[])
        .unwrap();
    for page in paginate(&[comment, b"\x05vorbis-setup".to_vec()], SERIAL, 1, 0) {
        contents.extend(page.to_bytes());
    }
    let mut audio = paginate(&[b"vorbis-audio".to_vec()], SERIAL, 2, 1024).remove(0);
    audio.header.header_type = OGG_HEADER_TYPE_EOS;
    audio.update_crc();
    contents.extend(audio.to_bytes());

    fs::write(&path, contents).unwrap();
    path
}

fn musepack(dir: &Path) -> PathBuf {
    let path = dir.join("track.mpc");
    fs::write(&path, b"MPCKmusepack-frames").unwrap();
    path
}

fn wavpack(dir: &Path) -> PathBuf {
    let path = dir.join("track.wv");
    fs::write(&path, b"wvpk\x20\0\0\0wavpack-block").unwrap();
    path
}

#[test]
fn test_record_survives_every_codec() {
    let dir = tempfile::tempdir().unwrap();
    let config = TagConfig::default();
    let targets = [mp3(dir.path()), flac(dir.path()), ogg(dir.path()), musepack(dir.path()), wavpack(dir.path())];

    let mut expected = record();
    for target in &targets {
        let report = write_tag(target, &expected, &config).unwrap();
        assert!(report.is_clean(), "{}: {:?}", target.display(), report.warnings);

        let back = read_tag(target, &config).unwrap();
        assert_eq!(back, expected, "{}", target.display());
        expected = back;
    }
}

#[test]
fn test_rewrite_with_same_record_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let config = TagConfig::default();

    for target in [mp3(dir.path()), flac(dir.path()), ogg(dir.path())] {
        write_tag(&target, &record(), &config).unwrap();
        let first = fs::read(&target).unwrap();
        write_tag(&target, &read_tag(&target, &config).unwrap(), &config).unwrap();
        assert_eq!(fs::read(&target).unwrap(), first, "{}", target.display());
    }
}

#[test]
fn test_clearing_keeps_audio() {
    let dir = tempfile::tempdir().unwrap();
    let config = TagConfig::default();

    let path = flac(dir.path());
    write_tag(&path, &record(), &config).unwrap();
    write_tag(&path, &TagRecord::new(), &config).unwrap();

    assert!(read_tag(&path, &config).unwrap().is_empty());
    assert!(fs::read(&path).unwrap().ends_with(b"\xFF\xF8flac-frames"));
}

#[test]
fn test_container_mismatch_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("actually-mp3.flac");
    fs::write(&path, b"ID3\x04\0\0\0\0\0\0\xFF\xFB").unwrap();

    let err = read_tag(&path, &TagConfig::default()).unwrap_err();
    assert_eq!(err.kind(), tagforge::ErrorKind::NotThisFormat);
}
