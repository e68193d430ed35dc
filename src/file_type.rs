// File extension classification

use std::path::Path;

use serde::Serialize;

use crate::TagFormat;

/// Container type of an audio file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Mp3,
    Mp2,
    OggOpus,
    OggVorbis,
    OggSpeex,
    Flac,
    Musepack,
    MonkeysAudio,
    OptimFrog,
    Mp4,
    WavPack,
    Unknown,
}

/// Static description of one supported extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileDescription {
    pub kind: FileKind,
    pub extension: &'static str,
    /// Tag codec used for this kind, `None` for unknown files
    pub tag_format: Option<TagFormat>,
}

const fn entry(kind: FileKind, extension: &'static str, tag_format: TagFormat) -> FileDescription {
    FileDescription {
        kind,
        extension,
        tag_format: Some(tag_format),
    }
}

pub static FILE_DESCRIPTIONS: &[FileDescription] = &[
    entry(FileKind::Mp3, ".mp3", TagFormat::Id3),
    entry(FileKind::Mp2, ".mp2", TagFormat::Id3),
    entry(FileKind::OggOpus, ".opus", TagFormat::Opus),
    entry(FileKind::OggVorbis, ".ogg", TagFormat::VorbisComment),
    entry(FileKind::OggVorbis, ".oga", TagFormat::VorbisComment),
    entry(FileKind::OggSpeex, ".spx", TagFormat::VorbisComment),
    entry(FileKind::Flac, ".flac", TagFormat::Flac),
    entry(FileKind::Flac, ".fla", TagFormat::Flac),
    entry(FileKind::Musepack, ".mpc", TagFormat::Ape),
    entry(FileKind::Musepack, ".mp+", TagFormat::Ape),
    entry(FileKind::Musepack, ".mpp", TagFormat::Ape),
    entry(FileKind::MonkeysAudio, ".ape", TagFormat::Ape),
    entry(FileKind::MonkeysAudio, ".mac", TagFormat::Ape),
    entry(FileKind::OptimFrog, ".ofr", TagFormat::Ape),
    entry(FileKind::OptimFrog, ".ofs", TagFormat::Ape),
    entry(FileKind::Mp4, ".mp4", TagFormat::Mp4),
    entry(FileKind::Mp4, ".m4a", TagFormat::Mp4),
    entry(FileKind::Mp4, ".m4p", TagFormat::Mp4),
    entry(FileKind::Mp4, ".m4v", TagFormat::Mp4),
    entry(FileKind::WavPack, ".wv", TagFormat::WavPack),
];

pub static UNKNOWN_FILE: FileDescription = FileDescription {
    kind: FileKind::Unknown,
    extension: "",
    tag_format: None,
};

/// Look up a file by its extension, ignoring case
pub fn describe_file<P: AsRef<Path>>(path: P) -> &'static FileDescription {
    let ext = match path.as_ref().extension().and_then(|e| e.to_str()) {
        Some(ext) => ext,
        None => return &UNKNOWN_FILE,
    };
    FILE_DESCRIPTIONS
        .iter()
        .find(|d| d.extension[1..].eq_ignore_ascii_case(ext))
        .unwrap_or(&UNKNOWN_FILE)
}
