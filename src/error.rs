// Error types shared by every codec

use std::fmt;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, TagError>;

/// Errors that can occur while reading or writing a tag
#[derive(thiserror::Error, Debug)]
pub enum TagError {
    /// Open/read/write/seek/truncate/rename failure
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A buffer or stream ended before a declared length was satisfied
    #[error("Short read: needed {needed} bytes, {available} available")]
    ShortRead { needed: usize, available: usize },

    /// A writer accepted fewer bytes than requested
    #[error("Short write: expected {expected} bytes, wrote {written}")]
    ShortWrite { expected: u64, written: u64 },

    /// The magic signature did not match the expected container
    #[error("Not a {0} file")]
    NotThisFormat(String),

    /// The container is structurally invalid
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// The file consists entirely of zero bytes
    #[error("File is corrupted (contains only zero bytes)")]
    CorruptedFile,

    /// The structure is valid but not handled
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// A buffer could not be allocated
    #[error("Out of memory while building {0}")]
    OutOfMemory(&'static str),

    /// Text could not be represented in the target charset
    #[error("Cannot convert \"{text}\" to {charset}")]
    EncodingConversionFailed { charset: String, text: String },

    /// Any error from [`mp4ameta`]
    #[error(transparent)]
    Mp4(#[from] mp4ameta::Error),
}

/// The error taxonomy callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    IoError,
    NotThisFormat,
    CorruptData,
    UnsupportedFeature,
    OutOfMemory,
    EncodingConversionFailed,
}

impl TagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TagError::Io(_) | TagError::ShortWrite { .. } => ErrorKind::IoError,
            TagError::NotThisFormat(_) => ErrorKind::NotThisFormat,
            TagError::ShortRead { .. }
            | TagError::CorruptData(_)
            | TagError::CorruptedFile
            | TagError::Mp4(_) => ErrorKind::CorruptData,
            TagError::UnsupportedFeature(_) => ErrorKind::UnsupportedFeature,
            TagError::OutOfMemory(_) => ErrorKind::OutOfMemory,
            TagError::EncodingConversionFailed { .. } => ErrorKind::EncodingConversionFailed,
        }
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        TagError::CorruptData(msg.into())
    }

    pub(crate) fn not_format(name: &str) -> Self {
        TagError::NotThisFormat(name.to_string())
    }
}

impl From<std::collections::TryReserveError> for TagError {
    fn from(_: std::collections::TryReserveError) -> Self {
        TagError::OutOfMemory("tag buffer")
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::IoError => "I/O error",
            ErrorKind::NotThisFormat => "not this format",
            ErrorKind::CorruptData => "corrupt data",
            ErrorKind::UnsupportedFeature => "unsupported feature",
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::EncodingConversionFailed => "encoding conversion failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(TagError::CorruptedFile.kind(), ErrorKind::CorruptData);
        assert_eq!(
            TagError::ShortRead { needed: 4, available: 2 }.kind(),
            ErrorKind::CorruptData
        );
        assert_eq!(TagError::not_format("FLAC").kind(), ErrorKind::NotThisFormat);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(TagError::from(io).kind(), ErrorKind::IoError);
    }

    #[test]
    fn test_display() {
        assert_eq!(TagError::not_format("FLAC").to_string(), "Not a FLAC file");
        assert_eq!(
            TagError::OutOfMemory("APE tag").to_string(),
            "Out of memory while building APE tag"
        );
    }
}
