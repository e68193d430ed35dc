// CLI configuration
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use tagforge::config::{Id3Version, TagConfig};
use tagforge::EncoderCapabilities;

pub use super::output::OutputFormat;

/// Tagforge - read and write audio tags
#[derive(Parser, Debug)]
#[command(name = "tagforge")]
#[command(about = "Batch audio tag editor for ID3, APEv2, Vorbis, FLAC, MP4 and WavPack files", long_about = None)]
#[command(version)]
pub struct Config {
    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    pub format: OutputFormat,

    /// Quiet mode (suppress progress messages)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Tag configuration as a JSON file
    #[arg(long, value_name = "FILE.json", global = true)]
    pub config: Option<PathBuf>,

    /// ID3v2 version to write
    #[arg(long, value_enum, global = true)]
    pub id3_version: Option<Id3VersionArg>,

    /// Zero-pad track and disc numbers to this width
    #[arg(long, value_name = "WIDTH", global = true)]
    pub padding: Option<usize>,

    /// Separator between the values of multi-valued fields
    #[arg(long, global = true)]
    pub separator: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Id3VersionArg {
    #[value(name = "2.3")]
    V3,
    #[value(name = "2.4")]
    V4,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read tags from audio file(s)
    Read {
        /// Audio file path(s)
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Fields to display (comma-separated)
        #[arg(long)]
        fields: Option<String>,

        /// Output to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Change tags of an audio file
    Write {
        /// Audio file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Set a field, e.g. --set title="Song"
        #[arg(long, value_name = "FIELD=VALUE")]
        set: Vec<String>,

        /// Clear a field
        #[arg(long, value_name = "FIELD")]
        clear: Vec<String>,

        /// Replace the whole tag with a JSON record
        #[arg(long, value_name = "FILE.json")]
        from_file: Option<PathBuf>,
    },

    /// Copy tags between files
    Copy {
        /// Source audio file
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Target audio file(s)
        #[arg(value_name = "TARGET", required = true)]
        targets: Vec<PathBuf>,
    },

    /// Batch process multiple files
    Batch {
        /// Directory path
        #[arg(short, long)]
        directory: PathBuf,

        /// File pattern (e.g., "*.mp3", "*.flac")
        #[arg(short, long)]
        pattern: String,

        /// Operation to run on every file
        #[arg(value_enum)]
        operation: BatchOperation,

        /// Field assignments for the write operation
        #[arg(long, value_name = "FIELD=VALUE")]
        set: Vec<String>,

        /// Fields to clear for the write operation
        #[arg(long, value_name = "FIELD")]
        clear: Vec<String>,
    },

    /// Detect file kind and tag format
    Detect {
        /// Audio file path(s)
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// Export embedded pictures
    ExportCover {
        /// Audio file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output directory for cover images
        #[arg(short, long)]
        output: PathBuf,

        /// Picture index (all pictures when omitted)
        #[arg(short, long)]
        index: Option<usize>,
    },

    /// Embed a picture
    SetCover {
        /// Audio file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Image file path
        #[arg(short, long)]
        image: PathBuf,

        /// Picture type code (3 = front cover)
        #[arg(short = 't', long, default_value_t = 3)]
        picture_type: u32,

        /// Description
        #[arg(short, long)]
        description: Option<String>,

        /// Keep existing pictures instead of replacing them
        #[arg(long)]
        append: bool,
    },

    /// Remove every embedded picture
    RemoveCover {
        /// Audio file path(s)
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// Show file information
    Info {
        /// Audio file path(s)
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
}

/// Batch operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BatchOperation {
    /// Read every file
    Read,
    /// Apply --set/--clear to every file
    Write,
    /// Re-save every file whose tag needs normalizing
    Normalize,
}

impl std::fmt::Display for BatchOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchOperation::Read => write!(f, "read"),
            BatchOperation::Write => write!(f, "write"),
            BatchOperation::Normalize => write!(f, "normalize"),
        }
    }
}

impl Config {
    /// Build the tag configuration from --config and the override flags
    pub fn tag_config(&self) -> anyhow::Result<TagConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                TagConfig::from_json(&json).with_context(|| format!("Invalid configuration in {}", path.display()))?
            }
            None => TagConfig::default(),
        };

        if let Some(version) = self.id3_version {
            config.id3.version = match version {
                Id3VersionArg::V3 => Id3Version::V3,
                Id3VersionArg::V4 => Id3Version::V4,
            };
        }
        if let Some(width) = self.padding {
            config.number_padding = Some(width);
        }
        if let Some(separator) = &self.separator {
            config.multi_value_separator = separator.clone();
        }

        Ok(config.with_capabilities(EncoderCapabilities::detect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_write_command() {
        let config = Config::try_parse_from([
            "tagforge",
            "--padding",
            "2",
            "write",
            "song.mp3",
            "--set",
            "title=Song",
            "--clear",
            "comment",
        ])
        .unwrap();

        match &config.command {
            Commands::Write { file, set, clear, .. } => {
                assert_eq!(file, &PathBuf::from("song.mp3"));
                assert_eq!(set, &vec!["title=Song".to_string()]);
                assert_eq!(clear, &vec!["comment".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(config.tag_config().unwrap().number_padding, Some(2));
    }

    #[test]
    fn test_id3_version_override() {
        let config = Config::try_parse_from(["tagforge", "--id3-version", "2.3", "detect", "a.mp3"]).unwrap();
        assert_eq!(config.tag_config().unwrap().id3.version, Id3Version::V3);
    }

    #[test]
    fn test_batch_operation() {
        let config =
            Config::try_parse_from(["tagforge", "batch", "-d", "music", "-p", "*.flac", "normalize"]).unwrap();
        assert!(matches!(
            config.command,
            Commands::Batch {
                operation: BatchOperation::Normalize,
                ..
            }
        ));
    }
}
