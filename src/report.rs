// Recoverable conditions reported by a successful write

use std::fmt;

use serde::Serialize;

use crate::field_mapping::StandardField;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum TagWarning {
    /// Unicode text was written although the encoder self-test failed
    UnreliableUnicode,
    /// A value was cut to fit a fixed-width field
    FieldTruncated {
        field: StandardField,
        limit: usize,
    },
    /// A picture could not be stored in this format
    PictureSkipped { index: usize, reason: String },
    /// The format keeps fewer pictures than the record carries
    PicturesDropped { kept: usize, dropped: usize },
}

impl fmt::Display for TagWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagWarning::UnreliableUnicode => {
                f.write_str("Unicode text may not round-trip with this encoder")
            }
            TagWarning::FieldTruncated { field, limit } => {
                write!(f, "{field} truncated to {limit} bytes")
            }
            TagWarning::PictureSkipped { index, reason } => {
                write!(f, "picture #{index} skipped: {reason}")
            }
            TagWarning::PicturesDropped { kept, dropped } => {
                write!(f, "kept {kept} picture(s), dropped {dropped}")
            }
        }
    }
}

/// Outcome of [`write_tag`](crate::write_tag)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub warnings: Vec<TagWarning>,
}

impl WriteReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning once
    pub fn warn(&mut self, warning: TagWarning) {
        if !self.warnings.contains(&warning) {
            log::warn!("{warning}");
            self.warnings.push(warning);
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
