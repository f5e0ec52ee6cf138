//! Archive description metadata.
//!
//! The remote service stores one opaque description string per archive. We
//! write a small JSON object into it so archives can be matched back to the
//! file they were uploaded from.

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Current metadata format version.
pub const META_VERSION: u32 = 1;

/// Metadata stored in an archive description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMeta {
    pub filename: String,
    pub version: u32,
}

impl ArchiveMeta {
    /// Creates metadata for `filename` at the current format version.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            version: META_VERSION,
        }
    }

    /// Serializes into the description string stored by the service.
    pub fn to_description(&self) -> String {
        // Two plain fields; serialization cannot fail.
        serde_json::json!({ "filename": self.filename, "version": self.version }).to_string()
    }

    /// Parses a description string.
    ///
    /// Unknown versions are accepted as long as both fields are present.
    pub fn parse(description: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str::<Self>(description)
            .map_err(|_| ProtocolError::UnsupportedMetadata(description.to_string()))
    }

    /// Parses an optional description, treating anything unparsable as "no metadata".
    pub fn from_description(description: Option<&str>) -> Option<Self> {
        description.and_then(|d| Self::parse(d).ok())
    }

    /// Returns `true` if `description` carries metadata for `filename`.
    pub fn description_matches(description: Option<&str>, filename: &str) -> bool {
        Self::from_description(description).is_some_and(|meta| meta.filename == filename)
    }
}
