use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Summary of a vault as reported by `ListVaults`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VaultSummary {
    #[serde(rename = "VaultARN", default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(rename = "VaultName")]
    pub name: String,
    #[serde(rename = "NumberOfArchives", default)]
    pub archive_count: u64,
    #[serde(rename = "SizeInBytes", default)]
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_inventory_date: Option<DateTime<Utc>>,
}

/// Kind of asynchronous job a vault can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobAction {
    InventoryRetrieval,
    ArchiveRetrieval,
}

impl JobAction {
    /// The `Type` string used when initiating a job of this kind.
    pub fn job_type(self) -> &'static str {
        match self {
            Self::InventoryRetrieval => "inventory-retrieval",
            Self::ArchiveRetrieval => "archive-retrieval",
        }
    }
}

impl fmt::Display for JobAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InventoryRetrieval => f.write_str("InventoryRetrieval"),
            Self::ArchiveRetrieval => f.write_str("ArchiveRetrieval"),
        }
    }
}

/// Remote status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatusCode {
    InProgress,
    Succeeded,
    Failed,
}

/// A job as listed by `ListJobs`.
///
/// Owned by the remote service; the client only filters and sorts these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobRecord {
    pub job_id: String,
    pub action: JobAction,
    /// Empty when the service only reports the vault ARN.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vault_name: String,
    #[serde(rename = "VaultARN", default, skip_serializing_if = "Option::is_none")]
    pub vault_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_id: Option<String>,
    #[serde(
        rename = "JobDescription",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<JobStatusCode>,
    #[serde(
        rename = "ArchiveSizeInBytes",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub archive_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Returns `true` if the job belongs to `vault_name`.
    ///
    /// Records that only carry an ARN are matched on its last path segment.
    pub fn is_for_vault(&self, vault_name: &str) -> bool {
        if self.vault_name == vault_name {
            return true;
        }
        self.vault_arn
            .as_deref()
            .and_then(|arn| arn.rsplit('/').next())
            .is_some_and(|name| name == vault_name)
    }
}

/// Retrieval speed tier for archive retrieval jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrievalTier {
    Expedited,
    Standard,
    #[default]
    Bulk,
}

impl FromStr for RetrievalTier {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "expedited" => Ok(Self::Expedited),
            "standard" => Ok(Self::Standard),
            "bulk" => Ok(Self::Bulk),
            other => Err(ProtocolError::InvalidTier(other.to_string())),
        }
    }
}

/// Parameters for `InitiateJob`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobParameters {
    #[serde(rename = "Type", with = "job_type")]
    pub action: JobAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<RetrievalTier>,
}

impl JobParameters {
    /// Parameters for an inventory retrieval job.
    pub fn inventory() -> Self {
        Self {
            action: JobAction::InventoryRetrieval,
            archive_id: None,
            description: None,
            tier: None,
        }
    }

    /// Parameters for retrieving a single archive.
    pub fn archive(
        archive_id: impl Into<String>,
        description: Option<String>,
        tier: RetrievalTier,
    ) -> Self {
        Self {
            action: JobAction::ArchiveRetrieval,
            archive_id: Some(archive_id.into()),
            description,
            tier: Some(tier),
        }
    }
}

/// `Type` of `InitiateJob` travels in its kebab-case form.
mod job_type {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::JobAction;

    pub fn serialize<S: Serializer>(action: &JobAction, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(action.job_type())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<JobAction, D::Error> {
        let value = String::deserialize(d)?;
        match value.as_str() {
            "inventory-retrieval" => Ok(JobAction::InventoryRetrieval),
            "archive-retrieval" => Ok(JobAction::ArchiveRetrieval),
            other => Err(D::Error::custom(format!("unknown job type: {other}"))),
        }
    }
}

/// An in-progress multipart upload as listed by `ListMultipartUploads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MultipartUpload {
    pub multipart_upload_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_description: Option<String>,
    #[serde(rename = "VaultARN", default, skip_serializing_if = "Option::is_none")]
    pub vault_arn: Option<String>,
    #[serde(default)]
    pub part_size_in_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
}

/// Result of `CompleteMultipartUpload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedArchive {
    pub archive_id: String,
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Output returned by `GetJobOutput`.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutput {
    pub body: Vec<u8>,
    /// Value of the `Accept-Ranges` header, when the service signals range support.
    pub accept_ranges: Option<String>,
    /// The range actually served, when the request carried one.
    pub content_range: Option<ByteRange>,
}

/// Half-open byte range `[start, end)`.
///
/// On the wire it is written inclusive, as `bytes {start}-{end - 1}/*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Creates a range; `end` must not precede `start`.
    pub fn new(start: u64, end: u64) -> Result<Self, ProtocolError> {
        if end < start {
            return Err(ProtocolError::InvalidRange(format!("{start}..{end}")));
        }
        Ok(Self { start, end })
    }

    /// Length of the range in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // An empty range has no inclusive form; it never goes on the wire.
        write!(f, "bytes {}-{}/*", self.start, self.end.saturating_sub(1))
    }
}

impl FromStr for ByteRange {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidRange(s.to_string());

        let rest = s.trim().strip_prefix("bytes").ok_or_else(invalid)?;
        let rest = rest.trim_start_matches(['=', ' ']);
        let rest = rest.split('/').next().ok_or_else(invalid)?;
        let (first, last) = rest.split_once('-').ok_or_else(invalid)?;
        let start: u64 = first.trim().parse().map_err(|_| invalid())?;
        let last: u64 = last.trim().parse().map_err(|_| invalid())?;
        if last < start {
            return Err(invalid());
        }
        Ok(Self {
            start,
            end: last + 1,
        })
    }
}
