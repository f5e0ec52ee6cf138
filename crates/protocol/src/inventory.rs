use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::archive_meta::ArchiveMeta;

/// Inventory report as produced by an inventory retrieval job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryReport {
    #[serde(rename = "VaultARN")]
    pub vault_arn: String,
    #[serde(rename = "InventoryDate")]
    pub inventory_date: DateTime<Utc>,
    #[serde(rename = "ArchiveList", default)]
    pub archive_list: Vec<InventoryArchive>,
}

/// One archive entry of an [`InventoryReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InventoryArchive {
    pub archive_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_description: Option<String>,
    pub creation_date: DateTime<Utc>,
    pub size: u64,
    #[serde(rename = "SHA256TreeHash")]
    pub sha256_tree_hash: String,
}

/// Client-side view of a vault inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub inventory_date: DateTime<Utc>,
    pub archive_list: Vec<ArchiveItem>,
}

/// Client-side view of one archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveItem {
    pub archive_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_description: Option<String>,
    /// Filename recovered from the description, if it carries our metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub creation_date: DateTime<Utc>,
    pub size: u64,
}

impl From<InventoryReport> for Inventory {
    fn from(report: InventoryReport) -> Self {
        let archive_list = report
            .archive_list
            .into_iter()
            .map(|a| {
                let filename = ArchiveMeta::from_description(a.archive_description.as_deref())
                    .map(|meta| meta.filename);
                ArchiveItem {
                    archive_id: a.archive_id,
                    archive_description: a.archive_description,
                    filename,
                    creation_date: a.creation_date,
                    size: a.size,
                }
            })
            .collect();
        Self {
            inventory_date: report.inventory_date,
            archive_list,
        }
    }
}

impl Inventory {
    /// Returns all archives whose metadata names `filename`, newest first.
    pub fn find_by_filename(&self, filename: &str) -> Vec<&ArchiveItem> {
        let mut found: Vec<&ArchiveItem> = self
            .archive_list
            .iter()
            .filter(|a| a.filename.as_deref() == Some(filename))
            .collect();
        found.sort_by(|a, b| b.creation_date.cmp(&a.creation_date));
        found
    }
}
