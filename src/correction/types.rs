//! Correction records
//!
//! A correction file maps table hashes to human decisions. Reading goes
//! through the `Raw*` types so files from older review tools (legacy status
//! labels, entries without a `hash` field) load into the canonical model.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::{
    extract::UniqueTable,
    table::{TableHash, TableStructure},
};

use super::status::{ReviewStatus, TableStatus, migrate_table_status};

pub const NEW_TABLE_REASON: &str = "Newly discovered table";

/// A table entry exactly as stored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawTableCorrection {
    #[serde(default)]
    pub hash: Option<TableHash>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub found_in_versions: Vec<String>,
    #[serde(default)]
    pub pages: IndexMap<String, Vec<u32>>,
    #[serde(default)]
    pub pdf_paths: IndexMap<String, String>,
    #[serde(default)]
    pub source_links: IndexMap<String, String>,
    #[serde(default)]
    pub original_structure: Option<TableStructure>,
    #[serde(default)]
    pub corrected_structure: Option<TableStructure>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub discovered_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableCorrection {
    pub hash: TableHash,
    pub status: TableStatus,
    pub found_in_versions: Vec<String>,
    pub pages: IndexMap<String, Vec<u32>>,
    pub pdf_paths: IndexMap<String, String>,
    pub source_links: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_structure: Option<TableStructure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_structure: Option<TableStructure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovered_at: Option<String>,
}

impl TableCorrection {
    /// A not-yet-reviewed entry for an extracted table.
    pub fn undecided(table: &UniqueTable) -> Self {
        Self {
            hash: table.hash.clone(),
            status: TableStatus::Undefined,
            found_in_versions: table.found_in_versions.clone(),
            pages: table.pages.clone(),
            pdf_paths: table.pdf_paths.clone(),
            source_links: table.source_links.clone(),
            original_structure: Some(table.original_structure.clone()),
            corrected_structure: None,
            reason: None,
            discovered_at: None,
        }
    }

    /// An entry appended by the new-table merge.
    pub fn discovered(table: &UniqueTable, at: String) -> Self {
        Self {
            reason: Some(NEW_TABLE_REASON.to_owned()),
            discovered_at: Some(at),
            ..Self::undecided(table)
        }
    }

    pub fn with_status(self, status: TableStatus) -> Self {
        Self { status, ..self }
    }

    pub fn with_corrected(self, corrected: TableStructure) -> Self {
        Self {
            status: TableStatus::ConfirmedWithChanges,
            corrected_structure: Some(corrected),
            ..self
        }
    }

    /// Rebuild from a stored entry. A missing `hash` is taken from the key.
    pub fn from_raw(key: &TableHash, raw: RawTableCorrection) -> Self {
        let status = migrate_table_status(&raw);
        Self {
            hash: raw.hash.unwrap_or_else(|| key.clone()),
            status,
            found_in_versions: raw.found_in_versions,
            pages: raw.pages,
            pdf_paths: raw.pdf_paths,
            source_links: raw.source_links,
            original_structure: raw.original_structure,
            corrected_structure: raw.corrected_structure,
            reason: raw.reason,
            discovered_at: raw.discovered_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCorrectionFile {
    pub law_id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub reviewed_at: String,
    #[serde(default)]
    pub reviewer: String,
    #[serde(default, deserialize_with = "lenient_review_status")]
    pub status: ReviewStatus,
    #[serde(default)]
    pub tables: IndexMap<TableHash, RawTableCorrection>,
}

fn lenient_review_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ReviewStatus, D::Error> {
    let label = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    let status = ReviewStatus::from_label(&label);
    if !ReviewStatus::ALL.contains(&label.as_str()) {
        warn!(%label, "unknown review status, reading as not_started");
    }
    Ok(status)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCorrectionFile")]
pub struct CorrectionFile {
    pub law_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub reviewed_at: String,
    pub reviewer: String,
    pub status: ReviewStatus,
    pub tables: IndexMap<TableHash, TableCorrection>,
}

impl From<RawCorrectionFile> for CorrectionFile {
    fn from(raw: RawCorrectionFile) -> Self {
        Self {
            law_id: raw.law_id,
            version: raw.version,
            reviewed_at: raw.reviewed_at,
            reviewer: raw.reviewer,
            status: raw.status,
            tables: raw
                .tables
                .into_iter()
                .map(|(key, entry)| {
                    let correction = TableCorrection::from_raw(&key, entry);
                    (key, correction)
                })
                .collect(),
        }
    }
}

impl CorrectionFile {
    pub fn get(&self, hash: &str) -> Option<&TableCorrection> {
        self.tables.get(hash)
    }

    /// Hashes in `hashes` that have no decision in this file.
    pub fn undecided<'a>(&self, hashes: impl IntoIterator<Item = &'a TableHash>) -> Vec<TableHash> {
        hashes
            .into_iter()
            .filter(|hash| {
                !self
                    .tables
                    .get(*hash)
                    .is_some_and(|correction| correction.status.is_resolved())
            })
            .cloned()
            .collect()
    }
}
