//! Review status of a table
//!
//! On disk a status is a plain string. The merge variant carries its target
//! in the string itself (`merged_with_<hash>`). Files written by older review
//! tools use `pending`, `confirmed` and `edited`; those are accepted on read
//! and normalized.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::table::TableHash;

use super::types::RawTableCorrection;

const MERGED_PREFIX: &str = "merged_with_";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableStatus {
    Undefined,
    ConfirmedWithoutChanges,
    ConfirmedWithChanges,
    Rejected,
    /// Content folded into the target table during review.
    Merged(TableHash),
}

impl TableStatus {
    /// Anything but `undefined` counts as a decision.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Undefined)
    }
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::ConfirmedWithoutChanges => f.write_str("confirmed_without_changes"),
            Self::ConfirmedWithChanges => f.write_str("confirmed_with_changes"),
            Self::Rejected => f.write_str("rejected"),
            Self::Merged(target) => write!(f, "{MERGED_PREFIX}{target}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown table status: {0}")]
pub struct UnknownStatus(String);

impl FromStr for TableStatus {
    type Err = UnknownStatus;

    /// Parse a canonical status. Legacy labels are rejected here; see
    /// [`StatusLabel`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "undefined" => Ok(Self::Undefined),
            "confirmed_without_changes" => Ok(Self::ConfirmedWithoutChanges),
            "confirmed_with_changes" => Ok(Self::ConfirmedWithChanges),
            "rejected" => Ok(Self::Rejected),
            s => match s.strip_prefix(MERGED_PREFIX) {
                Some(target) if !target.is_empty() => Ok(Self::Merged(target.into())),
                _ => Err(UnknownStatus(s.to_owned())),
            },
        }
    }
}

impl Serialize for TableStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TableStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A status string as found on disk, canonical or legacy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLabel {
    Canonical(TableStatus),
    Pending,
    Confirmed,
    Edited,
    Unknown(String),
}

impl StatusLabel {
    pub fn classify(label: &str) -> Self {
        match label {
            "pending" => Self::Pending,
            "confirmed" => Self::Confirmed,
            "edited" => Self::Edited,
            label => match label.parse() {
                Ok(status) => Self::Canonical(status),
                Err(_) => Self::Unknown(label.to_owned()),
            },
        }
    }

    /// Whether this label needs both the original and corrected structure.
    pub fn requires_structures(&self) -> bool {
        matches!(
            self,
            Self::Edited | Self::Canonical(TableStatus::ConfirmedWithChanges)
        )
    }
}

/// Map a stored entry's status onto the canonical domain.
///
/// Total: unknown labels become `undefined`, so an unreadable decision is
/// reviewed again rather than guessed.
pub fn migrate_table_status(entry: &RawTableCorrection) -> TableStatus {
    match StatusLabel::classify(&entry.status) {
        StatusLabel::Canonical(status) => status,
        StatusLabel::Pending | StatusLabel::Unknown(_) => TableStatus::Undefined,
        StatusLabel::Edited => TableStatus::ConfirmedWithChanges,
        StatusLabel::Confirmed => match &entry.corrected_structure {
            Some(corrected) if Some(corrected) != entry.original_structure.as_ref() => {
                TableStatus::ConfirmedWithChanges
            }
            _ => TableStatus::ConfirmedWithoutChanges,
        },
    }
}

/// Review progress of a whole correction file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Completed,
    InProgress,
    #[default]
    NotStarted,
}

impl ReviewStatus {
    pub const ALL: [&'static str; 3] = ["completed", "in_progress", "not_started"];

    /// Read a stored label. Anything unrecognized counts as not started.
    pub fn from_label(label: &str) -> Self {
        match label {
            "completed" => Self::Completed,
            "in_progress" => Self::InProgress,
            _ => Self::NotStarted,
        }
    }
}
