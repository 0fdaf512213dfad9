//! Resolving decisions for generators that render from extraction JSON

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::error;

use crate::{
    correction::{CorrectionFile, TableAction, plan, row_paragraphs},
    extract::TableEntry,
    table::{TableHash, TableStructure},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedContent {
    Table { rows: TableStructure },
    Paragraphs { texts: Vec<String> },
    Removed { merged_into: TableHash },
}

/// Final content of one extracted table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTable {
    pub hash: TableHash,
    pub table_id: String,
    pub pages: Vec<u32>,
    pub content: ResolvedContent,
}

/// Decide the content of every table of one version. Tables keep their
/// extraction order; merged tables stay in the list as `Removed`.
pub fn resolve_tables(
    tables: &IndexMap<TableHash, TableEntry>,
    corrections: Option<&CorrectionFile>,
) -> Vec<ResolvedTable> {
    let known = |target: &TableHash| {
        tables.contains_key(target) || corrections.is_some_and(|file| file.tables.contains_key(target))
    };
    tables
        .values()
        .map(|entry| {
            let correction = corrections.and_then(|file| file.get(entry.hash.as_str()));
            let content = match plan(correction) {
                TableAction::Keep => ResolvedContent::Table {
                    rows: entry.structure.clone(),
                },
                TableAction::Rebuild(rows) => ResolvedContent::Table { rows: rows.clone() },
                TableAction::Paragraphs => ResolvedContent::Paragraphs {
                    texts: row_paragraphs(&entry.structure),
                },
                TableAction::Remove { target } if known(target) => ResolvedContent::Removed {
                    merged_into: target.clone(),
                },
                TableAction::Remove { target } => {
                    error!(hash = %entry.hash, %target, "merge target missing, keeping table");
                    ResolvedContent::Table {
                        rows: entry.structure.clone(),
                    }
                }
            };
            ResolvedTable {
                hash: entry.hash.clone(),
                table_id: entry.table_id.clone(),
                pages: entry.pages.clone(),
                content,
            }
        })
        .collect()
}

/// Hashes whose content ends up on the page as a table.
pub fn rendered_tables(resolved: &[ResolvedTable]) -> HashSet<&TableHash> {
    resolved
        .iter()
        .filter(|table| matches!(table.content, ResolvedContent::Table { .. }))
        .map(|table| &table.hash)
        .collect()
}
