//! Content fingerprints for tables
//!
//! A table's identity is the SHA-256 of its non-empty cell texts, row-major,
//! joined by `|`, truncated to 16 hex characters. Page numbers, coordinates
//! and styling never enter the hash, so the same table found in several law
//! versions, or rendered into HTML, keeps one identity.

use std::{borrow::Borrow, fmt::Write as _};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{PathParser, TableFragment, TableStructure, builder::build_structure};
use crate::html::{Node, table_rows};

const SEPARATOR: &str = "|";
const HASH_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableHash(String);

impl TableHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this looks like a hash this crate produces.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == HASH_LEN
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

impl std::fmt::Display for TableHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TableHash {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TableHash {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Borrow<str> for TableHash {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Collapse whitespace runs and trim.
pub fn normalize_cell_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hash cell texts given in row-major order.
pub fn hash_cells<'a, I>(cells: I) -> TableHash
where
    I: IntoIterator<Item = &'a str>,
{
    let joined = cells
        .into_iter()
        .map(normalize_cell_text)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(SEPARATOR);
    let digest = Sha256::digest(joined.as_bytes());
    let mut hex = String::with_capacity(HASH_LEN);
    for byte in digest.iter().take(HASH_LEN / 2) {
        let _ = write!(hex, "{byte:02x}");
    }
    TableHash(hex)
}

pub fn hash_structure(structure: &TableStructure) -> TableHash {
    hash_cells(structure.iter().flatten().map(String::as_str))
}

/// Hash the JSON-fragment form of a table.
///
/// Fragments are canonicalized through the path layout, so the result is
/// independent of input order and equals the hash of the same table rendered
/// as HTML.
pub fn hash_fragments(parser: &PathParser, y_tolerance: f64, fragments: &[TableFragment]) -> TableHash {
    hash_structure(&build_structure(parser, y_tolerance, fragments))
}

/// Hash the rendered-HTML form of a table: every `<td>`/`<th>` text in
/// document order.
pub fn hash_html_table(table: &Node) -> TableHash {
    let rows = table_rows(table);
    hash_cells(rows.iter().flatten().map(String::as_str))
}
