//! Row/cell position parsing for extraction paths
//!
//! Extraction paths look like `//Document/Table[2]/TR[3]/TD[2]/P`. The
//! innermost row and cell markers give the fragment's position.

use std::sync::LazyLock;

use regex::Regex;

/// Zero-based row/cell position of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellPosition {
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Clone)]
pub struct PathParser {
    row: Regex,
    cell: Regex,
}

static DEFAULT_PARSER: LazyLock<PathParser> =
    LazyLock::new(|| PathParser::new("TR", &["TD", "TH"]).unwrap());

fn marker_regex<S: AsRef<str>>(markers: &[S]) -> Result<Regex, regex::Error> {
    let alternatives = markers
        .iter()
        .map(|marker| regex::escape(marker.as_ref()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?:^|/)(?:{alternatives})(?:\[(\d+)\])?(?:/|$)"))
}

impl Default for PathParser {
    fn default() -> Self {
        DEFAULT_PARSER.clone()
    }
}

impl PathParser {
    pub fn new<S: AsRef<str>>(row_marker: &str, cell_markers: &[S]) -> Result<Self, regex::Error> {
        Ok(Self {
            row: marker_regex(&[row_marker])?,
            cell: marker_regex(cell_markers)?,
        })
    }

    /// 1-based index of the innermost marker match, `Some(1)` when the marker
    /// carries no index, `None` when the marker is absent.
    fn last_index(regex: &Regex, path: &str) -> Option<usize> {
        // Overlapping separators ("/TR/TD") need a manual scan: each match
        // consumes the trailing slash the next marker starts with.
        let mut found = None;
        let mut start = 0;
        while let Some(captures) = regex.captures_at(path, start) {
            let whole = captures.get(0)?;
            found = Some(
                captures
                    .get(1)
                    .and_then(|index| index.as_str().parse::<usize>().ok())
                    .unwrap_or(1),
            );
            start = if whole.as_str().ends_with('/') {
                whole.end() - 1
            } else {
                whole.end()
            };
            if start >= path.len() {
                break;
            }
        }
        found
    }

    /// Parse a path into a zero-based position.
    ///
    /// Returns `None` only when the path carries neither a row nor a cell
    /// marker. A missing row or cell index defaults to the first one.
    pub fn parse(&self, path: &str) -> Option<CellPosition> {
        let row = Self::last_index(&self.row, path);
        let col = Self::last_index(&self.cell, path);
        if row.is_none() && col.is_none() {
            return None;
        }
        Some(CellPosition {
            row: row.unwrap_or(1).saturating_sub(1),
            col: col.unwrap_or(1).saturating_sub(1),
        })
    }
}
