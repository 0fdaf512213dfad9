//! Table reconstruction
//!
//! This module turns positioned text fragments emitted by the extraction API
//! into rectangular cell grids and fingerprints them by content.

use serde::{Deserialize, Serialize};

mod builder;
mod hash;
mod path;

pub use builder::{CoordinateLayout, LayoutStrategy, PathLayout, build_structure};
pub use hash::{
    TableHash, hash_cells, hash_fragments, hash_html_table, hash_structure, normalize_cell_text,
};
pub use path::{CellPosition, PathParser};

/// Rows of cell strings. Every row has the same length.
pub type TableStructure = Vec<Vec<String>>;

/// Bounding box of a fragment as `[x0, y0, x1, y1]` in page units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds(pub [f64; 4]);

impl Bounds {
    pub fn x(&self) -> f64 {
        self.0[0]
    }

    pub fn y(&self) -> f64 {
        self.0[1]
    }
}

/// One positioned text run belonging to a table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableFragment {
    pub table_id: String,
    pub path: String,
    pub text: String,
    pub page: Option<u32>,
    pub bounds: Option<Bounds>,
}

impl TableFragment {
    pub fn new(table_id: impl Into<String>, path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            path: path.into(),
            text: text.into(),
            page: None,
            bounds: None,
        }
    }

    pub fn on_page(self, page: u32) -> Self {
        Self {
            page: Some(page),
            ..self
        }
    }

    pub fn at(self, bounds: [f64; 4]) -> Self {
        Self {
            bounds: Some(Bounds(bounds)),
            ..self
        }
    }

    pub(crate) fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Pad every row with empty cells up to the widest row.
pub(crate) fn make_rectangular(mut rows: TableStructure) -> TableStructure {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, String::new());
    }
    rows
}
