//! Grid reconstruction from fragments
//!
//! Two strategies run in order: the path layout places fragments by the row
//! and cell markers in their extraction path; the coordinate layout clusters
//! fragments by position and only runs when no path carries a marker.

use std::cmp::Ordering;

use indexmap::IndexMap;
use itertools::Itertools;
use tracing::debug;

use super::{CellPosition, PathParser, TableFragment, TableStructure, make_rectangular};

/// A way of laying fragments of one table out into a grid.
pub trait LayoutStrategy {
    /// Returns `None` when this strategy cannot place the fragments.
    fn layout(&self, fragments: &[TableFragment]) -> Option<TableStructure>;
}

/// Places fragments by the row/cell markers in their path.
pub struct PathLayout<'a> {
    pub parser: &'a PathParser,
}

impl PathLayout<'_> {
    /// Fragments with their positions, ordered by position, then raw path,
    /// then text, so the result does not depend on input order.
    pub(crate) fn positioned<'f>(
        &self,
        fragments: &'f [TableFragment],
    ) -> Option<Vec<(CellPosition, &'f TableFragment)>> {
        let parsed = fragments
            .iter()
            .map(|fragment| (self.parser.parse(&fragment.path), fragment))
            .collect::<Vec<_>>();
        if parsed.iter().all(|(position, _)| position.is_none()) {
            return None;
        }
        Some(
            parsed
                .into_iter()
                .map(|(position, fragment)| (position.unwrap_or(CellPosition { row: 0, col: 0 }), fragment))
                .sorted_by(|(lhs_pos, lhs), (rhs_pos, rhs)| {
                    lhs_pos
                        .cmp(rhs_pos)
                        .then_with(|| lhs.path.cmp(&rhs.path))
                        .then_with(|| lhs.text.cmp(&rhs.text))
                })
                .collect(),
        )
    }
}

impl LayoutStrategy for PathLayout<'_> {
    fn layout(&self, fragments: &[TableFragment]) -> Option<TableStructure> {
        let positioned = self.positioned(fragments)?;
        let rows = positioned.iter().map(|(pos, _)| pos.row).max()? + 1;
        let cols = positioned.iter().map(|(pos, _)| pos.col).max()? + 1;

        let mut cells: IndexMap<CellPosition, Vec<&str>> = IndexMap::new();
        for (position, fragment) in &positioned {
            let texts = cells.entry(*position).or_default();
            if fragment.has_text() {
                texts.push(fragment.text.trim());
            }
        }

        let grid = (0..rows)
            .map(|row| {
                (0..cols)
                    .map(|col| {
                        cells
                            .get(&CellPosition { row, col })
                            .map(|texts| texts.join(" "))
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();
        Some(grid)
    }
}

/// Clusters fragments into rows by vertical proximity and orders each row
/// left to right.
pub struct CoordinateLayout {
    pub y_tolerance: f64,
}

impl Default for CoordinateLayout {
    fn default() -> Self {
        Self { y_tolerance: 5.0 }
    }
}

impl LayoutStrategy for CoordinateLayout {
    fn layout(&self, fragments: &[TableFragment]) -> Option<TableStructure> {
        let (placed, unplaced): (Vec<_>, Vec<_>) = fragments
            .iter()
            .filter(|fragment| fragment.has_text())
            .partition(|fragment| fragment.bounds.is_some());

        // Page coordinates grow upwards, so the top row has the largest y.
        let placed = placed
            .into_iter()
            .filter_map(|fragment| fragment.bounds.map(|bounds| (bounds, fragment)))
            .sorted_by(|(lhs, _), (rhs, _)| {
                rhs.y().partial_cmp(&lhs.y()).unwrap_or(Ordering::Equal)
            })
            .collect::<Vec<_>>();

        let mut rows: Vec<Vec<_>> = Vec::new();
        let mut anchor: Option<f64> = None;
        for (bounds, fragment) in placed {
            match anchor {
                Some(y) if (y - bounds.y()).abs() <= self.y_tolerance => {
                    if let Some(row) = rows.last_mut() {
                        row.push((bounds, fragment));
                    }
                }
                _ => {
                    anchor = Some(bounds.y());
                    rows.push(vec![(bounds, fragment)]);
                }
            }
        }

        let mut grid = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .sorted_by(|(lhs, _), (rhs, _)| {
                        lhs.x().partial_cmp(&rhs.x()).unwrap_or(Ordering::Equal)
                    })
                    .map(|(_, fragment)| fragment.text.trim().to_owned())
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        grid.extend(
            unplaced
                .into_iter()
                .map(|fragment| vec![fragment.text.trim().to_owned()]),
        );
        Some(make_rectangular(grid))
    }
}

/// Build the grid for one table's fragments.
pub fn build_structure(
    parser: &PathParser,
    y_tolerance: f64,
    fragments: &[TableFragment],
) -> TableStructure {
    if fragments.is_empty() {
        return Vec::new();
    }
    let strategies: [&dyn LayoutStrategy; 2] = [
        &PathLayout { parser },
        &CoordinateLayout { y_tolerance },
    ];
    for (index, strategy) in strategies.iter().enumerate() {
        if let Some(grid) = strategy.layout(fragments) {
            if index > 0 {
                debug!(
                    table_id = %fragments[0].table_id,
                    "no parseable paths, fell back to coordinate layout"
                );
            }
            return grid;
        }
    }
    Vec::new()
}
