//! What a stored decision means for a table at build time

use tracing::warn;

use crate::table::{TableHash, TableStructure};

use super::{status::TableStatus, types::TableCorrection};

#[derive(Debug, Clone, PartialEq)]
pub enum TableAction<'a> {
    /// Leave the table as rendered.
    Keep,
    /// Replace the table body with the corrected structure.
    Rebuild(&'a TableStructure),
    /// Turn every row into a paragraph.
    Paragraphs,
    /// Drop the table; its content lives in `target` now.
    Remove { target: &'a TableHash },
}

/// Decide the action for one table. `None` means no correction exists.
pub fn plan(correction: Option<&TableCorrection>) -> TableAction<'_> {
    let Some(correction) = correction else {
        return TableAction::Keep;
    };
    match &correction.status {
        TableStatus::Undefined | TableStatus::ConfirmedWithoutChanges => TableAction::Keep,
        TableStatus::ConfirmedWithChanges => match &correction.corrected_structure {
            Some(structure) => TableAction::Rebuild(structure),
            None => {
                warn!(hash = %correction.hash, "confirmed with changes but no corrected structure");
                TableAction::Keep
            }
        },
        TableStatus::Rejected => TableAction::Paragraphs,
        TableStatus::Merged(target) => TableAction::Remove { target },
    }
}

/// Paragraph texts for a rejected table: one per row, non-empty cells
/// joined by a space. Rows without text produce nothing.
pub fn row_paragraphs<R, C>(rows: R) -> Vec<String>
where
    R: IntoIterator<Item = C>,
    C: IntoIterator,
    C::Item: AsRef<str>,
{
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| cell.as_ref().split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| !text.is_empty())
        .collect()
}
