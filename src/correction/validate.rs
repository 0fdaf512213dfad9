//! Correction file validation
//!
//! Validation runs on the JSON form of a correction file, before anything is
//! written, so every structural problem is reported rather than the first
//! serde failure.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::table::TableHash;

use super::{
    status::{ReviewStatus, StatusLabel, TableStatus},
    types::TableCorrection,
};

const REQUIRED_ENVELOPE_KEYS: &[&str] = &["law_id", "reviewed_at", "reviewer", "status", "tables"];
const REQUIRED_TABLE_KEYS: &[&str] = &["hash", "status", "found_in_versions", "pages"];

/// Check that a structure is a non-ragged list of lists of strings.
pub fn validate_table_structure(structure: &Value) -> Result<(), Vec<String>> {
    let Value::Array(rows) = structure else {
        return Err(vec!["structure must be a list of rows".to_owned()]);
    };
    let mut errors = Vec::new();
    let mut width = None;
    for (index, row) in rows.iter().enumerate() {
        let Value::Array(cells) = row else {
            errors.push(format!("row {index} must be a list of cells"));
            continue;
        };
        if let Some(cell) = cells.iter().position(|cell| !cell.is_string()) {
            errors.push(format!("row {index} cell {cell} must be a string"));
        }
        match width {
            None => width = Some(cells.len()),
            Some(width) if width != cells.len() => errors.push(format!(
                "row {index} has {} columns, expected {width}",
                cells.len()
            )),
            Some(_) => {}
        }
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn validate_table(key: &str, entry: &Value, errors: &mut Vec<String>) {
    let Value::Object(entry) = entry else {
        errors.push(format!("table {key}: entry must be an object"));
        return;
    };
    for required in REQUIRED_TABLE_KEYS {
        if !entry.contains_key(*required) {
            errors.push(format!("table {key}: missing required field '{required}'"));
        }
    }

    match entry.get("hash") {
        Some(Value::String(hash)) if hash != key => errors.push(format!(
            "table {key}: hash mismatch, entry says {hash}"
        )),
        Some(Value::String(_)) | None => {}
        Some(_) => errors.push(format!("table {key}: hash must be a string")),
    }

    let label = match entry.get("status") {
        Some(Value::String(status)) => {
            let label = StatusLabel::classify(status);
            if let StatusLabel::Unknown(status) = &label {
                errors.push(format!("table {key}: invalid status '{status}'"));
            }
            Some(label)
        }
        Some(_) => {
            errors.push(format!("table {key}: status must be a string"));
            None
        }
        None => None,
    };

    for field in ["original_structure", "corrected_structure"] {
        let Some(structure) = entry.get(field).filter(|value| !value.is_null()) else {
            continue;
        };
        if let Err(problems) = validate_table_structure(structure) {
            errors.extend(
                problems
                    .into_iter()
                    .map(|problem| format!("table {key}: {field}: {problem}")),
            );
        }
    }

    let present = |field: &str| entry.get(field).is_some_and(|value| !value.is_null());
    match &label {
        Some(label) if label.requires_structures() => {
            if !present("original_structure") || !present("corrected_structure") {
                errors.push(format!(
                    "table {key}: status requires both original_structure and corrected_structure"
                ));
            }
        }
        Some(StatusLabel::Canonical(TableStatus::ConfirmedWithoutChanges)) => {
            if present("corrected_structure")
                && entry.get("corrected_structure") != entry.get("original_structure")
            {
                errors.push(format!(
                    "table {key}: confirmed_without_changes carries a differing corrected_structure"
                ));
            }
        }
        _ => {}
    }

    let versions = match entry.get("found_in_versions") {
        Some(Value::Array(versions)) => versions
            .iter()
            .filter_map(|version| match version {
                Value::String(version) => Some(version.clone()),
                _ => {
                    errors.push(format!("table {key}: found_in_versions must hold strings"));
                    None
                }
            })
            .collect::<Vec<_>>(),
        Some(_) => {
            errors.push(format!("table {key}: found_in_versions must be a list"));
            Vec::new()
        }
        None => Vec::new(),
    };
    match entry.get("pages") {
        Some(Value::Object(pages)) => {
            for version in &versions {
                if !pages.contains_key(version) {
                    errors.push(format!("table {key}: no pages for version {version}"));
                }
            }
        }
        Some(_) => errors.push(format!("table {key}: pages must be an object")),
        None => {}
    }
}

/// Validate one entry of a file's `tables` object on its own.
pub fn validate_table_entry(key: &str, entry: &Value) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    validate_table(key, entry, &mut errors);
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Validate a whole correction file, collecting every problem found.
pub fn validate_correction_file(file: &Value) -> Result<(), Vec<String>> {
    let Value::Object(file) = file else {
        return Err(vec!["correction file must be an object".to_owned()]);
    };
    let mut errors = Vec::new();
    for required in REQUIRED_ENVELOPE_KEYS {
        if !file.contains_key(*required) {
            errors.push(format!("missing required field '{required}'"));
        }
    }
    match file.get("status") {
        Some(Value::String(status)) if ReviewStatus::ALL.contains(&status.as_str()) => {}
        Some(status) => errors.push(format!("invalid file status {status}")),
        None => {}
    }
    match file.get("tables") {
        Some(Value::Object(tables)) => {
            for (key, entry) in tables {
                validate_table(key, entry, &mut errors);
            }
        }
        Some(_) => errors.push("tables must be an object".to_owned()),
        None => {}
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Drop entries that cannot be repaired and fill defaults for optional gaps.
///
/// Entries whose problems need a human (hash mismatch, missing structures
/// for a confirmed change) are left alone so validation still rejects them.
pub fn sanitize_correction_file(file: Value) -> Value {
    let Value::Object(mut file) = file else {
        return file;
    };
    if let Some(Value::Object(tables)) = file.remove("tables") {
        let tables = tables
            .into_iter()
            .filter_map(|(key, entry)| {
                let Value::Object(mut entry) = entry else {
                    return None;
                };
                entry
                    .entry("hash")
                    .or_insert_with(|| Value::String(key.clone()));
                if !entry.get("hash").is_some_and(Value::is_string) {
                    return None;
                }
                if !entry.get("status").is_some_and(Value::is_string) {
                    entry.insert(
                        "status".to_owned(),
                        Value::String(TableStatus::Undefined.to_string()),
                    );
                }
                if !entry.get("found_in_versions").is_some_and(Value::is_array) {
                    entry.insert("found_in_versions".to_owned(), Value::Array(Vec::new()));
                }
                let versions = entry["found_in_versions"]
                    .as_array()
                    .map(|versions| {
                        versions
                            .iter()
                            .filter_map(|v| v.as_str().map(ToOwned::to_owned))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                let pages = entry
                    .entry("pages")
                    .or_insert_with(|| Value::Object(Map::new()));
                if !pages.is_object() {
                    *pages = Value::Object(Map::new());
                }
                if let Value::Object(pages) = pages {
                    for version in versions {
                        pages.entry(version).or_insert_with(|| Value::Array(Vec::new()));
                    }
                }
                Some((key, Value::Object(entry)))
            })
            .collect::<Map<_, _>>();
        file.insert("tables".to_owned(), Value::Object(tables));
    }
    Value::Object(file)
}

/// Advisory check before corrections are applied to a page.
///
/// Never blocks: the first element is always `true`; the warnings are for
/// the operator.
pub fn is_safe_to_apply<'a>(
    tables: impl IntoIterator<Item = &'a TableHash>,
    corrections: &IndexMap<TableHash, TableCorrection>,
) -> (bool, Vec<String>) {
    let tables = tables.into_iter().collect::<Vec<_>>();
    let mut warnings = Vec::new();
    let statuses = tables
        .iter()
        .filter_map(|hash| corrections.get(*hash).map(|correction| &correction.status))
        .collect::<Vec<_>>();

    if !tables.is_empty()
        && statuses.len() == tables.len()
        && statuses.iter().all(|status| **status == TableStatus::Rejected)
    {
        warnings.push(format!("all {} tables would be rejected", tables.len()));
    }

    let merges = statuses
        .iter()
        .filter_map(|status| match status {
            TableStatus::Merged(target) => Some(target),
            _ => None,
        })
        .collect::<Vec<_>>();
    if !merges.is_empty() {
        warnings.push(format!("{} tables will be merged into other tables", merges.len()));
    }
    for target in merges {
        if !tables.contains(&target) && !corrections.contains_key(target) {
            warnings.push(format!("merge target {target} is not a known table"));
        }
    }
    (true, warnings)
}
