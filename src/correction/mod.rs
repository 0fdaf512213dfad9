//! Human review decisions about extracted tables
//!
//! Decisions are stored per law (legacy layout) or per law version as JSON
//! correction files keyed by table hash. [`CorrectionStore`] owns the file
//! layout and every write; [`plan`] turns a stored decision into what the
//! build does with the table.

mod lock;
mod plan;
mod stats;
mod status;
mod store;
mod types;
mod validate;

pub use lock::{CorrectionLock, lock_path};
pub use plan::{TableAction, plan, row_paragraphs};
pub use stats::CorrectionStats;
pub use status::{ReviewStatus, StatusLabel, TableStatus, UnknownStatus, migrate_table_status};
pub use store::{CorrectionStore, ResetScope};
pub use types::{
    CorrectionFile, NEW_TABLE_REASON, RawCorrectionFile, RawTableCorrection, TableCorrection,
};
pub use validate::{
    is_safe_to_apply, sanitize_correction_file, validate_correction_file, validate_table_entry,
    validate_table_structure,
};
