//! Correction files on disk
//!
//! ```text
//! <root>/<folder>/<law>/<law>-table-corrections.json                     legacy, whole law
//! <root>/<folder>/<law>/<version>/<law>-<version>-table-corrections.json  one version
//! ```
//!
//! Both layouts are readable side by side so migrated and unmigrated laws
//! coexist. Every write goes through validation, holds the file's advisory
//! lock and replaces the file atomically.

use std::{
    io::Write as _,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{
    Error, ErrorContext, ErrorDetail, batch::BatchReport, extract::TableExtractor,
    table::TableHash,
};

use super::{
    lock::CorrectionLock,
    status::ReviewStatus,
    types::{CorrectionFile, TableCorrection},
    validate::{sanitize_correction_file, validate_correction_file, validate_table_entry},
};

const FILE_SUFFIX: &str = "table-corrections.json";

/// Which correction files a reset removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    Legacy,
    PerVersion,
    All,
}

impl ResetScope {
    fn legacy(self) -> bool {
        matches!(self, Self::Legacy | Self::All)
    }

    fn per_version(self) -> bool {
        matches!(self, Self::PerVersion | Self::All)
    }
}

impl FromStr for ResetScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(Self::Legacy),
            "per-version" | "per_version" => Ok(Self::PerVersion),
            "all" => Ok(Self::All),
            other => Err(format!("unknown reset scope: {other}")),
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn read_json(ctx: &ErrorContext, path: &Path) -> Result<Option<Value>, Error> {
    let src = match std::fs::read_to_string(path) {
        Ok(src) => src,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(ctx.error(ErrorDetail::ReadDocument(error))),
    };
    serde_json::from_str(&src)
        .map(Some)
        .map_err(|error| ctx.error(ErrorDetail::ParseJson(error)))
}

/// Validate, and on failure sanitize once and validate again.
fn checked(ctx: &ErrorContext, file: Value) -> Result<Value, Error> {
    let Err(errors) = validate_correction_file(&file) else {
        return Ok(file);
    };
    warn!(%ctx, errors = errors.len(), "correction file invalid, sanitizing");
    let file = sanitize_correction_file(file);
    validate_correction_file(&file).map_err(|errors| ctx.error(ErrorDetail::Validation(errors)))?;
    Ok(file)
}

/// Replace `path` with the pretty-printed `value` in one rename.
fn write_atomic(path: &Path, value: &Value) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|error| error.error)?;
    Ok(())
}

fn remove_if_exists(ctx: &ErrorContext, path: &Path) -> Result<bool, Error> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(ctx.error(ErrorDetail::RemoveDocument(error))),
    }
}

fn subdirectories(ctx: &ErrorContext, dir: &Path) -> Result<Vec<String>, Error> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(ctx.error(ErrorDetail::ListDirectory(error))),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|error| ctx.error(ErrorDetail::ListDirectory(error)))?;
        if !entry.file_type().is_ok_and(|ty| ty.is_dir()) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_owned());
        }
    }
    names.sort();
    Ok(names)
}

pub struct CorrectionStore {
    root: PathBuf,
    reviewer: String,
}

impl CorrectionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            reviewer: "system".to_owned(),
        }
    }

    /// Name recorded as `reviewer` in files this store writes.
    pub fn with_reviewer(self, reviewer: impl Into<String>) -> Self {
        Self {
            reviewer: reviewer.into(),
            ..self
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn law_dir(&self, law_id: &str, folder: &str) -> PathBuf {
        self.root.join(folder).join(law_id)
    }

    pub fn correction_path(&self, law_id: &str, version: Option<&str>, folder: &str) -> PathBuf {
        let dir = self.law_dir(law_id, folder);
        match version {
            Some(version) => dir
                .join(version)
                .join(format!("{law_id}-{version}-{FILE_SUFFIX}")),
            None => dir.join(format!("{law_id}-{FILE_SUFFIX}")),
        }
    }

    fn context(&self, law_id: &str, version: Option<&str>, folder: &str) -> (PathBuf, ErrorContext) {
        let path = self.correction_path(law_id, version, folder);
        let ctx = ErrorContext::new(&path).with_law(law_id, version);
        (path, ctx)
    }

    /// Load a correction file. Absent and unreadable files both give `None`;
    /// the latter is logged.
    pub fn get(&self, law_id: &str, version: Option<&str>, folder: &str) -> Option<CorrectionFile> {
        let (path, ctx) = self.context(law_id, version, folder);
        let value = match read_json(&ctx, &path) {
            Ok(value) => value?,
            Err(error) => {
                warn!(%error, "unreadable correction file");
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(file) => Some(file),
            Err(error) => {
                warn!(%ctx, %error, "malformed correction file");
                None
            }
        }
    }

    /// Decisions that apply to one version: its own file, else the law-level
    /// file.
    pub fn get_effective(&self, law_id: &str, version: &str, folder: &str) -> Option<CorrectionFile> {
        self.get(law_id, Some(version), folder).or_else(|| {
            let legacy = self.get(law_id, None, folder);
            if legacy.is_some() {
                debug!(%law_id, %version, "using law-level corrections");
            }
            legacy
        })
    }

    /// Store a completed review.
    ///
    /// Nothing is written when the file does not validate, even after
    /// sanitizing.
    pub fn save(
        &self,
        law_id: &str,
        tables: IndexMap<TableHash, TableCorrection>,
        version: Option<&str>,
        folder: &str,
    ) -> Result<PathBuf, Error> {
        let file = CorrectionFile {
            law_id: law_id.to_owned(),
            version: version.map(ToOwned::to_owned),
            reviewed_at: now(),
            reviewer: self.reviewer.clone(),
            status: ReviewStatus::Completed,
            tables,
        };
        let (path, ctx) = self.context(law_id, version, folder);
        let value = serde_json::to_value(&file).map_err(|error| ctx.error(ErrorDetail::SerializeJson(error)))?;
        self.write(&path, &ctx, value)?;
        info!(%law_id, ?version, tables = file.tables.len(), "saved corrections");
        Ok(path)
    }

    /// Store a review as submitted by a review tool: `tables` is the raw
    /// JSON object keyed by hash.
    pub fn save_json(
        &self,
        law_id: &str,
        tables: Map<String, Value>,
        version: Option<&str>,
        folder: &str,
    ) -> Result<PathBuf, Error> {
        let mut file = Map::new();
        file.insert("law_id".to_owned(), Value::String(law_id.to_owned()));
        if let Some(version) = version {
            file.insert("version".to_owned(), Value::String(version.to_owned()));
        }
        file.insert("reviewed_at".to_owned(), Value::String(now()));
        file.insert("reviewer".to_owned(), Value::String(self.reviewer.clone()));
        file.insert("status".to_owned(), Value::String("completed".to_owned()));
        file.insert("tables".to_owned(), Value::Object(tables));
        let (path, ctx) = self.context(law_id, version, folder);
        self.write(&path, &ctx, Value::Object(file))?;
        Ok(path)
    }

    fn write(&self, path: &Path, ctx: &ErrorContext, value: Value) -> Result<(), Error> {
        let value = checked(ctx, value)?;
        let _lock = CorrectionLock::acquire(path).map_err(|error| ctx.error(ErrorDetail::Lock(error)))?;
        write_atomic(path, &value).map_err(|error| ctx.error(ErrorDetail::WriteDocument(error)))
    }

    /// Create a `not_started` file with every extracted table undecided.
    /// Returns `false` without touching anything when a file already exists.
    pub fn initialize(
        &self,
        law_id: &str,
        version: Option<&str>,
        folder: &str,
        extractor: &TableExtractor,
    ) -> Result<bool, Error> {
        let (path, ctx) = self.context(law_id, version, folder);
        if path.exists() {
            debug!(%law_id, ?version, "corrections exist, not initializing");
            return Ok(false);
        }
        let tables = extractor.extract_scope(law_id, version)?;
        let file = CorrectionFile {
            law_id: law_id.to_owned(),
            version: version.map(ToOwned::to_owned),
            reviewed_at: now(),
            reviewer: self.reviewer.clone(),
            status: ReviewStatus::NotStarted,
            tables: tables
                .values()
                .map(|table| (table.hash.clone(), TableCorrection::undecided(table)))
                .collect(),
        };
        let value = serde_json::to_value(&file).map_err(|error| ctx.error(ErrorDetail::SerializeJson(error)))?;
        let value = checked(&ctx, value)?;
        let _lock = CorrectionLock::acquire(&path).map_err(|error| ctx.error(ErrorDetail::Lock(error)))?;
        if path.exists() {
            return Ok(false);
        }
        write_atomic(&path, &value).map_err(|error| ctx.error(ErrorDetail::WriteDocument(error)))?;
        info!(%law_id, ?version, tables = file.tables.len(), "initialized corrections");
        Ok(true)
    }

    /// Append tables the current extraction has and the file lacks.
    ///
    /// Only the appended entries are validated; existing entries and the
    /// envelope are written back as read, even when they would not pass
    /// validation themselves. Without a correction file this is a no-op:
    /// the first file comes from review or `initialize`.
    pub fn update_with_new_tables(
        &self,
        law_id: &str,
        version: Option<&str>,
        folder: &str,
        extractor: &TableExtractor,
    ) -> Result<Vec<TableHash>, Error> {
        let (path, ctx) = self.context(law_id, version, folder);
        if !path.exists() {
            debug!(%law_id, ?version, "no corrections yet, nothing to update");
            return Ok(Vec::new());
        }
        let tables = extractor.extract_scope(law_id, version)?;

        let _lock = CorrectionLock::acquire(&path).map_err(|error| ctx.error(ErrorDetail::Lock(error)))?;
        let Some(Value::Object(mut file)) = read_json(&ctx, &path)? else {
            return Ok(Vec::new());
        };
        if !file.get("tables").is_some_and(Value::is_object) {
            file.insert("tables".to_owned(), Value::Object(Map::new()));
        }
        let Some(Value::Object(stored)) = file.get_mut("tables") else {
            return Ok(Vec::new());
        };

        let discovered_at = now();
        let mut added = Vec::new();
        for table in tables.values() {
            if stored.contains_key(table.hash.as_str()) {
                continue;
            }
            let entry = serde_json::to_value(TableCorrection::discovered(table, discovered_at.clone()))
                .map_err(|error| ctx.error(ErrorDetail::SerializeJson(error)))?;
            validate_table_entry(table.hash.as_str(), &entry)
                .map_err(|errors| ctx.error(ErrorDetail::Validation(errors)))?;
            stored.insert(table.hash.to_string(), entry);
            added.push(table.hash.clone());
        }
        if added.is_empty() {
            return Ok(added);
        }
        write_atomic(&path, &Value::Object(file)).map_err(|error| ctx.error(ErrorDetail::WriteDocument(error)))?;
        info!(%law_id, ?version, added = added.len(), "appended newly discovered tables");
        Ok(added)
    }

    /// Whether every extracted table in scope has a decision, and the hashes
    /// that do not.
    ///
    /// For a whole law each table is checked against the effective file of
    /// every version it was found in.
    pub fn validate_law_completion(
        &self,
        law_id: &str,
        version: Option<&str>,
        folder: &str,
        extractor: &TableExtractor,
    ) -> Result<(bool, Vec<TableHash>), Error> {
        let tables = extractor.extract_scope(law_id, version)?;
        let undecided = match version {
            Some(version) => match self.get_effective(law_id, version, folder) {
                Some(file) => file.undecided(tables.keys()),
                None => tables.keys().cloned().collect(),
            },
            None => {
                let mut files: IndexMap<String, Option<CorrectionFile>> = IndexMap::new();
                let mut undecided = Vec::new();
                for table in tables.values() {
                    let decided = table.found_in_versions.iter().all(|version| {
                        files
                            .entry(version.clone())
                            .or_insert_with(|| self.get_effective(law_id, version, folder))
                            .as_ref()
                            .and_then(|file| file.get(table.hash.as_str()))
                            .is_some_and(|correction| correction.status.is_resolved())
                    });
                    if !decided {
                        undecided.push(table.hash.clone());
                    }
                }
                undecided
            }
        };
        Ok((undecided.is_empty(), undecided))
    }

    /// Split a law-level file into per-version files.
    ///
    /// Every entry is copied to each version in its `found_in_versions`.
    /// Entries already present in a per-version file win. The law-level file
    /// is kept. Returns the versions written.
    pub fn migrate_law_to_per_version(&self, law_id: &str, folder: &str) -> Result<Vec<String>, Error> {
        let (legacy_path, legacy_ctx) = self.context(law_id, None, folder);
        let Some(Value::Object(legacy)) = read_json(&legacy_ctx, &legacy_path)? else {
            debug!(%law_id, "no law-level corrections to migrate");
            return Ok(Vec::new());
        };

        let mut per_version: IndexMap<String, Map<String, Value>> = IndexMap::new();
        if let Some(Value::Object(tables)) = legacy.get("tables") {
            for (hash, entry) in tables {
                let versions = entry
                    .get("found_in_versions")
                    .and_then(Value::as_array)
                    .map(|versions| versions.iter().filter_map(Value::as_str).collect::<Vec<_>>())
                    .unwrap_or_default();
                if versions.is_empty() {
                    warn!(%law_id, %hash, "entry without versions, not migrated");
                }
                for version in versions {
                    per_version
                        .entry(version.to_owned())
                        .or_default()
                        .insert(hash.clone(), entry.clone());
                }
            }
        }

        let mut written = Vec::new();
        for (version, entries) in per_version {
            let (path, ctx) = self.context(law_id, Some(&version), folder);
            let _lock = CorrectionLock::acquire(&path).map_err(|error| ctx.error(ErrorDetail::Lock(error)))?;
            let mut file = match read_json(&ctx, &path)? {
                Some(Value::Object(file)) => file,
                _ => {
                    let mut file = legacy.clone();
                    file.insert("tables".to_owned(), Value::Object(Map::new()));
                    file
                }
            };
            file.insert("version".to_owned(), Value::String(version.clone()));
            let mut tables = match file.remove("tables") {
                Some(Value::Object(tables)) => tables,
                _ => Map::new(),
            };
            let before = tables.len();
            for (hash, entry) in entries {
                if !tables.contains_key(&hash) {
                    tables.insert(hash, entry);
                }
            }
            if tables.len() == before && path.exists() {
                continue;
            }
            file.insert("tables".to_owned(), Value::Object(tables));
            let value = checked(&ctx, Value::Object(file))?;
            write_atomic(&path, &value).map_err(|error| ctx.error(ErrorDetail::WriteDocument(error)))?;
            written.push(version);
        }
        info!(%law_id, versions = written.len(), "migrated corrections to per-version files");
        Ok(written)
    }

    /// Versions of a law that have their own correction file.
    pub fn list_versions(&self, law_id: &str, folder: &str) -> Result<Vec<String>, Error> {
        let dir = self.law_dir(law_id, folder);
        let ctx = ErrorContext::new(&dir).with_law(law_id, None);
        Ok(subdirectories(&ctx, &dir)?
            .into_iter()
            .filter(|version| self.correction_path(law_id, Some(version), folder).is_file())
            .collect())
    }

    /// Laws of a folder with any correction file.
    pub fn list_laws(&self, folder: &str) -> Result<Vec<String>, Error> {
        let dir = self.root.join(folder);
        let ctx = ErrorContext::new(&dir);
        let mut laws = Vec::new();
        for law_id in subdirectories(&ctx, &dir)? {
            if self.correction_path(&law_id, None, folder).is_file()
                || !self.list_versions(&law_id, folder)?.is_empty()
            {
                laws.push(law_id);
            }
        }
        Ok(laws)
    }

    /// Delete a law's correction files. Returns the files removed.
    pub fn reset_law(&self, law_id: &str, folder: &str, scope: ResetScope) -> Result<Vec<PathBuf>, Error> {
        let mut removed = Vec::new();
        if scope.legacy() {
            let (path, ctx) = self.context(law_id, None, folder);
            if remove_if_exists(&ctx, &path)? {
                removed.push(path);
            }
        }
        if scope.per_version() {
            for version in self.list_versions(law_id, folder)? {
                let (path, ctx) = self.context(law_id, Some(&version), folder);
                if remove_if_exists(&ctx, &path)? {
                    removed.push(path);
                }
            }
        }
        info!(%law_id, removed = removed.len(), "reset corrections");
        Ok(removed)
    }

    /// Reset every law of a folder. Each law is independent; failures are
    /// collected, not propagated.
    pub fn reset_folder(&self, folder: &str, scope: ResetScope) -> Result<BatchReport, Error> {
        let mut report = BatchReport::default();
        for law_id in self.list_laws(folder)? {
            match self.reset_law(&law_id, folder, scope) {
                Ok(_) => report.succeeded.push(law_id),
                Err(error) => {
                    warn!(%law_id, %error, "failed to reset corrections");
                    report.failed.push((law_id, error.to_string()));
                }
            }
        }
        Ok(report)
    }
}
