//! Table extraction over the structured extraction output
//!
//! Layout on disk:
//!
//! ```text
//! <root>/<law>/<version>/<law>-<version>-<suffix>.json   extraction output
//! <root>/<law>/<version>/<law>-<version>-<suffix>.pdf    source PDF
//! <root>/<law>/<version>/<law>-<version>-metadata.json   scraper metadata
//! ```

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::{
    ErrorContext, ErrorDetail,
    config::TableConfig,
    table::{PathParser, TableHash, TableStructure, build_structure, hash_structure},
};

mod document;

pub use document::{ExtractionDocument, VersionMetadata};

/// One table found in one law version.
#[derive(Debug, Clone, PartialEq)]
pub struct TableEntry {
    pub hash: TableHash,
    pub table_id: String,
    pub version: String,
    pub pages: Vec<u32>,
    pub structure: TableStructure,
    pub pdf_path: String,
    pub source_link: String,
}

/// A distinct table content and every version it was found in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueTable {
    pub hash: TableHash,
    pub found_in_versions: Vec<String>,
    pub pages: IndexMap<String, Vec<u32>>,
    pub pdf_paths: IndexMap<String, String>,
    pub source_links: IndexMap<String, String>,
    pub original_structure: TableStructure,
}

impl UniqueTable {
    fn absorb(&mut self, entry: TableEntry) {
        if !self.found_in_versions.contains(&entry.version) {
            self.found_in_versions.push(entry.version.clone());
        }
        let pages = self.pages.entry(entry.version.clone()).or_default();
        for page in entry.pages {
            if !pages.contains(&page) {
                pages.push(page);
            }
        }
        self.pdf_paths
            .entry(entry.version.clone())
            .or_insert(entry.pdf_path);
        self.source_links
            .entry(entry.version)
            .or_insert(entry.source_link);
    }
}

impl From<TableEntry> for UniqueTable {
    fn from(entry: TableEntry) -> Self {
        let mut table = UniqueTable {
            hash: entry.hash.clone(),
            found_in_versions: Vec::new(),
            pages: IndexMap::new(),
            pdf_paths: IndexMap::new(),
            source_links: IndexMap::new(),
            original_structure: entry.structure.clone(),
        };
        table.absorb(entry);
        table
    }
}

/// Sort key putting numeric versions in numeric order ahead of the rest.
fn version_key(version: &str) -> (Option<u64>, String) {
    (version.parse().ok(), version.to_owned())
}

fn subdirectories(ctx: &ErrorContext, dir: &Path) -> Result<Vec<String>, crate::Error> {
    let entries = std::fs::read_dir(dir).map_err(|e| ctx.error(ErrorDetail::ListDirectory(e)))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ctx.error(ErrorDetail::ListDirectory(e)))?;
        if !entry.file_type().is_ok_and(|ty| ty.is_dir()) {
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) if !name.starts_with('.') => names.push(name.to_owned()),
            _ => {}
        }
    }
    Ok(names)
}

/// Reads extraction output of one folder (dataset partition).
pub struct TableExtractor {
    root: PathBuf,
    parser: PathParser,
    y_tolerance: f64,
    artifact_suffix: String,
}

impl TableExtractor {
    pub fn new(root: impl Into<PathBuf>, config: &TableConfig) -> Result<Self, crate::config::Error> {
        Ok(Self {
            root: root.into(),
            parser: config.path_parser()?,
            y_tolerance: config.y_tolerance,
            artifact_suffix: config.artifact_suffix.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version_dir(&self, law_id: &str, version: &str) -> PathBuf {
        self.root.join(law_id).join(version)
    }

    pub fn artifact_path(&self, law_id: &str, version: &str) -> PathBuf {
        self.version_dir(law_id, version)
            .join(format!("{law_id}-{version}-{}.json", self.artifact_suffix))
    }

    pub fn pdf_path(&self, law_id: &str, version: &str) -> PathBuf {
        self.version_dir(law_id, version)
            .join(format!("{law_id}-{version}-{}.pdf", self.artifact_suffix))
    }

    fn source_link(&self, law_id: &str, version: &str) -> String {
        let path = self
            .version_dir(law_id, version)
            .join(format!("{law_id}-{version}-metadata.json"));
        let Ok(src) = std::fs::read_to_string(&path) else {
            return String::new();
        };
        match serde_json::from_str::<VersionMetadata>(&src) {
            Ok(metadata) => metadata.doc_info.law_text_url.unwrap_or_default(),
            Err(error) => {
                warn!(%error, path = %path.display(), "unreadable version metadata");
                String::new()
            }
        }
    }

    /// Laws present in this folder, sorted.
    pub fn list_laws(&self) -> Result<Vec<String>, crate::Error> {
        let ctx = ErrorContext::new(&self.root);
        if !self.root.is_dir() {
            return Err(ctx.error(ErrorDetail::MissingDataRoot));
        }
        Ok(subdirectories(&ctx, &self.root)?.into_iter().sorted().collect())
    }

    /// Versions of a law, numeric versions in numeric order.
    pub fn list_versions(&self, law_id: &str) -> Result<Vec<String>, crate::Error> {
        let dir = self.root.join(law_id);
        let ctx = ErrorContext::new(&dir).with_law(law_id, None);
        Ok(subdirectories(&ctx, &dir)?
            .into_iter()
            .sorted_by_key(|version| version_key(version))
            .collect())
    }

    /// Tables of one version, keyed by content hash.
    ///
    /// A missing extraction artifact yields an empty map; a malformed one is
    /// an error for this version only.
    pub fn extract_tables_from_version(
        &self,
        law_id: &str,
        version: &str,
    ) -> Result<IndexMap<TableHash, TableEntry>, crate::Error> {
        let path = self.artifact_path(law_id, version);
        let ctx = ErrorContext::new(&path).with_law(law_id, Some(version));
        let src = match std::fs::read_to_string(&path) {
            Ok(src) => src,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                warn!(%law_id, %version, path = %path.display(), "no extraction output, skipping");
                return Ok(IndexMap::new());
            }
            Err(error) => return Err(ctx.error(ErrorDetail::ReadDocument(error))),
        };
        let document: ExtractionDocument =
            serde_json::from_str(&src).map_err(|error| ctx.error(ErrorDetail::ParseJson(error)))?;

        let pdf_path = self.pdf_path(law_id, version).display().to_string();
        let source_link = self.source_link(law_id, version);

        let mut tables: IndexMap<TableHash, TableEntry> = IndexMap::new();
        for (table_id, fragments) in document.table_fragments() {
            let structure = build_structure(&self.parser, self.y_tolerance, &fragments);
            if structure.iter().flatten().all(|cell| cell.trim().is_empty()) {
                debug!(%law_id, %version, %table_id, "table without text, skipping");
                continue;
            }
            let hash = hash_structure(&structure);
            let pages = fragments
                .iter()
                .filter_map(|fragment| fragment.page)
                .unique()
                .sorted()
                .collect::<Vec<_>>();
            match tables.get_mut(&hash) {
                Some(existing) => {
                    for page in pages {
                        if !existing.pages.contains(&page) {
                            existing.pages.push(page);
                        }
                    }
                    existing.pages.sort_unstable();
                }
                None => {
                    tables.insert(
                        hash.clone(),
                        TableEntry {
                            hash,
                            table_id,
                            version: version.to_owned(),
                            pages,
                            structure,
                            pdf_path: pdf_path.clone(),
                            source_link: source_link.clone(),
                        },
                    );
                }
            }
        }
        debug!(%law_id, %version, tables = tables.len(), "extracted tables");
        Ok(tables)
    }

    /// Tables of every version of a law, deduplicated by content hash.
    ///
    /// A version that fails to process is logged and skipped.
    pub fn extract_unique_tables_from_law(
        &self,
        law_id: &str,
    ) -> Result<IndexMap<TableHash, UniqueTable>, crate::Error> {
        let mut unique: IndexMap<TableHash, UniqueTable> = IndexMap::new();
        for version in self.list_versions(law_id)? {
            let tables = match self.extract_tables_from_version(law_id, &version) {
                Ok(tables) => tables,
                Err(error) => {
                    error!(%law_id, %version, %error, "failed to extract tables from version");
                    continue;
                }
            };
            for (hash, entry) in tables {
                match unique.get_mut(&hash) {
                    Some(table) => table.absorb(entry),
                    None => {
                        unique.insert(hash, entry.into());
                    }
                }
            }
        }
        Ok(unique)
    }

    /// Tables in scope: one version, or every version of the law.
    pub fn extract_scope(
        &self,
        law_id: &str,
        version: Option<&str>,
    ) -> Result<IndexMap<TableHash, UniqueTable>, crate::Error> {
        match version {
            Some(version) => Ok(self
                .extract_tables_from_version(law_id, version)?
                .into_iter()
                .map(|(hash, entry)| (hash, entry.into()))
                .collect()),
            None => self.extract_unique_tables_from_law(law_id),
        }
    }
}
