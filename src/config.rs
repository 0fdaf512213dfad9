use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::table::PathParser;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to read config: {0}")]
    Read(std::io::Error),
    #[error("Failed to parse YAML config: {0}")]
    ParseYaml(serde_yaml::Error),
    #[error("Failed to parse TOML config: {0}")]
    ParseToml(toml::de::Error),
    #[error("Invalid table marker: {0}")]
    Marker(regex::Error),
}

/// How table fragments are laid out into grids.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TableConfig {
    /// Path component marking a table row, e.g. `TR`.
    pub row_marker: String,
    /// Path components marking a cell, e.g. `TD` and `TH`.
    pub cell_markers: Vec<String>,
    /// Maximum vertical distance for fragments to share a row when paths
    /// carry no markers.
    pub y_tolerance: f64,
    /// Suffix of the extraction artifacts: `<law>-<version>-<suffix>.json`.
    pub artifact_suffix: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            row_marker: "TR".to_owned(),
            cell_markers: vec!["TD".to_owned(), "TH".to_owned()],
            y_tolerance: 5.0,
            artifact_suffix: "original".to_owned(),
        }
    }
}

impl TableConfig {
    pub fn path_parser(&self) -> Result<PathParser, Error> {
        PathParser::new(&self.row_marker, self.cell_markers.as_slice()).map_err(Error::Marker)
    }
}

fn default_folder() -> String {
    "zhlex_files".to_owned()
}

fn default_reviewer() -> String {
    "build".to_owned()
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Root of the extraction output: `<data_dir>/<folder>/<law>/<version>/`.
    pub data_dir: PathBuf,
    /// Root of the correction files: `<corrections_dir>/<folder>/<law>/...`.
    pub corrections_dir: PathBuf,
    /// Root of the rendered site: `<html_dir>/<folder>/<law>-<version>.html`.
    #[serde(default)]
    pub html_dir: Option<PathBuf>,
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default = "default_reviewer")]
    pub reviewer: String,
    #[serde(default)]
    pub tables: TableConfig,
}

impl Config {
    /// Load a YAML or TOML config, picked by file extension.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let src = std::fs::read_to_string(path).map_err(Error::Read)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::de::from_str(&src).map_err(Error::ParseToml),
            _ => serde_yaml::from_str(&src).map_err(Error::ParseYaml),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.data_dir.is_dir() {
            return Err(format!(
                "data directory {} does not exist",
                self.data_dir.display()
            ));
        }
        if self.tables.cell_markers.is_empty() {
            return Err("tables.cell_markers must not be empty".to_owned());
        }
        if !(self.tables.y_tolerance.is_finite() && self.tables.y_tolerance >= 0.0) {
            return Err(format!(
                "tables.y_tolerance must be a non-negative number, got {}",
                self.tables.y_tolerance
            ));
        }
        self.tables
            .path_parser()
            .map(|_| ())
            .map_err(|error| error.to_string())
    }
}
