use std::path::PathBuf;

pub mod apply;
pub mod batch;
pub mod config;
pub mod correction;
pub mod extract;
pub mod html;
pub mod progress;
pub mod table;


#[derive(Debug, thiserror::Error)]
#[error("{context}: {detail}")]
pub struct Error {
    pub context: Box<ErrorContext>,
    pub detail: Box<ErrorDetail>,
}

/// Where an error happened: the file being touched and, when known, the law
/// and version it belongs to.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub path: PathBuf,
    pub law_id: Option<String>,
    pub version: Option<String>,
}

impl ErrorContext {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            law_id: None,
            version: None,
        }
    }

    pub fn with_law(&self, law_id: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            path: self.path.clone(),
            law_id: Some(law_id.into()),
            version: version.map(ToOwned::to_owned),
        }
    }

    pub fn error(&self, detail: ErrorDetail) -> Error {
        Error {
            context: Box::new(self.clone()),
            detail: Box::new(detail),
        }
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.law_id, &self.version) {
            (Some(law_id), Some(version)) => {
                write!(f, "{law_id}@{version}({})", self.path.display())
            }
            (Some(law_id), None) => write!(f, "{law_id}({})", self.path.display()),
            _ => write!(f, "{}", self.path.display()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorDetail {
    #[error("Failed to read document: {0}")]
    ReadDocument(std::io::Error),
    #[error("Failed to write document: {0}")]
    WriteDocument(std::io::Error),
    #[error("Failed to remove document: {0}")]
    RemoveDocument(std::io::Error),
    #[error("Failed to list directory: {0}")]
    ListDirectory(std::io::Error),
    #[error("Failed to parse JSON document: {0}")]
    ParseJson(serde_json::Error),
    #[error("Failed to serialize JSON document: {0}")]
    SerializeJson(serde_json::Error),
    #[error("Failed to lock correction file: {0}")]
    Lock(std::io::Error),
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("Data directory does not exist")]
    MissingDataRoot,
}
