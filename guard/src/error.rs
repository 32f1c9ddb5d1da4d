//! Guard run errors
//!
//! Everything here aborts a run. Conditions that should surface as findings
//! never reach this type.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GuardError>;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Policy file not found: {path}")]
    PolicyNotFound { path: PathBuf },

    #[error("Failed to read policy {path}: {source}")]
    PolicyRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid policy JSON in {path}: {source}")]
    PolicyParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid policy: {0}")]
    PolicyInvalid(String),

    #[error("Semantic review schema not found: {path}")]
    SchemaMissing { path: PathBuf },

    #[error("Failed to read semantic review schema {path}: {source}")]
    SchemaRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid semantic review schema {path}: {message}")]
    SchemaInvalid { path: PathBuf, message: String },

    #[error("Failed to inspect {path}: {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to walk {path}: {source}")]
    DirectoryWalk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("Failed to write artifact in {path}: {source}")]
    ArtifactWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl GuardError {
    /// Configuration problems, as opposed to infrastructure failures
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::PolicyNotFound { .. }
                | Self::PolicyRead { .. }
                | Self::PolicyParse { .. }
                | Self::PolicyInvalid(_)
                | Self::SchemaMissing { .. }
                | Self::SchemaRead { .. }
                | Self::SchemaInvalid { .. }
        )
    }
}
