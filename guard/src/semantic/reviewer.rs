//! Reviewer capability interface

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::finding::Severity;

/// What the reviewer is asked to look at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    pub task: String,
    pub changed_paths: Vec<String>,
    pub model: Option<String>,
    pub max_findings: usize,
    pub schema_path: PathBuf,
    pub repo_root: PathBuf,
}

/// Every way a review can fail. The adapter turns all of them into an `ERROR` sub-result.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Reviewer executable not found: {0}")]
    NotFound(String),

    #[error("Reviewer timed out after {0}s")]
    Timeout(u64),

    #[error("Reviewer was cancelled")]
    Cancelled,

    #[error("Reviewer exited with status {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("Reviewer output is not valid JSON: {0}")]
    InvalidOutput(String),

    #[error("Reviewer output failed schema validation: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Reviewer I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// External reviewer.
///
/// Implementations should honor `timeout`, but the adapter enforces it
/// regardless by racing the returned future.
#[async_trait::async_trait]
pub trait Reviewer: Send + Sync {
    /// Engine label written to the semantic artifact
    fn engine(&self) -> &str;

    /// Run a review and return the raw JSON the reviewer produced
    async fn invoke(
        &self,
        request: &ReviewRequest,
        timeout: Duration,
    ) -> Result<serde_json::Value, ReviewError>;
}

/// One finding as reported by the reviewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFinding {
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

/// Reviewer response after schema validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewOutput {
    #[serde(default)]
    pub summary: String,
    pub findings: Vec<ReviewFinding>,
}
