//! Guard artifact shapes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::aggregate::{GuardStatus, Mode};
use crate::finding::{Finding, FindingSummary};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SemanticStatus {
    Pass,
    Warn,
    Error,
    Skipped,
}

impl SemanticStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for SemanticStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic lane sub-result embedded in the guard artifact
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticResult {
    pub status: SemanticStatus,
    pub artifact_path: Option<String>,
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SemanticResult {
    pub fn skipped() -> Self {
        Self {
            status: SemanticStatus::Skipped,
            artifact_path: None,
            findings: Vec::new(),
            reported_count: None,
            error: None,
        }
    }
}

/// Write-once record of one guard run
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardResult {
    pub status: GuardStatus,
    pub mode: Mode,
    pub task: String,
    pub deterministic_findings: Vec<Finding>,
    pub deterministic_summary: FindingSummary,
    pub semantic: SemanticResult,
    pub generated_at: DateTime<Utc>,
}
