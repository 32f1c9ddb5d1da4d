//! Findings shared by both evidence lanes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable finding codes
pub mod codes {
    pub const MISSING_REQUIRED_DOC: &str = "missing-required-doc";
    pub const MISSING_SPEC_ROOT: &str = "missing-spec-root";
    pub const EMPTY_SPEC_ROOT: &str = "empty-spec-root";
    pub const MISSING_PREFLIGHT_ARTIFACT: &str = "missing-preflight-artifact";
    pub const STALE_PREFLIGHT_ARTIFACT: &str = "stale-preflight-artifact";
    pub const SEMANTIC_RUN_FAILED: &str = "semantic-run-failed";
    pub const MISSING_SEMANTIC_REVIEWER: &str = "missing-semantic-reviewer";
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(alias = "LOW", alias = "Low")]
    Low,
    #[serde(alias = "MEDIUM", alias = "Medium")]
    Medium,
    #[serde(alias = "HIGH", alias = "High")]
    High,
}

impl Severity {
    pub fn all() -> [Self; 3] {
        [Self::Low, Self::Medium, Self::High]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown severity `{other}`")),
        }
    }
}

/// Which lane produced a finding
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSource {
    Deterministic,
    Semantic,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub source: FindingSource,
}

impl Finding {
    pub fn deterministic(severity: Severity, code: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.to_string(),
            message: message.into(),
            source: FindingSource::Deterministic,
        }
    }

    pub fn semantic(severity: Severity, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            source: FindingSource::Semantic,
        }
    }
}

/// Counts of high and medium findings
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct FindingSummary {
    pub high: usize,
    pub medium: usize,
    pub total: usize,
}

impl FindingSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let count = |sev: Severity| findings.iter().filter(|f| f.severity == sev).count();
        Self {
            high: count(Severity::High),
            medium: count(Severity::Medium),
            total: findings.len(),
        }
    }
}
