//! Workflow policy configuration
//!
//! Loaded from camelCase JSON. `requiredDocs` must be present; every other
//! key has a default. Unknown keys are ignored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{GuardError, Result};
use crate::finding::Severity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardPolicy {
    /// Paths (relative to the repo root) that must exist
    pub required_docs: Vec<String>,

    #[serde(default = "default_spec_root")]
    pub spec_root: String,

    #[serde(default)]
    pub deterministic_checks: DeterministicChecks,

    #[serde(default)]
    pub preflight: PreflightPolicy,

    #[serde(default)]
    pub semantic_review: SemanticReviewPolicy,
}

fn default_spec_root() -> String {
    ".specs".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeterministicChecks {
    #[serde(default)]
    pub require_spec_docs: bool,

    #[serde(default)]
    pub require_preflight_artifact: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightPolicy {
    #[serde(default)]
    pub required: bool,

    #[serde(default = "default_artifact_glob")]
    pub artifact_glob: String,

    /// Maximum age of the newest artifact; unset disables the staleness check
    #[serde(default)]
    pub max_age_hours: Option<f64>,

    #[serde(default = "default_top")]
    pub top: usize,

    #[serde(default = "default_max_cases")]
    pub max_cases: usize,
}

fn default_artifact_glob() -> String {
    "logs/agent/preflight/*.json".to_string()
}

fn default_top() -> usize {
    lessonkit_lessons::preflight::DEFAULT_TOP
}

fn default_max_cases() -> usize {
    lessonkit_lessons::preflight::DEFAULT_MAX_CASES
}

impl Default for PreflightPolicy {
    fn default() -> Self {
        Self {
            required: false,
            artifact_glob: default_artifact_glob(),
            max_age_hours: None,
            top: default_top(),
            max_cases: default_max_cases(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticReviewPolicy {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_schema_path")]
    pub schema_path: String,

    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,

    /// Empty means the reviewer's default model
    #[serde(default)]
    pub model: String,

    #[serde(default = "default_max_findings")]
    pub max_findings: usize,

    #[serde(default)]
    pub block_on_severity: BTreeSet<Severity>,

    /// Reviewer executable
    #[serde(default = "default_command")]
    pub command: String,
}

fn default_schema_path() -> String {
    "scripts/config/agent/semantic_review_schema.json".to_string()
}

fn default_timeout_sec() -> u64 {
    180
}

fn default_max_findings() -> usize {
    6
}

fn default_command() -> String {
    "codex".to_string()
}

impl Default for SemanticReviewPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            schema_path: default_schema_path(),
            timeout_sec: default_timeout_sec(),
            model: String::new(),
            max_findings: default_max_findings(),
            block_on_severity: BTreeSet::new(),
            command: default_command(),
        }
    }
}

impl SemanticReviewPolicy {
    /// Model name, or `None` when unset
    pub fn model(&self) -> Option<&str> {
        let model = self.model.trim();
        (!model.is_empty()).then_some(model)
    }
}

impl GuardPolicy {
    /// Load from `path`. A missing file is a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GuardError::PolicyNotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(GuardError::PolicyRead {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&contents, path)
    }

    /// Parse policy JSON; `origin` is only used in error messages.
    pub fn parse(contents: &str, origin: &Path) -> Result<Self> {
        let policy: GuardPolicy =
            serde_json::from_str(contents).map_err(|source| GuardError::PolicyParse {
                path: origin.to_path_buf(),
                source,
            })?;
        policy.validate()?;
        Ok(policy)
    }

    fn validate(&self) -> Result<()> {
        let semantic = &self.semantic_review;
        if semantic.enabled {
            if semantic.timeout_sec == 0 {
                return Err(GuardError::PolicyInvalid(
                    "semanticReview.timeoutSec must be greater than 0".to_string(),
                ));
            }
            if semantic.max_findings == 0 {
                return Err(GuardError::PolicyInvalid(
                    "semanticReview.maxFindings must be greater than 0".to_string(),
                ));
            }
            if semantic.command.trim().is_empty() {
                return Err(GuardError::PolicyInvalid(
                    "semanticReview.command must not be empty".to_string(),
                ));
            }
        }
        if let Some(hours) = self.preflight.max_age_hours
            && !(hours.is_finite() && hours >= 0.0)
        {
            return Err(GuardError::PolicyInvalid(format!(
                "preflight.maxAgeHours must be a non-negative number, got {hours}"
            )));
        }
        if self.preflight.top == 0 {
            tracing::warn!("preflight.top is 0, every preflight shortlist will be empty");
        }
        if self.deterministic_checks.require_preflight_artifact && !self.preflight.required {
            tracing::warn!(
                "deterministicChecks.requirePreflightArtifact has no effect unless preflight.required is set"
            );
        }
        Ok(())
    }

    pub fn spec_root(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.spec_root)
    }

    pub fn schema_path(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.semantic_review.schema_path)
    }
}
