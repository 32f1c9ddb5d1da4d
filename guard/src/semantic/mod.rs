//! Semantic review adapter
//!
//! Runs a [`Reviewer`] under a timeout, validates its JSON against the
//! declared schema and maps every outcome onto a [`SemanticResult`]. Failures
//! never escape: they become an `ERROR` sub-result plus exactly one
//! deterministic-lane finding.

mod changed_paths;
mod codex;
mod reviewer;

pub use changed_paths::detect_changed_paths;
pub use codex::{CODEX_ENGINE, CodexExecReviewer, build_prompt};
pub use reviewer::{ReviewError, ReviewFinding, ReviewOutput, ReviewRequest, Reviewer};

use chrono::{DateTime, Utc};
use jsonschema::{Draft, JSONSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GuardError, Result};
use crate::finding::{Finding, Severity, codes};
use crate::result::{SemanticResult, SemanticStatus};

/// Schema a reviewer response must satisfy, as installed at `semanticReview.schemaPath`.
pub const DEFAULT_REVIEW_SCHEMA: &str = r#"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "title": "Semantic review result",
  "type": "object",
  "additionalProperties": false,
  "required": ["summary", "findings"],
  "properties": {
    "summary": { "type": "string" },
    "findings": {
      "type": "array",
      "items": {
        "type": "object",
        "additionalProperties": false,
        "required": ["severity", "code", "message"],
        "properties": {
          "severity": { "type": "string", "enum": ["low", "medium", "high"] },
          "code": { "type": "string", "minLength": 1 },
          "message": { "type": "string" }
        }
      }
    }
  }
}
"#;

// ============================================================================
// Schema
// ============================================================================

/// Compiled Draft 7 schema for reviewer output
pub struct ReviewSchema {
    path: PathBuf,
    compiled: JSONSchema,
}

impl std::fmt::Debug for ReviewSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewSchema").field("path", &self.path).finish()
    }
}

impl ReviewSchema {
    /// Load and compile the schema file. A missing file is a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GuardError::SchemaMissing {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(GuardError::SchemaRead {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let value: Value = serde_json::from_str(&contents).map_err(|e| GuardError::SchemaInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::compile(&value, path)
    }

    /// Compile an in-memory schema; `origin` labels errors.
    pub fn compile(schema: &Value, origin: &Path) -> Result<Self> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema)
            .map_err(|e| GuardError::SchemaInvalid {
                path: origin.to_path_buf(),
                message: format!("Failed to compile schema: {e}"),
            })?;
        Ok(Self {
            path: origin.to_path_buf(),
            compiled,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate and deserialize a reviewer response.
    pub fn parse_output(&self, value: &Value) -> std::result::Result<ReviewOutput, ReviewError> {
        if let Err(errors) = self.compiled.validate(value) {
            let messages: Vec<String> = errors.map(|e| format!("{e} at {}", e.instance_path)).collect();
            return Err(ReviewError::SchemaViolation(messages));
        }
        serde_json::from_value(value.clone()).map_err(|e| ReviewError::InvalidOutput(e.to_string()))
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Contents of `logs/agent/guard/semantic_<stamp>.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticRecord {
    pub status: SemanticStatus,
    pub engine: String,
    pub model: Option<String>,
    pub summary: String,
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_count: Option<usize>,
    pub changed_paths: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Adapter output: the sub-result, the lane-crossing failure finding if any,
/// and the record to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticOutcome {
    pub result: SemanticResult,
    pub failure_finding: Option<Finding>,
    pub record: SemanticRecord,
}

/// Run a review bounded by `timeout`.
pub async fn review(
    reviewer: &dyn Reviewer,
    schema: &ReviewSchema,
    request: &ReviewRequest,
    timeout: Duration,
) -> SemanticOutcome {
    review_until(reviewer, schema, request, timeout, std::future::pending()).await
}

/// Run a review bounded by `timeout`, abandoning it when `cancel` completes first.
pub async fn review_until(
    reviewer: &dyn Reviewer,
    schema: &ReviewSchema,
    request: &ReviewRequest,
    timeout: Duration,
    cancel: impl Future<Output = ()>,
) -> SemanticOutcome {
    let invoked = tokio::select! {
        outcome = tokio::time::timeout(timeout, reviewer.invoke(request, timeout)) => match outcome {
            Ok(result) => result,
            Err(_) => Err(ReviewError::Timeout(timeout.as_secs())),
        },
        () = cancel => Err(ReviewError::Cancelled),
    };

    let parsed = invoked.and_then(|value| schema.parse_output(&value));
    let outcome = match parsed {
        Ok(output) => success(reviewer.engine(), request, output),
        Err(err) => failure(reviewer.engine(), request, &err),
    };
    tracing::info!(
        engine = reviewer.engine(),
        status = %outcome.result.status,
        findings = outcome.result.findings.len(),
        "Semantic review finished"
    );
    outcome
}

fn success(engine: &str, request: &ReviewRequest, output: ReviewOutput) -> SemanticOutcome {
    let reported = output.findings.len();
    let findings: Vec<Finding> = output
        .findings
        .into_iter()
        .take(request.max_findings)
        .map(|f| Finding::semantic(f.severity, f.code, f.message))
        .collect();
    if reported > findings.len() {
        tracing::warn!(
            reported,
            kept = findings.len(),
            "Reviewer returned more findings than maxFindings, excess dropped"
        );
    }
    let status = if findings.is_empty() {
        SemanticStatus::Pass
    } else {
        SemanticStatus::Warn
    };

    SemanticOutcome {
        result: SemanticResult {
            status,
            artifact_path: None,
            findings: findings.clone(),
            reported_count: Some(reported),
            error: None,
        },
        failure_finding: None,
        record: SemanticRecord {
            status,
            engine: engine.to_string(),
            model: request.model.clone(),
            summary: output.summary,
            findings,
            reported_count: Some(reported),
            changed_paths: request.changed_paths.clone(),
            generated_at: Utc::now(),
        },
    }
}

fn failure(engine: &str, request: &ReviewRequest, err: &ReviewError) -> SemanticOutcome {
    tracing::warn!(engine, error = %err, "Semantic review failed");
    let finding = match err {
        ReviewError::NotFound(command) => Finding::deterministic(
            Severity::Medium,
            codes::MISSING_SEMANTIC_REVIEWER,
            format!("Semantic reviewer not found: {command}"),
        ),
        other => Finding::deterministic(
            Severity::Medium,
            codes::SEMANTIC_RUN_FAILED,
            format!("Semantic review failed: {other}"),
        ),
    };

    SemanticOutcome {
        result: SemanticResult {
            status: SemanticStatus::Error,
            artifact_path: None,
            findings: Vec::new(),
            reported_count: None,
            error: Some(err.to_string()),
        },
        failure_finding: Some(finding),
        record: SemanticRecord {
            status: SemanticStatus::Error,
            engine: engine.to_string(),
            model: request.model.clone(),
            summary: err.to_string(),
            findings: Vec::new(),
            reported_count: None,
            changed_paths: request.changed_paths.clone(),
            generated_at: Utc::now(),
        },
    }
}
