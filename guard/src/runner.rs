//! One guard run, end to end
//!
//! Configuration (policy, schema) is loaded before any check runs, so a
//! config error never leaves a partial artifact behind.

use chrono::Utc;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::aggregate::{Mode, aggregate};
use crate::artifact::{write_guard_result, write_semantic_record};
use crate::checks::run_checks;
use crate::error::Result;
use crate::finding::FindingSummary;
use crate::policy::GuardPolicy;
use crate::result::{GuardResult, SemanticResult};
use crate::semantic::{
    CodexExecReviewer, ReviewRequest, ReviewSchema, Reviewer, detect_changed_paths, review_until,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardRequest {
    pub task: String,
    pub mode: Mode,
    pub repo_root: PathBuf,
    /// Relative paths resolve against `repo_root`
    pub policy_path: PathBuf,
    /// `None` asks git
    pub changed_paths: Option<Vec<String>>,
    pub skip_semantic: bool,
}

impl GuardRequest {
    pub fn new(task: impl Into<String>, repo_root: impl Into<PathBuf>) -> Self {
        Self {
            task: task.into(),
            mode: Mode::Warn,
            repo_root: repo_root.into(),
            policy_path: PathBuf::from(crate::DEFAULT_POLICY_PATH),
            changed_paths: None,
            skip_semantic: false,
        }
    }

    fn resolved_policy_path(&self) -> PathBuf {
        if self.policy_path.is_absolute() {
            self.policy_path.clone()
        } else {
            self.repo_root.join(&self.policy_path)
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardRun {
    pub result: GuardResult,
    pub artifact_path: PathBuf,
}

/// Runs guard requests. Uses `codex exec` unless a reviewer is injected.
#[derive(Default)]
pub struct GuardRunner {
    reviewer: Option<Box<dyn Reviewer>>,
}

impl GuardRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reviewer(reviewer: Box<dyn Reviewer>) -> Self {
        Self {
            reviewer: Some(reviewer),
        }
    }

    pub async fn run(&self, request: &GuardRequest) -> Result<GuardRun> {
        self.run_until(request, std::future::pending()).await
    }

    /// Run, abandoning the semantic review (as `ERROR`) if `cancel` completes first.
    pub async fn run_until(&self, request: &GuardRequest, cancel: impl Future<Output = ()>) -> Result<GuardRun> {
        let repo_root = request.repo_root.as_path();
        let policy = GuardPolicy::load(&request.resolved_policy_path())?;
        let semantic_enabled = policy.semantic_review.enabled && !request.skip_semantic;
        let schema = if semantic_enabled {
            Some(ReviewSchema::load(&policy.schema_path(repo_root))?)
        } else {
            None
        };

        let report = run_checks(repo_root, &policy, SystemTime::now())?;
        let mut deterministic = report.findings;

        let semantic = match &schema {
            Some(schema) => {
                let (semantic, failure) = self.semantic_lane(request, &policy, schema, cancel).await?;
                deterministic.extend(failure);
                semantic
            }
            None => {
                tracing::debug!(skip_flag = request.skip_semantic, "Semantic review skipped");
                SemanticResult::skipped()
            }
        };

        let status = aggregate(
            &deterministic,
            &semantic,
            request.mode,
            &policy.semantic_review.block_on_severity,
        );
        let result = GuardResult {
            status,
            mode: request.mode,
            task: request.task.clone(),
            deterministic_summary: FindingSummary::from_findings(&deterministic),
            deterministic_findings: deterministic,
            semantic,
            generated_at: Utc::now(),
        };
        let artifact_path = write_guard_result(repo_root, &result)?;

        tracing::info!(
            status = %result.status,
            mode = %result.mode,
            deterministic = result.deterministic_summary.total,
            semantic = result.semantic.findings.len(),
            artifact = %artifact_path.display(),
            "Guard run complete"
        );
        Ok(GuardRun {
            result,
            artifact_path,
        })
    }

    async fn semantic_lane(
        &self,
        request: &GuardRequest,
        policy: &GuardPolicy,
        schema: &ReviewSchema,
        cancel: impl Future<Output = ()>,
    ) -> Result<(SemanticResult, Option<crate::finding::Finding>)> {
        let repo_root = request.repo_root.as_path();
        let changed_paths = match &request.changed_paths {
            Some(paths) if !paths.is_empty() => paths.clone(),
            _ => detect_changed_paths(repo_root).await,
        };
        let settings = &policy.semantic_review;
        let review_request = ReviewRequest {
            task: request.task.clone(),
            changed_paths,
            model: settings.model().map(str::to_string),
            max_findings: settings.max_findings,
            schema_path: schema.path().to_path_buf(),
            repo_root: repo_root.to_path_buf(),
        };

        let default_reviewer;
        let reviewer: &dyn Reviewer = match &self.reviewer {
            Some(reviewer) => reviewer.as_ref(),
            None => {
                default_reviewer = CodexExecReviewer::new(settings.command.clone());
                &default_reviewer
            }
        };

        let timeout = Duration::from_secs(settings.timeout_sec);
        let outcome = review_until(reviewer, schema, &review_request, timeout, cancel).await;
        let record_path = write_semantic_record(repo_root, &outcome.record)?;

        let mut semantic = outcome.result;
        semantic.artifact_path = Some(display_path(repo_root, &record_path));
        Ok((semantic, outcome.failure_finding))
    }
}

/// Repo-relative when possible
fn display_path(repo_root: &Path, path: &Path) -> String {
    path.strip_prefix(repo_root).unwrap_or(path).display().to_string()
}
