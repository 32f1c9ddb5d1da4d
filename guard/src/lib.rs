//! Workflow guard: deterministic checks plus advisory semantic review.
//!
//! ```text
//! policy ─┬─ checks::run_checks ───────────────┐
//!         └─ semantic::review (Reviewer trait) ─┴→ aggregate → GuardResult artifact
//! ```
//!
//! Deterministic findings always carry block authority. Semantic findings
//! block only when their severity is listed in `blockOnSeverity`, and only in
//! `block` mode.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod aggregate;
pub mod artifact;
pub mod checks;
pub mod error;
pub mod finding;
pub mod policy;
pub mod result;
pub mod runner;
pub mod semantic;

pub use aggregate::{GuardStatus, Mode, aggregate};
pub use checks::{CheckReport, run_checks};
pub use error::{GuardError, Result};
pub use finding::{Finding, FindingSource, FindingSummary, Severity};
pub use policy::{DeterministicChecks, GuardPolicy, PreflightPolicy, SemanticReviewPolicy};
pub use result::{GuardResult, SemanticResult, SemanticStatus};
pub use runner::{GuardRequest, GuardRun, GuardRunner};
pub use semantic::{
    CodexExecReviewer, ReviewError, ReviewOutput, ReviewRequest, ReviewSchema, Reviewer,
    SemanticOutcome, SemanticRecord,
};

/// Default policy location, relative to the repository root
pub const DEFAULT_POLICY_PATH: &str = "scripts/config/agent/agent_workflow_policy.json";
