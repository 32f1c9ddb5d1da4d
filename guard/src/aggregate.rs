//! Guard status aggregation
//!
//! ```text
//! PASS  ⇔ no deterministic findings ∧ no semantic findings
//! BLOCK ⇔ mode = block ∧ (∃ deterministic high ∨ ∃ semantic severity ∈ blockOnSeverity)
//! WARN  otherwise
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::finding::{Finding, Severity};
use crate::result::SemanticResult;

/// Whether the guard may escalate to BLOCK
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Warn,
    Block,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warn => "warn",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "block" => Ok(Self::Block),
            other => Err(format!("unknown guard mode `{other}` (expected warn or block)")),
        }
    }
}

/// Ordered PASS < WARN < BLOCK
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GuardStatus {
    Pass,
    Warn,
    Block,
}

impl GuardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Warn => "WARN",
            Self::Block => "BLOCK",
        }
    }
}

impl fmt::Display for GuardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merge both lanes into one status.
pub fn aggregate(
    deterministic: &[Finding],
    semantic: &SemanticResult,
    mode: Mode,
    block_on_severity: &BTreeSet<Severity>,
) -> GuardStatus {
    if deterministic.is_empty() && semantic.findings.is_empty() {
        return GuardStatus::Pass;
    }

    let deterministic_block = deterministic.iter().any(|f| f.severity == Severity::High);
    let semantic_block = semantic
        .findings
        .iter()
        .any(|f| block_on_severity.contains(&f.severity));

    if mode == Mode::Block && (deterministic_block || semantic_block) {
        GuardStatus::Block
    } else {
        GuardStatus::Warn
    }
}
