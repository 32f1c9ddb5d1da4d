//! Lesson lifecycle: promotion across levels, retirement, status advance
//!
//! Provenance (`source_case_ids`) is append-only. A promotion creates a new
//! record at the next level with a back-link to its source; it never edits
//! or removes the source. Every unmet criterion is a named rejection.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::error::LessonError;
use crate::record::{
    DEFAULT_SCORE, LessonRecord, LessonStatus, Level, Retirement, merge_provenance, slugify,
};
use crate::store::LessonStore;

/// Version tag of the built-in threshold table
pub const PROMOTION_POLICY_VERSION: &str = "promotion-policy@1";

/// Tag added to every promoted lesson
pub const PROMOTED_TAG: &str = "promoted";

// ============================================================================
// Policy
// ============================================================================

/// Named, versioned promotion thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionPolicy {
    pub version: String,
    /// Distinct source case ids required for case → pattern
    pub min_cases_for_pattern: usize,
    /// Distinct provenance chains required for pattern → principle
    pub min_patterns_for_principle: usize,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            version: PROMOTION_POLICY_VERSION.to_string(),
            min_cases_for_pattern: 2,
            min_patterns_for_principle: 3,
        }
    }
}

impl PromotionPolicy {
    fn threshold(&self, criterion: Criterion) -> usize {
        match criterion {
            Criterion::MinCasesForPattern => self.min_cases_for_pattern,
            Criterion::MinPatternsForPrinciple => self.min_patterns_for_principle,
        }
    }
}

/// A promotion threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    MinCasesForPattern,
    MinPatternsForPrinciple,
}

impl Criterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MinCasesForPattern => "min_cases_for_pattern",
            Self::MinPatternsForPrinciple => "min_patterns_for_principle",
        }
    }

    fn for_target(level: Level) -> Option<Self> {
        match level {
            Level::Pattern => Some(Self::MinCasesForPattern),
            Level::Principle => Some(Self::MinPatternsForPrinciple),
            Level::Case => None,
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum PromotionError {
    #[error("Lesson not found: {0}")]
    LessonNotFound(String),

    #[error("Invalid transition: {from} can only be promoted to the next level, not {to}")]
    InvalidTransition { from: Level, to: Level },

    #[error("Lesson {0} is retired and cannot be promoted")]
    SourceRetired(String),

    #[error(
        "Promotion blocked: {criterion} ({policy}) requires at least {required} distinct source case ids, found {actual}"
    )]
    CriterionUnmet {
        criterion: Criterion,
        policy: String,
        required: usize,
        actual: usize,
    },

    #[error("Promotion blocked: source pattern {id} is {status}, principle promotion requires validated or canonical")]
    SourceNotValidated { id: String, status: LessonStatus },

    #[error("Target lesson already exists: {id}")]
    TargetExists { id: String },

    #[error("Target lesson {id} is retired and cannot be replaced")]
    TargetRetired { id: String },

    #[error("Retirement reason must not be empty")]
    EmptyRetirementReason,

    #[error("Lesson {0} is already retired")]
    AlreadyRetired(String),

    #[error("Invalid status transition for {id}: {from} -> {to}")]
    InvalidStatusTransition {
        id: String,
        from: LessonStatus,
        to: LessonStatus,
    },

    #[error(transparent)]
    Store(#[from] LessonError),
}

pub type Result<T> = std::result::Result<T, PromotionError>;

// ============================================================================
// Engine
// ============================================================================

/// Inputs to a single promotion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionRequest {
    pub source_id: String,
    pub target_level: Level,
    pub new_source_case_ids: Vec<String>,
    pub title: Option<String>,
    pub new_id: Option<String>,
    /// Overwrite an existing target promoted from the same source
    pub force: bool,
}

impl PromotionRequest {
    pub fn new(source_id: impl Into<String>, target_level: Level) -> Self {
        Self {
            source_id: source_id.into(),
            target_level,
            new_source_case_ids: Vec::new(),
            title: None,
            new_id: None,
            force: false,
        }
    }

    pub fn with_case_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.new_source_case_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_new_id(mut self, id: impl Into<String>) -> Self {
        self.new_id = Some(id.into());
        self
    }

    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PromotionEngine {
    policy: PromotionPolicy,
    today: NaiveDate,
}

impl PromotionEngine {
    pub fn new(policy: PromotionPolicy) -> Self {
        Self::with_today(policy, Local::now().date_naive())
    }

    /// Engine with a fixed date for `last_validated_at` and retirement stamps
    pub fn with_today(policy: PromotionPolicy, today: NaiveDate) -> Self {
        Self { policy, today }
    }

    pub fn policy(&self) -> &PromotionPolicy {
        &self.policy
    }

    /// Promote `request.source_id` one level up and persist the new record.
    pub fn promote(&self, store: &dyn LessonStore, request: &PromotionRequest) -> Result<LessonRecord> {
        let mut index = store.load_index()?;
        let source = index
            .get(&request.source_id)
            .ok_or_else(|| PromotionError::LessonNotFound(request.source_id.clone()))?
            .clone();

        if source.is_retired() {
            return Err(PromotionError::SourceRetired(source.id));
        }
        let Some(criterion) = Criterion::for_target(request.target_level)
            .filter(|_| source.level.next() == Some(request.target_level))
        else {
            return Err(PromotionError::InvalidTransition {
                from: source.level,
                to: request.target_level,
            });
        };

        let source_self = (source.level == Level::Case).then_some(source.id.as_str());
        let provenance = merge_provenance(
            &source.source_case_ids,
            source_self
                .into_iter()
                .chain(request.new_source_case_ids.iter().map(String::as_str)),
        );

        let required = self.policy.threshold(criterion);
        if provenance.len() < required {
            return Err(PromotionError::CriterionUnmet {
                criterion,
                policy: self.policy.version.clone(),
                required,
                actual: provenance.len(),
            });
        }
        if request.target_level == Level::Principle && !source.status.is_validated() {
            return Err(PromotionError::SourceNotValidated {
                id: source.id,
                status: source.status,
            });
        }

        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} from {}", request.target_level.display_name(), source.id));
        let new_id = request
            .new_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-{}", request.target_level, slugify(&title)));

        let mut provenance = provenance;
        if let Some(existing) = index.get(&new_id) {
            if existing.is_retired() {
                return Err(PromotionError::TargetRetired { id: new_id });
            }
            if !request.force || existing.promoted_from.as_deref() != Some(source.id.as_str()) {
                return Err(PromotionError::TargetExists { id: new_id });
            }
            provenance = merge_provenance(&existing.source_case_ids, provenance.iter().map(String::as_str));
        }

        let mut tags = source.tags.clone();
        tags.insert(PROMOTED_TAG.to_string());

        let record = LessonRecord {
            id: new_id.clone(),
            level: request.target_level,
            status: match request.target_level {
                Level::Principle => LessonStatus::Canonical,
                _ => LessonStatus::Validated,
            },
            tags,
            confidence: source.confidence.max(DEFAULT_SCORE),
            transferability: source.transferability.max(DEFAULT_SCORE),
            source_case_ids: provenance,
            last_validated_at: self.today,
            title: title.clone(),
            summary: format!("Promoted from {} with structured provenance.", source.id),
            path: store.body_path(request.target_level, &new_id),
            promoted_from: Some(source.id.clone()),
            retirement: None,
        };

        let body = promoted_body(&record, &source.id);
        store
            .write_lesson(&record, &body, request.force)
            .map_err(|e| match e {
                LessonError::AlreadyExists { .. } => PromotionError::TargetExists { id: new_id.clone() },
                other => PromotionError::Store(other),
            })?;
        index.upsert(record.clone());
        store.replace_index(&index)?;

        tracing::info!(
            source = %source.id,
            target = %record.id,
            level = %record.level,
            provenance = record.source_case_ids.len(),
            "Lesson promoted"
        );
        Ok(record)
    }

    /// Retire a lesson, keeping the record and its provenance.
    pub fn retire(&self, store: &dyn LessonStore, id: &str, reason: &str) -> Result<LessonRecord> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PromotionError::EmptyRetirementReason);
        }
        let mut index = store.load_index()?;
        let mut record = index
            .get(id)
            .ok_or_else(|| PromotionError::LessonNotFound(id.to_string()))?
            .clone();
        if record.is_retired() {
            return Err(PromotionError::AlreadyRetired(record.id));
        }

        let body = store.read_body(&record)?;
        record.status = LessonStatus::Retired;
        record.retirement = Some(Retirement {
            reason: reason.to_string(),
            retired_at: self.today,
        });
        store.write_lesson(&record, &body, true)?;
        index.upsert(record.clone());
        store.replace_index(&index)?;

        tracing::info!(id = %record.id, reason, "Lesson retired");
        Ok(record)
    }

    /// Move a lesson forward on `candidate → validated → canonical`.
    pub fn advance_status(&self, store: &dyn LessonStore, id: &str, to: LessonStatus) -> Result<LessonRecord> {
        let mut index = store.load_index()?;
        let mut record = index
            .get(id)
            .ok_or_else(|| PromotionError::LessonNotFound(id.to_string()))?
            .clone();

        let forward = matches!(
            (record.status.rank(), to.rank()),
            (Some(from), Some(next)) if next > from
        );
        if !forward {
            return Err(PromotionError::InvalidStatusTransition {
                id: record.id,
                from: record.status,
                to,
            });
        }

        let body = store.read_body(&record)?;
        record.status = to;
        record.last_validated_at = self.today;
        store.write_lesson(&record, &body, true)?;
        index.upsert(record.clone());
        store.replace_index(&index)?;

        tracing::info!(id = %record.id, status = %to, "Lesson status advanced");
        Ok(record)
    }
}

fn promoted_body(record: &LessonRecord, source_id: &str) -> String {
    format!(
        "# {title}\n\n## Context\n\nPromoted from `{source_id}`.\n\n## Guidance\n\nReplace this section with reusable guidance.\n\n## Evidence\n\nSource case IDs: {evidence}\n",
        title = record.title,
        evidence = record.source_case_ids.join(", "),
    )
}
