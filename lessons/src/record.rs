//! Lesson record domain types
//!
//! Canonical vocabulary for lesson levels, lifecycle status and the
//! metadata record that the index stores in place of full bodies.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Level
// ============================================================================

/// Abstraction level of a lesson, least to most generalized.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Case,
    Pattern,
    Principle,
}

impl Level {
    /// All levels in promotion order
    pub fn all() -> [Self; 3] {
        [Self::Case, Self::Pattern, Self::Principle]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Case => "case",
            Self::Pattern => "pattern",
            Self::Principle => "principle",
        }
    }

    /// Human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Case => "Case",
            Self::Pattern => "Pattern",
            Self::Principle => "Principle",
        }
    }

    /// Folder under the lessons root holding this level's bodies
    pub fn folder(&self) -> &'static str {
        match self {
            Self::Case => "cases",
            Self::Pattern => "patterns",
            Self::Principle => "principles",
        }
    }

    pub fn from_folder(folder: &str) -> Option<Self> {
        match folder.to_ascii_lowercase().as_str() {
            "cases" => Some(Self::Case),
            "patterns" => Some(Self::Pattern),
            "principles" => Some(Self::Principle),
            _ => None,
        }
    }

    /// Ranking priority (higher ranks first)
    pub fn priority(&self) -> u8 {
        match self {
            Self::Case => 0,
            Self::Pattern => 1,
            Self::Principle => 2,
        }
    }

    /// The only level this one may be promoted to
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Case => Some(Self::Pattern),
            Self::Pattern => Some(Self::Principle),
            Self::Principle => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "case" => Ok(Self::Case),
            "pattern" => Ok(Self::Pattern),
            "principle" => Ok(Self::Principle),
            other => Err(format!("unknown lesson level `{other}`")),
        }
    }
}

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of a lesson.
///
/// Moves forward only (`candidate → validated → canonical`); `retired` is
/// reachable from any status and is terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    Candidate,
    Validated,
    Canonical,
    Retired,
}

impl LessonStatus {
    pub fn all() -> [Self; 4] {
        [
            Self::Candidate,
            Self::Validated,
            Self::Canonical,
            Self::Retired,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Candidate => "candidate",
            Self::Validated => "validated",
            Self::Canonical => "canonical",
            Self::Retired => "retired",
        }
    }

    /// Position on the forward track; `None` for `retired`
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Candidate => Some(0),
            Self::Validated => Some(1),
            Self::Canonical => Some(2),
            Self::Retired => None,
        }
    }

    /// Whether this status counts as a validated application
    pub fn is_validated(&self) -> bool {
        matches!(self, Self::Validated | Self::Canonical)
    }
}

impl fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LessonStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "candidate" => Ok(Self::Candidate),
            "validated" => Ok(Self::Validated),
            "canonical" => Ok(Self::Canonical),
            "retired" => Ok(Self::Retired),
            other => Err(format!("unknown lesson status `{other}`")),
        }
    }
}

// ============================================================================
// Record
// ============================================================================

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;
pub const DEFAULT_SCORE: u8 = 3;

/// Why and when a lesson was retired.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Retirement {
    pub reason: String,
    pub retired_at: NaiveDate,
}

/// Lesson metadata as stored in the index.
///
/// The body text lives at `path` and is never needed for ranking.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LessonRecord {
    pub id: String,
    pub level: Level,
    pub status: LessonStatus,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub confidence: u8,
    pub transferability: u8,
    /// Provenance; append-only
    #[serde(default)]
    pub source_case_ids: Vec<String>,
    pub last_validated_at: NaiveDate,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    /// Body location, relative to the lessons root's parent
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retirement: Option<Retirement>,
}

impl LessonRecord {
    /// A freshly captured case: `case` / `candidate` with default scores.
    pub fn new_case(
        id: impl Into<String>,
        title: impl Into<String>,
        path: impl Into<String>,
        today: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            level: Level::Case,
            status: LessonStatus::Candidate,
            tags: BTreeSet::new(),
            confidence: DEFAULT_SCORE,
            transferability: DEFAULT_SCORE,
            source_case_ids: Vec::new(),
            last_validated_at: today,
            title: title.into(),
            summary: String::new(),
            path: path.into(),
            promoted_from: None,
            retirement: None,
        }
    }

    pub fn is_retired(&self) -> bool {
        self.status == LessonStatus::Retired
    }
}

/// Clamp a raw score into `1..=5`
pub fn clamp_score(value: i64) -> u8 {
    value.clamp(MIN_SCORE as i64, MAX_SCORE as i64) as u8
}

/// Lower-case slug of `[a-z0-9]` runs joined by `-`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c);
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "lesson".to_string()
    } else {
        slug
    }
}

/// Append ids to a provenance list, keeping first-seen order and dropping blanks and repeats
pub fn merge_provenance<'a>(
    existing: &'a [String],
    additions: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(existing.len());
    for id in existing.iter().map(String::as_str).chain(additions) {
        let id = id.trim();
        if !id.is_empty() && !merged.iter().any(|seen| seen == id) {
            merged.push(id.to_string());
        }
    }
    merged
}
