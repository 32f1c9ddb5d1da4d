//! Preflight shortlist selection and artifact
//!
//! Principles and patterns fill the shortlist first; at most `max_cases`
//! case-level lessons take the remaining slots. Zero matches is a valid
//! outcome.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LessonError, Result};
use crate::io::{artifact_stamp, write_once};
use crate::ranker::{RankedLesson, rank};
use crate::record::Level;
use crate::store::{FsLessonStore, LessonStore};
use crate::tokens::{TaskTokens, extract_tokens};

/// Default shortlist cap
pub const DEFAULT_TOP: usize = 5;

/// Default number of case-level entries allowed in the shortlist
pub const DEFAULT_MAX_CASES: usize = 2;

/// Artifact file name prefix
pub const ARTIFACT_PREFIX: &str = "preflight";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionLimits {
    pub top: usize,
    pub max_cases: usize,
}

impl Default for SelectionLimits {
    fn default() -> Self {
        Self {
            top: DEFAULT_TOP,
            max_cases: DEFAULT_MAX_CASES,
        }
    }
}

/// Apply the composition rule to ranked output.
pub fn select<'a>(ranked: &[RankedLesson<'a>], limits: SelectionLimits) -> Vec<RankedLesson<'a>> {
    let mut shortlist: Vec<RankedLesson<'a>> = ranked
        .iter()
        .filter(|r| r.record.level != Level::Case)
        .take(limits.top)
        .copied()
        .collect();

    let case_slots = limits.top.saturating_sub(shortlist.len()).min(limits.max_cases);
    shortlist.extend(
        ranked
            .iter()
            .filter(|r| r.record.level == Level::Case)
            .take(case_slots)
            .copied(),
    );
    shortlist
}

// ============================================================================
// Artifact
// ============================================================================

/// One shortlist entry. Structured lessons carry `id`, heading files carry `heading`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreflightMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    pub score: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
}

impl PreflightMatch {
    /// Label shown to operators
    pub fn label(&self) -> &str {
        self.id
            .as_deref()
            .or(self.heading.as_deref())
            .unwrap_or_default()
    }
}

impl From<&RankedLesson<'_>> for PreflightMatch {
    fn from(ranked: &RankedLesson<'_>) -> Self {
        Self {
            id: Some(ranked.record.id.clone()),
            heading: None,
            score: ranked.score,
            level: Some(ranked.record.level),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightArtifact {
    pub task: String,
    pub lessons_source: String,
    pub match_count: usize,
    pub matches: Vec<PreflightMatch>,
    pub generated_at: DateTime<Utc>,
}

impl PreflightArtifact {
    pub fn new(task: impl Into<String>, lessons_source: impl Into<String>, matches: Vec<PreflightMatch>) -> Self {
        Self {
            task: task.into(),
            lessons_source: lessons_source.into(),
            match_count: matches.len(),
            matches,
            generated_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Write the artifact under `<repo_root>/logs/agent/preflight/`. Never overwrites.
    pub fn write(&self, repo_root: &Path) -> Result<PathBuf> {
        let dir = crate::preflight_dir(repo_root);
        let json = serde_json::to_string_pretty(self)
            .map_err(|source| LessonError::JsonSerialize { source })?;
        let path = write_once(&dir, ARTIFACT_PREFIX, &artifact_stamp(Local::now()), json.as_bytes())
            .map_err(|source| LessonError::FileWrite {
                path: dir.clone(),
                source,
            })?;
        tracing::info!(path = %path.display(), matches = self.match_count, "Preflight artifact written");
        Ok(path)
    }
}

// ============================================================================
// Sources
// ============================================================================

/// Where preflight candidates come from
#[derive(Debug, Clone)]
pub enum LessonSource {
    /// A lessons root with `cases/`, `patterns/`, `principles/`
    Structured(FsLessonStore),
    /// A flat markdown file whose `## ` headings are candidates
    Headings(PathBuf),
}

impl LessonSource {
    /// Directories and extension-less paths are lessons roots; anything else is a headings file.
    pub fn detect(path: &Path) -> Self {
        if path.is_dir() || (!path.exists() && path.extension().is_none()) {
            Self::Structured(FsLessonStore::new(path))
        } else {
            Self::Headings(path.to_path_buf())
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Structured(store) => store.describe(),
            Self::Headings(path) => path.display().to_string(),
        }
    }
}

/// Shortlist from any lesson store.
pub fn match_store(
    store: &dyn LessonStore,
    tokens: &TaskTokens,
    limits: SelectionLimits,
) -> Result<Vec<PreflightMatch>> {
    let index = store.load_index()?;
    let ranked = rank(&index, tokens);
    Ok(select(&ranked, limits).iter().map(PreflightMatch::from).collect())
}

/// Shortlist from `## ` headings. A missing file has no headings.
pub fn match_headings(path: &Path, tokens: &TaskTokens, top: usize) -> Result<Vec<PreflightMatch>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Lessons file not found");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(LessonError::FileRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut scored: Vec<PreflightMatch> = text
        .lines()
        .filter_map(|line| line.strip_prefix("## "))
        .map(str::trim)
        .filter_map(|heading| {
            let lowered = heading.to_lowercase();
            let score = tokens
                .tokens()
                .iter()
                .filter(|t| lowered.contains(t.as_str()))
                .count();
            (score > 0).then(|| PreflightMatch {
                id: None,
                heading: Some(heading.to_string()),
                score,
                level: None,
            })
        })
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.heading.cmp(&b.heading)));
    scored.truncate(top);
    Ok(scored)
}

/// Tokenize the task, select from `source` and build the artifact.
pub fn run_preflight(task: &str, source: &LessonSource, limits: SelectionLimits) -> Result<PreflightArtifact> {
    let tokens = extract_tokens(task);
    let matches = match source {
        LessonSource::Structured(store) => match_store(store, &tokens, limits)?,
        LessonSource::Headings(path) => match_headings(path, &tokens, limits.top)?,
    };
    tracing::debug!(source = %source.describe(), matches = matches.len(), "Preflight selection done");
    Ok(PreflightArtifact::new(task, source.describe(), matches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LessonRecord;
    use crate::store::LessonIndex;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(id: &str, level: Level) -> LessonRecord {
        let mut r = LessonRecord::new_case(
            id,
            "Alpha",
            format!("lessons/{}/{id}.md", level.folder()),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
        );
        r.level = level;
        r
    }

    fn selected_ids(index: &LessonIndex, limits: SelectionLimits) -> Vec<String> {
        let ranked = rank(index, &extract_tokens("alpha"));
        select(&ranked, limits)
            .iter()
            .map(|r| r.record.id.clone())
            .collect()
    }

    #[test]
    fn test_cases_capped_at_two() {
        let index = LessonIndex::from_records([
            record("p1", Level::Pattern),
            record("c1", Level::Case),
            record("c2", Level::Case),
            record("c3", Level::Case),
            record("c4", Level::Case),
        ])
        .expect("index");
        assert_eq!(selected_ids(&index, SelectionLimits::default()), vec!["p1", "c1", "c2"]);
    }

    #[test]
    fn test_shortlist_never_exceeds_top() {
        let records: Vec<LessonRecord> = (0..8)
            .map(|i| record(&format!("p{i}"), Level::Pattern))
            .chain((0..4).map(|i| record(&format!("c{i}"), Level::Case)))
            .collect();
        let index = LessonIndex::from_records(records).expect("index");
        for top in 0..10 {
            let limits = SelectionLimits { top, max_cases: 2 };
            assert!(selected_ids(&index, limits).len() <= top);
        }
        let full = selected_ids(&index, SelectionLimits { top: 5, max_cases: 2 });
        assert!(full.iter().all(|id| id.starts_with('p')));
    }

    #[test]
    fn test_case_slots_limited_by_remaining_room() {
        let index = LessonIndex::from_records([
            record("p1", Level::Pattern),
            record("p2", Level::Principle),
            record("c1", Level::Case),
            record("c2", Level::Case),
        ])
        .expect("index");
        let limits = SelectionLimits { top: 3, max_cases: 2 };
        assert_eq!(selected_ids(&index, limits), vec!["p2", "p1", "c1"]);
    }

    #[test]
    fn test_headings_file_scoring() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("LESSONS.md");
        std::fs::write(
            &path,
            "# Lessons\n## Windows key permissions\n## Alias expansion pitfalls\n## Unrelated\n## Key permissions on macOS\n",
        )
        .expect("write");

        let tokens = extract_tokens("fix key permissions on windows");
        let matches = match_headings(&path, &tokens, 5).expect("headings");
        let labels: Vec<&str> = matches.iter().map(PreflightMatch::label).collect();
        assert_eq!(labels, vec!["Windows key permissions", "Key permissions on macOS"]);
        assert_eq!(matches[0].score, 2);
        assert!(matches.iter().all(|m| m.id.is_none() && m.level.is_none()));
    }

    #[test]
    fn test_missing_headings_file_is_empty() {
        let dir = TempDir::new().expect("tempdir");
        let source = LessonSource::detect(&dir.path().join("LESSONS.md"));
        assert!(matches!(source, LessonSource::Headings(_)));
        let artifact = run_preflight("anything here", &source, SelectionLimits::default()).expect("run");
        assert_eq!(artifact.match_count, 0);
    }

    #[test]
    fn test_artifact_serializes_camel_case() {
        let artifact = PreflightArtifact::new(
            "task",
            "lessons",
            vec![PreflightMatch {
                id: Some("p1".to_string()),
                heading: None,
                score: 2,
                level: Some(Level::Pattern),
            }],
        );
        let value = serde_json::to_value(&artifact).expect("json");
        assert_eq!(value["lessonsSource"], "lessons");
        assert_eq!(value["matchCount"], 1);
        assert_eq!(value["matches"][0]["level"], "pattern");
        assert!(value["matches"][0].get("heading").is_none());
    }

    #[test]
    fn test_artifact_write_is_write_once() {
        let dir = TempDir::new().expect("tempdir");
        let artifact = PreflightArtifact::new("task", "lessons", Vec::new());
        let first = artifact.write(dir.path()).expect("first");
        let second = artifact.write(dir.path()).expect("second");
        assert_ne!(first, second);
        assert!(first.starts_with(dir.path().join("logs/agent/preflight")));
    }
}
