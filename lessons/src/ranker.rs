//! Lesson relevance ranking
//!
//! ```text
//! score = |{ t ∈ tokens : t ⊂ any tag  ∨  t ⊂ lower(title) }|
//!       + |{ tag : len(tag) < MIN_TOKEN_LEN  ∧  tag ∈ words }|
//!
//! order = level priority ↓, score ↓, confidence ↓, transferability ↓,
//!         last_validated_at ↓, id ↑
//! ```
//!
//! Retired lessons and zero-score lessons are never returned.

use std::cmp::Ordering;

use crate::record::LessonRecord;
use crate::store::LessonIndex;
use crate::tokens::{MIN_TOKEN_LEN, TaskTokens};

/// A record paired with its relevance score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankedLesson<'a> {
    pub record: &'a LessonRecord,
    pub score: usize,
}

/// Relevance of one record to the task tokens.
pub fn relevance(record: &LessonRecord, tokens: &TaskTokens) -> usize {
    let title = record.title.to_lowercase();
    let tags: Vec<String> = record.tags.iter().map(|tag| tag.trim().to_lowercase()).collect();
    let token_hits = tokens
        .tokens()
        .iter()
        .filter(|t| title.contains(t.as_str()) || tags.iter().any(|tag| tag.contains(t.as_str())))
        .count();
    let short_tag_hits = tags
        .iter()
        .filter(|tag| !tag.is_empty() && tag.chars().count() < MIN_TOKEN_LEN && tokens.words().contains(tag.as_str()))
        .count();
    token_hits + short_tag_hits
}

fn compare(a: &RankedLesson<'_>, b: &RankedLesson<'_>) -> Ordering {
    b.record
        .level
        .priority()
        .cmp(&a.record.level.priority())
        .then_with(|| b.score.cmp(&a.score))
        .then_with(|| b.record.confidence.cmp(&a.record.confidence))
        .then_with(|| b.record.transferability.cmp(&a.record.transferability))
        .then_with(|| b.record.last_validated_at.cmp(&a.record.last_validated_at))
        .then_with(|| a.record.id.cmp(&b.record.id))
}

/// Rank every live record in `index` against `tokens`.
pub fn rank<'a>(index: &'a LessonIndex, tokens: &TaskTokens) -> Vec<RankedLesson<'a>> {
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut ranked: Vec<RankedLesson<'a>> = index
        .records()
        .filter(|record| !record.is_retired())
        .map(|record| RankedLesson {
            record,
            score: relevance(record, tokens),
        })
        .filter(|r| r.score > 0)
        .collect();
    ranked.sort_by(compare);
    tracing::debug!(candidates = index.len(), matched = ranked.len(), "Ranked lessons");
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LessonStatus, Level};
    use crate::tokens::extract_tokens;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn record(id: &str, level: Level, title: &str, tags: &[&str]) -> LessonRecord {
        let mut r = LessonRecord::new_case(
            id,
            title,
            format!("lessons/{}/{id}.md", level.folder()),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
        );
        r.level = level;
        r.tags = tags.iter().map(|t| t.to_string()).collect();
        r
    }

    fn ids(ranked: &[RankedLesson<'_>]) -> Vec<String> {
        ranked.iter().map(|r| r.record.id.clone()).collect()
    }

    #[test]
    fn test_relevance_counts_tags_and_title() {
        let r = record("p", Level::Pattern, "Rotate deploy keys", &["credentials", "ssh"]);
        let t = extract_tokens("rotate ssh credentials for the deploy box");
        // rotate, deploy (title), credentials (tag), ssh (short tag)
        assert_eq!(relevance(&r, &t), 4);
    }

    #[test]
    fn test_token_substring_of_tag_matches() {
        let r = record("p", Level::Pattern, "Unrelated", &["permissions"]);
        assert_eq!(relevance(&r, &extract_tokens("fix permission drift")), 1);
    }

    #[test]
    fn test_mixed_case_tags_match_lowercase_tokens() {
        let r = record("p", Level::Pattern, "Unrelated", &["Credentials", "SSH"]);
        assert_eq!(relevance(&r, &extract_tokens("rotate ssh credentials")), 2);
    }

    #[test]
    fn test_short_tag_requires_whole_word() {
        let r = record("c", Level::Case, "Unrelated", &["ssh"]);
        assert_eq!(relevance(&r, &extract_tokens("sshd config")), 0);
        assert_eq!(relevance(&r, &extract_tokens("ssh config")), 1);
    }

    #[test]
    fn test_level_priority_dominates_score() {
        let case = record("case-a", Level::Case, "Alpha beta gamma delta", &[]);
        let principle = record("principle-a", Level::Principle, "Alpha", &[]);
        let index = LessonIndex::from_records([case, principle]).expect("index");
        let ranked = rank(&index, &extract_tokens("alpha beta gamma delta"));
        assert_eq!(ids(&ranked), vec!["principle-a", "case-a"]);
    }

    #[test]
    fn test_tie_breaks_down_to_id() {
        let mut a = record("b-id", Level::Pattern, "Alpha", &[]);
        let mut b = record("a-id", Level::Pattern, "Alpha", &[]);
        let mut c = record("c-id", Level::Pattern, "Alpha", &[]);
        a.confidence = 4;
        b.confidence = 4;
        c.confidence = 4;
        c.last_validated_at = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap_or_default();
        let index = LessonIndex::from_records([a, b, c]).expect("index");
        let ranked = rank(&index, &extract_tokens("alpha"));
        assert_eq!(ids(&ranked), vec!["c-id", "a-id", "b-id"]);
    }

    #[test]
    fn test_retired_and_zero_score_excluded() {
        let mut retired = record("retired", Level::Principle, "Alpha", &[]);
        retired.status = LessonStatus::Retired;
        let miss = record("miss", Level::Principle, "Omega", &[]);
        let hit = record("hit", Level::Case, "Alpha", &[]);
        let index = LessonIndex::from_records([retired, miss, hit]).expect("index");
        assert_eq!(ids(&rank(&index, &extract_tokens("alpha"))), vec!["hit"]);
    }

    #[test]
    fn test_empty_task_ranks_nothing() {
        let index = LessonIndex::from_records([record("a", Level::Case, "Alpha", &[])]).expect("index");
        assert!(rank(&index, &extract_tokens("  ")).is_empty());
    }

    #[test]
    fn test_rank_is_deterministic() {
        let index = LessonIndex::from_records([
            record("x", Level::Case, "Alpha", &["beta"]),
            record("y", Level::Pattern, "Beta", &[]),
            record("z", Level::Case, "Alpha beta", &[]),
        ])
        .expect("index");
        let tokens = extract_tokens("alpha beta");
        assert_eq!(ids(&rank(&index, &tokens)), ids(&rank(&index, &tokens)));
    }
}
