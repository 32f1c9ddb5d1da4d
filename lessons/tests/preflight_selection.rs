#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::NaiveDate;
use lessonkit_lessons::{
    LessonIndex, LessonRecord, LessonSource, Level, MemoryLessonStore, SelectionLimits,
    extract_tokens, match_store, rank, run_preflight, select,
};
use pretty_assertions::assert_eq;
use std::path::Path;
use tempfile::TempDir;

fn lesson(id: &str, level: Level, title: &str, confidence: u8, validated: (i32, u32, u32)) -> LessonRecord {
    let (y, m, d) = validated;
    let mut r = LessonRecord::new_case(
        id,
        title,
        format!("lessons/{}/{id}.md", level.folder()),
        NaiveDate::from_ymd_opt(y, m, d).unwrap(),
    );
    r.level = level;
    r.confidence = confidence;
    r.tags = ["ssh".to_string()].into_iter().collect();
    r
}

fn ssh_lessons() -> Vec<LessonRecord> {
    let mut principle = lesson("principle-ssh-identity", Level::Principle, "Verify host identity", 5, (2025, 6, 1));
    principle.transferability = 5;
    vec![
        lesson("case-ssh-01", Level::Case, "Config drift on laptop", 3, (2025, 2, 1)),
        principle,
        lesson("case-ssh-02", Level::Case, "Agent forwarding gone", 3, (2025, 1, 1)),
        lesson("pattern-ssh-keys", Level::Pattern, "Key file permissions", 3, (2025, 3, 1)),
    ]
}

#[test]
fn principle_and_pattern_before_cases() {
    let index = LessonIndex::from_records(ssh_lessons()).unwrap();
    let tokens = extract_tokens("fix ssh alias and key ACL mismatch");
    let ranked = rank(&index, &tokens);
    let shortlist: Vec<&str> = select(&ranked, SelectionLimits { top: 5, max_cases: 2 })
        .iter()
        .map(|r| r.record.id.as_str())
        .collect();

    assert_eq!(
        shortlist,
        vec!["principle-ssh-identity", "pattern-ssh-keys", "case-ssh-01", "case-ssh-02"]
    );
}

#[test]
fn store_shortlist_reports_levels() {
    let store = MemoryLessonStore::with_records(ssh_lessons()).unwrap();
    let matches = match_store(
        &store,
        &extract_tokens("fix ssh alias and key ACL mismatch"),
        SelectionLimits::default(),
    )
    .unwrap();

    let levels: Vec<Option<Level>> = matches.iter().map(|m| m.level).collect();
    assert_eq!(
        levels,
        vec![Some(Level::Principle), Some(Level::Pattern), Some(Level::Case), Some(Level::Case)]
    );
    assert!(matches.iter().all(|m| m.score >= 1));
}

#[test]
fn unrelated_task_matches_nothing() {
    let store = MemoryLessonStore::with_records(ssh_lessons()).unwrap();
    let matches = match_store(
        &store,
        &extract_tokens("update billing invoices"),
        SelectionLimits::default(),
    )
    .unwrap();
    assert!(matches.is_empty());
}

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

#[test]
fn preflight_over_lessons_root_writes_artifact() {
    let repo = TempDir::new().unwrap();
    let root = repo.path().join("lessons");
    write(
        &root,
        "principles/verify-identity.md",
        "---\nid: principle-verify-identity\ntags: [ssh]\nconfidence: 5\n---\n# Verify host identity\n",
    );
    write(&root, "cases/alias.md", "---\ntags: [ssh]\n---\n# Alias hides host\n");
    write(&root, "cases/other.md", "# Billing export\n");

    let source = LessonSource::detect(&root);
    let artifact = run_preflight("fix ssh alias", &source, SelectionLimits::default()).unwrap();
    let ids: Vec<&str> = artifact.matches.iter().map(|m| m.label()).collect();
    assert_eq!(ids, vec!["principle-verify-identity", "alias"]);
    assert_eq!(artifact.match_count, 2);

    let path = artifact.write(repo.path()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(value["task"], "fix ssh alias");
    assert_eq!(value["matchCount"], 2);
    assert_eq!(value["matches"][0]["id"], "principle-verify-identity");
}

#[test]
fn empty_shortlist_still_writes_artifact() {
    let repo = TempDir::new().unwrap();
    let source = LessonSource::detect(&repo.path().join("lessons"));
    let artifact = run_preflight("   ", &source, SelectionLimits::default()).unwrap();
    assert_eq!(artifact.match_count, 0);
    assert!(artifact.is_empty());
}
