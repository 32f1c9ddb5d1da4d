//! Deterministic repository checks
//!
//! Every predicate runs on every invocation; there is no early exit. Only
//! local filesystem metadata is read. "Not found" is what the predicates
//! look for; any other filesystem error aborts the run.

use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;
use wildmatch::WildMatchPattern;

use crate::error::{GuardError, Result};
use crate::finding::{Finding, FindingSummary, Severity, codes};
use crate::policy::GuardPolicy;

type ArtifactPattern = WildMatchPattern<'*', '?'>;

/// Findings plus their summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub findings: Vec<Finding>,
    pub summary: FindingSummary,
}

/// Evaluate all deterministic predicates against `repo_root`.
pub fn run_checks(repo_root: &Path, policy: &GuardPolicy, now: SystemTime) -> Result<CheckReport> {
    let mut findings = Vec::new();
    check_required_docs(repo_root, policy, &mut findings)?;
    check_spec_root(repo_root, policy, &mut findings)?;
    check_preflight_artifact(repo_root, policy, now, &mut findings)?;

    let summary = FindingSummary::from_findings(&findings);
    tracing::debug!(
        high = summary.high,
        medium = summary.medium,
        total = summary.total,
        "Deterministic checks complete"
    );
    Ok(CheckReport { findings, summary })
}

/// `Ok(None)` when the path does not exist
fn metadata(path: &Path) -> Result<Option<std::fs::Metadata>> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(GuardError::FileSystem {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn check_required_docs(repo_root: &Path, policy: &GuardPolicy, findings: &mut Vec<Finding>) -> Result<()> {
    for doc in &policy.required_docs {
        if metadata(&repo_root.join(doc))?.is_none() {
            findings.push(Finding::deterministic(
                Severity::High,
                codes::MISSING_REQUIRED_DOC,
                format!("Missing required doc/path: {doc}"),
            ));
        }
    }
    Ok(())
}

fn check_spec_root(repo_root: &Path, policy: &GuardPolicy, findings: &mut Vec<Finding>) -> Result<()> {
    if !policy.deterministic_checks.require_spec_docs {
        return Ok(());
    }
    let spec_root = policy.spec_root(repo_root);
    let Some(meta) = metadata(&spec_root)? else {
        findings.push(Finding::deterministic(
            Severity::Medium,
            codes::MISSING_SPEC_ROOT,
            format!("Spec root missing: {}", policy.spec_root),
        ));
        return Ok(());
    };

    if !meta.is_dir() || !contains_markdown(&spec_root)? {
        findings.push(Finding::deterministic(
            Severity::Medium,
            codes::EMPTY_SPEC_ROOT,
            format!("No spec markdown files found under {}", policy.spec_root),
        ));
    }
    Ok(())
}

fn contains_markdown(dir: &Path) -> Result<bool> {
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|source| GuardError::DirectoryWalk {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "md") {
            return Ok(true);
        }
    }
    Ok(false)
}

fn check_preflight_artifact(
    repo_root: &Path,
    policy: &GuardPolicy,
    now: SystemTime,
    findings: &mut Vec<Finding>,
) -> Result<()> {
    let preflight = &policy.preflight;
    if !(preflight.required && policy.deterministic_checks.require_preflight_artifact) {
        return Ok(());
    }

    let artifacts = matching_files(repo_root, &preflight.artifact_glob)?;
    let Some((newest, modified)) = artifacts.into_iter().max_by_key(|(_, modified)| *modified) else {
        findings.push(Finding::deterministic(
            Severity::Medium,
            codes::MISSING_PREFLIGHT_ARTIFACT,
            format!("No preflight artifact found matching: {}", preflight.artifact_glob),
        ));
        return Ok(());
    };

    if let Some(max_age) = preflight.max_age_hours {
        let age_hours = now
            .duration_since(modified)
            .map(|age| age.as_secs_f64() / 3600.0)
            .unwrap_or(0.0);
        if age_hours > max_age {
            findings.push(Finding::deterministic(
                Severity::Medium,
                codes::STALE_PREFLIGHT_ARTIFACT,
                format!(
                    "Latest preflight artifact {} is stale ({age_hours:.1}h old, limit {max_age}h).",
                    newest.display()
                ),
            ));
        }
    }
    Ok(())
}

/// Files matching `glob`, with mtimes.
///
/// Relative globs resolve against `repo_root`, absolute ones are used as is.
/// Wildcards match within a single path segment.
fn matching_files(repo_root: &Path, glob: &str) -> Result<Vec<(PathBuf, SystemTime)>> {
    let glob = glob.trim_start_matches("./");
    let absolute = Path::new(glob).is_absolute();
    let prefix = literal_prefix(glob);
    let base = if absolute { prefix } else { repo_root.join(prefix) };
    if metadata(&base)?.is_none() {
        return Ok(Vec::new());
    }

    let segments: Vec<ArtifactPattern> = glob
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(ArtifactPattern::new)
        .collect();
    let mut matches = Vec::new();
    for entry in WalkDir::new(&base) {
        let entry = entry.map_err(|source| GuardError::DirectoryWalk {
            path: base.clone(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = if absolute {
            entry.path()
        } else {
            entry.path().strip_prefix(repo_root).unwrap_or(entry.path())
        };
        let parts = path_segments(path);
        if parts.len() != segments.len() || !segments.iter().zip(&parts).all(|(p, part)| p.matches(part)) {
            continue;
        }
        let modified = entry
            .metadata()
            .map_err(|source| GuardError::DirectoryWalk {
                path: entry.path().to_path_buf(),
                source,
            })?
            .modified()
            .map_err(|source| GuardError::FileSystem {
                path: entry.path().to_path_buf(),
                source,
            })?;
        matches.push((entry.into_path(), modified));
    }
    Ok(matches)
}

/// Leading directory components of `glob` that contain no wildcard
fn literal_prefix(glob: &str) -> PathBuf {
    let mut parts: Vec<&str> = glob.split('/').collect();
    parts.pop();
    let literal: Vec<&str> = parts
        .into_iter()
        .take_while(|part| !part.contains(['*', '?']))
        .collect();
    match literal.join("/") {
        prefix if prefix.is_empty() && glob.starts_with('/') => PathBuf::from("/"),
        prefix => PathBuf::from(prefix),
    }
}

fn path_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::TempDir;

    fn policy(json: &str) -> GuardPolicy {
        GuardPolicy::parse(json, Path::new("policy.json")).expect("policy")
    }

    fn codes_of(report: &CheckReport) -> Vec<&str> {
        report.findings.iter().map(|f| f.code.as_str()).collect()
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, "{}").expect("write");
    }

    #[test]
    fn test_one_finding_per_missing_doc() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "README.md");
        let p = policy(r#"{"requiredDocs": ["README.md", "AGENTS.md", "docs/flow.md"]}"#);
        let report = run_checks(dir.path(), &p, SystemTime::now()).expect("checks");

        assert_eq!(codes_of(&report), vec!["missing-required-doc", "missing-required-doc"]);
        assert_eq!(report.summary.high, 2);
        assert_eq!(report.summary.total, 2);
    }

    #[test]
    fn test_spec_root_missing_then_empty_then_ok() {
        let dir = TempDir::new().expect("tempdir");
        let p = policy(r#"{"requiredDocs": [], "deterministicChecks": {"requireSpecDocs": true}}"#);

        let report = run_checks(dir.path(), &p, SystemTime::now()).expect("checks");
        assert_eq!(codes_of(&report), vec!["missing-spec-root"]);

        std::fs::create_dir_all(dir.path().join(".specs/feature")).expect("mkdir");
        touch(dir.path(), ".specs/feature/notes.txt");
        let report = run_checks(dir.path(), &p, SystemTime::now()).expect("checks");
        assert_eq!(codes_of(&report), vec!["empty-spec-root"]);

        touch(dir.path(), ".specs/feature/spec.md");
        let report = run_checks(dir.path(), &p, SystemTime::now()).expect("checks");
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_spec_root_ignored_unless_required() {
        let dir = TempDir::new().expect("tempdir");
        let report = run_checks(dir.path(), &policy(r#"{"requiredDocs": []}"#), SystemTime::now())
            .expect("checks");
        assert_eq!(report, CheckReport::default());
    }

    #[test]
    fn test_preflight_missing_and_stale() {
        let dir = TempDir::new().expect("tempdir");
        let p = policy(
            r#"{"requiredDocs": [],
                "deterministicChecks": {"requirePreflightArtifact": true},
                "preflight": {"required": true, "maxAgeHours": 1}}"#,
        );

        let report = run_checks(dir.path(), &p, SystemTime::now()).expect("checks");
        assert_eq!(codes_of(&report), vec!["missing-preflight-artifact"]);

        touch(dir.path(), "logs/agent/preflight/preflight_20250101_000000.json");
        touch(dir.path(), "logs/agent/preflight/readme.txt");
        let report = run_checks(dir.path(), &p, SystemTime::now()).expect("checks");
        assert!(report.findings.is_empty());

        let later = SystemTime::now() + Duration::from_secs(3 * 3600);
        let report = run_checks(dir.path(), &p, later).expect("checks");
        assert_eq!(codes_of(&report), vec!["stale-preflight-artifact"]);
        assert_eq!(report.summary.medium, 1);
    }

    #[test]
    fn test_preflight_check_needs_both_flags() {
        let dir = TempDir::new().expect("tempdir");
        let p = policy(r#"{"requiredDocs": [], "preflight": {"required": true}}"#);
        assert!(run_checks(dir.path(), &p, SystemTime::now()).expect("checks").findings.is_empty());
    }

    #[test]
    fn test_all_predicates_run_without_early_exit() {
        let dir = TempDir::new().expect("tempdir");
        let p = policy(
            r#"{"requiredDocs": ["AGENTS.md"],
                "deterministicChecks": {"requireSpecDocs": true, "requirePreflightArtifact": true},
                "preflight": {"required": true}}"#,
        );
        let report = run_checks(dir.path(), &p, SystemTime::now()).expect("checks");
        assert_eq!(
            codes_of(&report),
            vec!["missing-required-doc", "missing-spec-root", "missing-preflight-artifact"]
        );
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(literal_prefix("logs/agent/preflight/*.json"), PathBuf::from("logs/agent/preflight"));
        assert_eq!(literal_prefix("logs/*/preflight_*.json"), PathBuf::from("logs"));
        assert_eq!(literal_prefix("*.json"), PathBuf::new());
        assert_eq!(literal_prefix("/var/log/*.json"), PathBuf::from("/var/log"));
        assert_eq!(literal_prefix("/*.json"), PathBuf::from("/"));
    }

    fn preflight_policy(glob: &str) -> GuardPolicy {
        let json = serde_json::json!({
            "requiredDocs": [],
            "deterministicChecks": {"requirePreflightArtifact": true},
            "preflight": {"required": true, "artifactGlob": glob}
        });
        policy(&json.to_string())
    }

    #[test]
    fn test_preflight_glob_does_not_descend_into_subdirectories() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "logs/agent/preflight/archive/preflight_20240101_000000.json");
        let p = preflight_policy("logs/agent/preflight/*.json");

        let report = run_checks(dir.path(), &p, SystemTime::now()).expect("checks");
        assert_eq!(codes_of(&report), vec!["missing-preflight-artifact"]);

        touch(dir.path(), "logs/agent/preflight/preflight_20250101_000000.json");
        let report = run_checks(dir.path(), &p, SystemTime::now()).expect("checks");
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_preflight_absolute_glob() {
        let dir = TempDir::new().expect("tempdir");
        let elsewhere = TempDir::new().expect("tempdir");
        touch(elsewhere.path(), "runs/preflight_20250101_000000.json");
        let glob = format!("{}/runs/*.json", elsewhere.path().display());

        let report = run_checks(dir.path(), &preflight_policy(&glob), SystemTime::now()).expect("checks");
        assert!(report.findings.is_empty(), "{:?}", report.findings);
    }
}
