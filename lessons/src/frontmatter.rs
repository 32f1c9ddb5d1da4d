//! Lesson markdown documents: YAML frontmatter plus body
//!
//! Frontmatter is read leniently. Unknown keys are ignored, out-of-range scores
//! are clamped, and malformed values fall back to defaults, so a hand-edited
//! lesson never drops out of the index silently. Only the id uniqueness
//! check (see `store`) rejects a document set.

use chrono::NaiveDate;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeSet;
use std::path::Path;

use crate::record::{
    DEFAULT_SCORE, LessonRecord, LessonStatus, Level, Retirement, clamp_score, merge_provenance,
};

const FENCE: &str = "---";

/// A parsed lesson document
#[derive(Debug, Clone, Default)]
pub struct LessonDocument {
    pub meta: Mapping,
    pub body: String,
}

/// Split `text` into its frontmatter block (if any) and the body.
pub fn split(text: &str) -> (Option<String>, String) {
    let lines: Vec<&str> = text.lines().collect();
    if lines.first().map(|l| l.trim()) != Some(FENCE) {
        return (None, text.to_string());
    }
    let Some(end) = lines.iter().skip(1).position(|l| l.trim() == FENCE) else {
        return (None, text.to_string());
    };
    let end = end + 1;
    let yaml = lines[1..end].join("\n");
    let body = lines[end + 1..].join("\n").trim().to_string();
    (Some(yaml), body)
}

/// Parse a lesson document. Invalid YAML is logged and treated as empty metadata.
pub fn parse(text: &str, origin: &Path) -> LessonDocument {
    let (yaml, body) = split(text);
    let meta = match yaml {
        Some(yaml) if !yaml.trim().is_empty() => match serde_yaml::from_str::<Mapping>(&yaml) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::warn!(
                    path = %origin.display(),
                    error = %err,
                    "Ignoring unreadable lesson frontmatter"
                );
                Mapping::new()
            }
        },
        _ => Mapping::new(),
    };
    LessonDocument { meta, body }
}

/// Build the index record for a document.
///
/// `folder_level` comes from the containing folder and is used when the
/// frontmatter omits or misspells `level`.
pub fn normalize(
    doc: &LessonDocument,
    file_stem: &str,
    folder_level: Level,
    rel_path: String,
    today: NaiveDate,
) -> LessonRecord {
    let id = get_str(&doc.meta, "id").unwrap_or_else(|| file_stem.to_string());

    let level = get_str(&doc.meta, "level")
        .and_then(|l| l.parse().ok())
        .unwrap_or(folder_level);
    let status = get_str(&doc.meta, "status")
        .and_then(|s| s.parse().ok())
        .unwrap_or(LessonStatus::Candidate);

    let tags: BTreeSet<String> = get_list(&doc.meta, "tags")
        .into_iter()
        .map(|t| t.to_lowercase())
        .collect();
    let raw_case_ids = get_list(&doc.meta, "source_case_ids");
    let source_case_ids = merge_provenance(&[], raw_case_ids.iter().map(String::as_str));

    let confidence = get_int(&doc.meta, "confidence").map_or(DEFAULT_SCORE, clamp_score);
    let transferability = get_int(&doc.meta, "transferability").map_or(DEFAULT_SCORE, clamp_score);
    let last_validated_at = get_date(&doc.meta, "last_validated_at").unwrap_or(today);

    let (body_title, body_summary) = extract_title_summary(&doc.body, &id);
    let title = get_str(&doc.meta, "title").unwrap_or(body_title);
    let summary = get_str(&doc.meta, "summary").unwrap_or(body_summary);

    let retirement = get_str(&doc.meta, "retired_reason").map(|reason| Retirement {
        reason,
        retired_at: get_date(&doc.meta, "retired_at").unwrap_or(last_validated_at),
    });

    LessonRecord {
        id,
        level,
        status,
        tags,
        confidence,
        transferability,
        source_case_ids,
        last_validated_at,
        title,
        summary,
        path: rel_path,
        promoted_from: get_str(&doc.meta, "promoted_from"),
        retirement,
    }
}

#[derive(Serialize)]
struct FrontmatterView<'a> {
    id: &'a str,
    level: Level,
    status: LessonStatus,
    tags: &'a BTreeSet<String>,
    confidence: u8,
    transferability: u8,
    source_case_ids: &'a [String],
    last_validated_at: String,
    title: &'a str,
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    promoted_from: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retired_reason: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retired_at: Option<String>,
}

/// Render a record and body back into a lesson document.
pub fn render(record: &LessonRecord, body: &str) -> Result<String, serde_yaml::Error> {
    let view = FrontmatterView {
        id: &record.id,
        level: record.level,
        status: record.status,
        tags: &record.tags,
        confidence: record.confidence,
        transferability: record.transferability,
        source_case_ids: &record.source_case_ids,
        last_validated_at: record.last_validated_at.to_string(),
        title: &record.title,
        summary: &record.summary,
        promoted_from: record.promoted_from.as_deref(),
        retired_reason: record.retirement.as_ref().map(|r| r.reason.as_str()),
        retired_at: record.retirement.as_ref().map(|r| r.retired_at.to_string()),
    };
    let yaml = serde_yaml::to_string(&view)?;
    Ok(format!("{FENCE}\n{yaml}{FENCE}\n\n{}\n", body.trim()))
}

/// First `# ` heading and first prose line of a body
pub fn extract_title_summary(body: &str, fallback_id: &str) -> (String, String) {
    let mut title = String::new();
    let mut summary = String::new();
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(heading) = line.strip_prefix("# ") {
            if title.is_empty() {
                title = heading.trim().to_string();
            }
            continue;
        }
        if !line.starts_with('#') {
            summary = line.to_string();
            break;
        }
    }
    if title.is_empty() {
        title = title_from_id(fallback_id);
    }
    (title, summary)
}

fn title_from_id(id: &str) -> String {
    id.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// ============================================================================
// Lenient value access
// ============================================================================

fn scalar_to_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn get_str(meta: &Mapping, key: &str) -> Option<String> {
    meta.get(key).and_then(scalar_to_string)
}

fn get_list(meta: &Mapping, key: &str) -> Vec<String> {
    match meta.get(key) {
        Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn get_int(meta: &Mapping, key: &str) -> Option<i64> {
    match meta.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn get_date(meta: &Mapping, key: &str) -> Option<NaiveDate> {
    get_str(meta, key).and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap_or_default()
    }

    #[test]
    fn test_split_without_frontmatter() {
        let (yaml, body) = split("# Title\n\nBody");
        assert!(yaml.is_none());
        assert_eq!(body, "# Title\n\nBody");
    }

    #[test]
    fn test_split_unterminated_frontmatter_is_body() {
        let (yaml, _) = split("---\nid: x\n# Title");
        assert!(yaml.is_none());
    }

    #[test]
    fn test_normalize_lenient_values() {
        let text = "---\nid: case-ssh-alias\nlevel: bogus\nstatus: weird\ntags: SSH, Windows\nconfidence: 9\ntransferability: \"2\"\nsource_case_ids: [a, b, a]\nlast_validated_at: not-a-date\n---\n# SSH alias\n\nAlias hides the real host key.\n";
        let doc = parse(text, Path::new("cases/x.md"));
        let record = normalize(&doc, "x", Level::Case, "lessons/cases/x.md".into(), today());

        assert_eq!(record.id, "case-ssh-alias");
        assert_eq!(record.level, Level::Case);
        assert_eq!(record.status, LessonStatus::Candidate);
        assert_eq!(
            record.tags.iter().cloned().collect::<Vec<_>>(),
            vec!["ssh".to_string(), "windows".to_string()]
        );
        assert_eq!(record.confidence, 5);
        assert_eq!(record.transferability, 2);
        assert_eq!(record.source_case_ids, vec!["a", "b"]);
        assert_eq!(record.last_validated_at, today());
        assert_eq!(record.title, "SSH alias");
        assert_eq!(record.summary, "Alias hides the real host key.");
    }

    #[test]
    fn test_normalize_falls_back_to_file_stem_and_folder() {
        let doc = parse("Just prose.", Path::new("patterns/key-rotation.md"));
        let record = normalize(
            &doc,
            "key-rotation",
            Level::Pattern,
            "lessons/patterns/key-rotation.md".into(),
            today(),
        );
        assert_eq!(record.id, "key-rotation");
        assert_eq!(record.level, Level::Pattern);
        assert_eq!(record.title, "Key Rotation");
        assert_eq!(record.summary, "Just prose.");
    }

    #[test]
    fn test_invalid_yaml_is_ignored() {
        let doc = parse("---\nid: [unclosed\n---\nbody", Path::new("x.md"));
        assert!(doc.meta.is_empty());
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn test_render_then_parse_preserves_record() {
        let mut record = LessonRecord::new_case(
            "case-acl",
            "Key ACL mismatch",
            "lessons/cases/case-acl.md",
            today(),
        );
        record.tags = ["acl".to_string(), "ssh".to_string()].into_iter().collect();
        record.source_case_ids = vec!["case-old".to_string()];
        record.summary = "Keys with loose ACLs are refused.".to_string();
        record.promoted_from = Some("case-older".to_string());
        record.retirement = Some(Retirement {
            reason: "superseded".to_string(),
            retired_at: today(),
        });
        record.status = LessonStatus::Retired;

        let text = render(&record, "# Key ACL mismatch\n\nDetails.").expect("render");
        let doc = parse(&text, Path::new("case-acl.md"));
        let back = normalize(&doc, "case-acl", Level::Case, record.path.clone(), today());

        assert_eq!(back, record);
        assert_eq!(doc.body, "# Key ACL mismatch\n\nDetails.");
    }
}
