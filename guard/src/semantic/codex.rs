//! Reviewer backed by `codex exec`
//!
//! The prompt goes over stdin, the reviewer writes schema-constrained JSON
//! to a temp file passed with `-o`. The child is spawned with
//! `kill_on_drop`, so dropping the future on timeout kills it.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::reviewer::{ReviewError, ReviewRequest, Reviewer};

pub const CODEX_ENGINE: &str = "codex_subprocess";

#[derive(Debug, Clone)]
pub struct CodexExecReviewer {
    command: String,
}

impl CodexExecReviewer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Arguments after the program name
    pub fn args(request: &ReviewRequest, output_path: &Path) -> Vec<String> {
        let mut args = vec![
            "exec".to_string(),
            "--skip-git-repo-check".to_string(),
            "--sandbox".to_string(),
            "read-only".to_string(),
            "-C".to_string(),
            request.repo_root.display().to_string(),
        ];
        if let Some(model) = &request.model {
            args.push("-m".to_string());
            args.push(model.clone());
        }
        args.extend([
            "--output-schema".to_string(),
            request.schema_path.display().to_string(),
            "-o".to_string(),
            output_path.display().to_string(),
            "-".to_string(),
        ]);
        args
    }
}

impl Default for CodexExecReviewer {
    fn default() -> Self {
        Self::new("codex")
    }
}

/// Review prompt sent on stdin
pub fn build_prompt(request: &ReviewRequest) -> String {
    let changed = if request.changed_paths.is_empty() {
        "<none>".to_string()
    } else {
        request.changed_paths.join("\n")
    };
    format!(
        "You are a workflow compliance reviewer.

Goal:
- Review workflow/process risk for this task.
- Focus on scope drift, missing spec updates, missing verification evidence, and unsafe operational behavior.
- Do not invent repository facts; if uncertain, report uncertainty.

Task:
{task}

Changed paths:
{changed}

Instructions:
- Return strictly valid JSON per the provided schema.
- Keep findings concise and actionable.
- At most {max} findings.
",
        task = request.task,
        max = request.max_findings,
    )
}

#[async_trait::async_trait]
impl Reviewer for CodexExecReviewer {
    fn engine(&self) -> &str {
        CODEX_ENGINE
    }

    async fn invoke(
        &self,
        request: &ReviewRequest,
        timeout: Duration,
    ) -> Result<serde_json::Value, ReviewError> {
        let program =
            which::which(&self.command).map_err(|_| ReviewError::NotFound(self.command.clone()))?;
        let output_file = tempfile::Builder::new()
            .prefix("semantic-review-")
            .suffix(".json")
            .tempfile()?;

        let mut child = Command::new(&program)
            .args(Self::args(request, output_file.path()))
            .current_dir(&request.repo_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ReviewError::NotFound(self.command.clone())
                } else {
                    ReviewError::Io(e)
                }
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(build_prompt(request).as_bytes()).await?;
            // EOF
            drop(stdin);
        }

        tracing::debug!(program = %program.display(), timeout_secs = timeout.as_secs(), "Reviewer spawned");
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(ReviewError::Timeout(timeout.as_secs())),
        };

        if !output.status.success() {
            return Err(ReviewError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let raw = tokio::fs::read_to_string(output_file.path()).await?;
        serde_json::from_str(&raw).map_err(|e| ReviewError::InvalidOutput(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn request(model: Option<&str>) -> ReviewRequest {
        ReviewRequest {
            task: "Add retry to uploader".to_string(),
            changed_paths: vec!["src/upload.rs".to_string(), "docs/upload.md".to_string()],
            model: model.map(str::to_string),
            max_findings: 4,
            schema_path: PathBuf::from("/repo/schema.json"),
            repo_root: PathBuf::from("/repo"),
        }
    }

    #[test]
    fn test_args_with_model() {
        let args = CodexExecReviewer::args(&request(Some("gpt-5")), Path::new("/tmp/out.json"));
        assert_eq!(
            args,
            vec![
                "exec",
                "--skip-git-repo-check",
                "--sandbox",
                "read-only",
                "-C",
                "/repo",
                "-m",
                "gpt-5",
                "--output-schema",
                "/repo/schema.json",
                "-o",
                "/tmp/out.json",
                "-",
            ]
        );
    }

    #[test]
    fn test_args_without_model() {
        let args = CodexExecReviewer::args(&request(None), Path::new("/tmp/out.json"));
        assert!(!args.iter().any(|a| a == "-m"));
    }

    #[test]
    fn test_prompt_lists_paths_and_cap() {
        let prompt = build_prompt(&request(None));
        assert!(prompt.contains("Add retry to uploader"));
        assert!(prompt.contains("src/upload.rs\ndocs/upload.md"));
        assert!(prompt.contains("At most 4 findings."));

        let mut empty = request(None);
        empty.changed_paths.clear();
        assert!(build_prompt(&empty).contains("Changed paths:\n<none>"));
    }

    #[tokio::test]
    async fn test_missing_executable_is_not_found() {
        let reviewer = CodexExecReviewer::new("lessonkit-no-such-reviewer-binary");
        let err = reviewer
            .invoke(&request(None), Duration::from_secs(5))
            .await
            .expect_err("missing");
        assert!(matches!(err, ReviewError::NotFound(_)));
    }
}
