use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Changed paths from git: staged first, then unstaged.
///
/// No git, not a repository, or a clean tree all give an empty list.
pub async fn detect_changed_paths(repo_root: &Path) -> Vec<String> {
    let Ok(git) = which::which("git") else {
        tracing::debug!("git not found on PATH, no changed paths detected");
        return Vec::new();
    };

    for extra in [&["--cached"][..], &[][..]] {
        let output = Command::new(&git)
            .arg("-C")
            .arg(repo_root)
            .args(["diff", "--name-only"])
            .args(extra)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;
        match output {
            Ok(out) if out.status.success() => {
                let paths: Vec<String> = String::from_utf8_lossy(&out.stdout)
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect();
                if !paths.is_empty() {
                    return paths;
                }
            }
            Ok(out) => {
                tracing::debug!(status = ?out.status.code(), "git diff failed");
            }
            Err(err) => {
                tracing::debug!(error = %err, "git diff could not run");
            }
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_non_repository_gives_empty_list() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        assert!(detect_changed_paths(dir.path()).await.is_empty());
    }
}
