//! Write-once guard artifacts under `<repo>/logs/agent/guard/`

use chrono::Local;
use lessonkit_lessons::io::{artifact_stamp, write_once};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{GuardError, Result};
use crate::result::GuardResult;
use crate::semantic::SemanticRecord;

/// Guard artifact directory, relative to the repository root
pub const GUARD_DIR: &str = "logs/agent/guard";

pub fn guard_dir(repo_root: &Path) -> PathBuf {
    repo_root.join(GUARD_DIR)
}

fn write_json<T: Serialize>(repo_root: &Path, prefix: &str, value: &T) -> Result<PathBuf> {
    let dir = guard_dir(repo_root);
    let json = serde_json::to_string_pretty(value)?;
    write_once(&dir, prefix, &artifact_stamp(Local::now()), json.as_bytes())
        .map_err(|source| GuardError::ArtifactWrite { path: dir, source })
}

pub fn write_guard_result(repo_root: &Path, result: &GuardResult) -> Result<PathBuf> {
    write_json(repo_root, "guard", result)
}

pub fn write_semantic_record(repo_root: &Path, record: &SemanticRecord) -> Result<PathBuf> {
    write_json(repo_root, "semantic", record)
}
