//! Crash-safe and write-once file helpers.
//!
//! Index and lesson rewrites use temp-file + fsync + rename so a reader never
//! observes a half-written file. Run artifacts are write-once: they are
//! created with `create_new` and never replaced.

use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Upper bound on same-second artifact name collisions before giving up
const MAX_ARTIFACT_SUFFIX: u32 = 1000;

/// Replace `target` atomically.
pub fn write_atomic(target: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = dir.join(format!(".{file_name}.tmp"));

    let mut file = std::fs::File::create(&temp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&temp_path, target)
}

/// Timestamp fragment used in artifact file names
pub fn artifact_stamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// Create a new `<prefix>_<stamp>[_N].json` file in `dir` holding `contents`.
///
/// Never overwrites: a same-second collision gets the next free numeric suffix.
pub fn write_once(
    dir: &Path,
    prefix: &str,
    stamp: &str,
    contents: &[u8],
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    for attempt in 0..MAX_ARTIFACT_SUFFIX {
        let name = if attempt == 0 {
            format!("{prefix}_{stamp}.json")
        } else {
            format!("{prefix}_{stamp}_{attempt}.json")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(contents)?;
                file.sync_all()?;
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("no free artifact name for {prefix}_{stamp} in {}", dir.display()),
    ))
}
