//! Lesson store, task ranking, preflight selection and promotion lifecycle.
//!
//! Lessons live as markdown files with YAML frontmatter under
//! `<lessons-root>/{cases,patterns,principles}/`, and a metadata-only
//! `index.json` makes them queryable without loading bodies.
//!
//! ```text
//! task text → extract_tokens → rank(index) → select(top, max_cases) → PreflightArtifact
//! operator  → PromotionEngine::{promote, retire, advance_status} → LessonStore
//! ```

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod error;
pub mod frontmatter;
pub mod io;
pub mod preflight;
pub mod promotion;
pub mod ranker;
pub mod record;
pub mod store;
pub mod tokens;

pub use error::{LessonError, Result};
pub use preflight::{
    LessonSource, PreflightArtifact, PreflightMatch, SelectionLimits, match_headings, match_store,
    run_preflight, select,
};
pub use promotion::{
    Criterion, PromotionEngine, PromotionError, PromotionPolicy, PromotionRequest,
};
pub use ranker::{RankedLesson, rank, relevance};
pub use record::{LessonRecord, LessonStatus, Level, Retirement};
pub use store::{FsLessonStore, IndexDocument, IndexStats, LessonIndex, LessonStore, MemoryLessonStore};
pub use tokens::{MIN_TOKEN_LEN, TaskTokens, extract_tokens};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default lessons root, relative to the repository root
pub const DEFAULT_LESSONS_ROOT: &str = "lessons";

/// Preflight artifact directory, relative to the repository root
pub const PREFLIGHT_DIR: &str = "logs/agent/preflight";

/// Build the preflight artifact directory path
pub fn preflight_dir(repo_root: &std::path::Path) -> std::path::PathBuf {
    repo_root.join(PREFLIGHT_DIR)
}
