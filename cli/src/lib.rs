//! `lessonkit` command surface
//!
//! ## Exit codes
//!
//! - 0: success, or guard PASS / WARN
//! - 2: guard BLOCK
//! - 3: configuration or infrastructure error
//! - 4: lesson lifecycle rule rejected the operation

mod guard_cmd;
mod lessons_cmd;
mod preflight_cmd;

pub use guard_cmd::GuardCli;
pub use lessons_cmd::{IndexCli, PromoteCli, RetireCli, StatusCli};
pub use preflight_cmd::PreflightCli;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

pub const EXIT_OK: i32 = 0;
pub const EXIT_BLOCK: i32 = 2;
pub const EXIT_ERROR: i32 = 3;
pub const EXIT_REJECTED: i32 = 4;

/// Lesson preflight, lifecycle and workflow guard
#[derive(Debug, Parser)]
#[command(name = "lessonkit", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run deterministic checks and semantic review, then gate
    Guard(GuardCli),

    /// Shortlist lessons relevant to a task
    Preflight(PreflightCli),

    /// Promote a lesson to the next abstraction level
    Promote(PromoteCli),

    /// Retire a lesson, keeping its record and provenance
    Retire(RetireCli),

    /// Advance a lesson's status (candidate → validated → canonical)
    Status(StatusCli),

    /// Rebuild index.json from lesson bodies
    Index(IndexCli),
}

impl Cli {
    /// Run the selected command and return the process exit code
    pub async fn run(self) -> i32 {
        match self.command {
            Command::Guard(cmd) => cmd.run().await,
            Command::Preflight(cmd) => cmd.run(),
            Command::Promote(cmd) => cmd.run(),
            Command::Retire(cmd) => cmd.run(),
            Command::Status(cmd) => cmd.run(),
            Command::Index(cmd) => cmd.run(),
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Relative paths resolve against the repo root
pub(crate) fn resolve(repo_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        repo_root.join(path)
    }
}
