//! `lessonkit guard`

use clap::{Parser, ValueEnum};
use lessonkit_guard::{GuardRequest, GuardRunner, GuardStatus, Mode};
use std::path::PathBuf;

use crate::{EXIT_BLOCK, EXIT_ERROR, EXIT_OK};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Warn,
    Block,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Warn => Mode::Warn,
            ModeArg::Block => Mode::Block,
        }
    }
}

#[derive(Debug, Parser)]
pub struct GuardCli {
    /// Task description under review
    #[arg(long)]
    pub task: String,

    /// `block` lets high-severity evidence fail the run (exit 2)
    #[arg(long, value_enum, default_value = "warn")]
    pub mode: ModeArg,

    #[arg(long = "repo-root", default_value = ".")]
    pub repo_root: PathBuf,

    /// Policy JSON, relative to the repo root unless absolute
    #[arg(long = "policy-path", default_value = lessonkit_guard::DEFAULT_POLICY_PATH)]
    pub policy_path: PathBuf,

    /// Changed paths to review; detected from git when omitted
    #[arg(long = "changed-paths", num_args = 0..)]
    pub changed_paths: Option<Vec<String>>,

    /// Skip the semantic review even if the policy enables it
    #[arg(long = "skip-semantic")]
    pub skip_semantic: bool,

    /// Print the guard result as JSON
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

impl GuardCli {
    pub async fn run(self) -> i32 {
        let request = GuardRequest {
            task: self.task,
            mode: self.mode.into(),
            repo_root: self.repo_root,
            policy_path: self.policy_path,
            changed_paths: self.changed_paths,
            skip_semantic: self.skip_semantic,
        };

        let cancel = async {
            // No signal support: never cancel.
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        let run = match GuardRunner::new().run_until(&request, cancel).await {
            Ok(run) => run,
            Err(err) => {
                let kind = if err.is_config() {
                    "Configuration error"
                } else {
                    "Error"
                };
                eprintln!("{kind}: {err}");
                return EXIT_ERROR;
            }
        };
        let result = &run.result;

        if self.json {
            match serde_json::to_string_pretty(result) {
                Ok(json) => println!("{json}"),
                Err(err) => {
                    eprintln!("Error: {err}");
                    return EXIT_ERROR;
                }
            }
        } else {
            println!("Guard artifact: {}", run.artifact_path.display());
            if let Some(path) = &result.semantic.artifact_path {
                println!("Semantic artifact: {path}");
            }
            for finding in result
                .deterministic_findings
                .iter()
                .chain(&result.semantic.findings)
            {
                println!(
                    "- [{}] {} ({:?}): {}",
                    finding.severity, finding.code, finding.source, finding.message
                );
            }
            println!(
                "Guard status: {} (det={}, semantic={} {})",
                result.status,
                result.deterministic_summary.total,
                result.semantic.findings.len(),
                result.semantic.status,
            );
        }

        match result.status {
            GuardStatus::Block => EXIT_BLOCK,
            GuardStatus::Pass | GuardStatus::Warn => EXIT_OK,
        }
    }
}
