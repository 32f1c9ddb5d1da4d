//! `lessonkit preflight`

use clap::Parser;
use lessonkit_guard::{GuardError, GuardPolicy};
use lessonkit_lessons::{LessonSource, SelectionLimits, run_preflight};
use std::path::PathBuf;

use crate::{EXIT_ERROR, EXIT_OK, resolve};

#[derive(Debug, Parser)]
pub struct PreflightCli {
    /// Task description to match lessons against
    #[arg(long)]
    pub task: String,

    /// Lessons root directory, or a markdown file of `## ` headings
    #[arg(long = "lessons-path", default_value = lessonkit_lessons::DEFAULT_LESSONS_ROOT)]
    pub lessons_path: PathBuf,

    #[arg(long = "repo-root", default_value = ".")]
    pub repo_root: PathBuf,

    /// Shortlist size (default: policy `preflight.top`, else 5)
    #[arg(long)]
    pub top: Option<usize>,

    /// Case-level entries allowed in the shortlist (default: policy `preflight.maxCases`, else 2)
    #[arg(long = "max-cases")]
    pub max_cases: Option<usize>,

    /// Policy JSON consulted for defaults; ignored when absent
    #[arg(long = "policy-path", default_value = lessonkit_guard::DEFAULT_POLICY_PATH)]
    pub policy_path: PathBuf,

    /// Print the artifact as JSON
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

impl PreflightCli {
    pub fn run(self) -> i32 {
        match self.execute() {
            Ok(()) => EXIT_OK,
            Err(err) => {
                eprintln!("Error: {err}");
                EXIT_ERROR
            }
        }
    }

    fn execute(&self) -> anyhow::Result<()> {
        let limits = self.limits()?;
        let source = LessonSource::detect(&resolve(&self.repo_root, &self.lessons_path));
        let artifact = run_preflight(&self.task, &source, limits)?;
        let path = artifact.write(&self.repo_root)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&artifact)?);
            return Ok(());
        }

        println!("Preflight artifact: {}", path.display());
        if artifact.is_empty() {
            println!("No matching lessons.");
            return Ok(());
        }
        println!("Relevant lessons ({}):", artifact.match_count);
        for m in &artifact.matches {
            match m.level {
                Some(level) => println!("- {} [{level}] (score {})", m.label(), m.score),
                None => println!("- {} (score {})", m.label(), m.score),
            }
        }
        Ok(())
    }

    /// Flags win over policy values, policy values over built-in defaults.
    fn limits(&self) -> anyhow::Result<SelectionLimits> {
        let policy_path = resolve(&self.repo_root, &self.policy_path);
        let mut limits = match GuardPolicy::load(&policy_path) {
            Ok(policy) => SelectionLimits {
                top: policy.preflight.top,
                max_cases: policy.preflight.max_cases,
            },
            Err(GuardError::PolicyNotFound { .. }) => SelectionLimits::default(),
            Err(err) => return Err(err.into()),
        };
        if let Some(top) = self.top {
            limits.top = top;
        }
        if let Some(max_cases) = self.max_cases {
            limits.max_cases = max_cases;
        }
        Ok(limits)
    }
}
