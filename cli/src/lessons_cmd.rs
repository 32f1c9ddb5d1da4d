//! Lesson lifecycle commands: `promote`, `retire`, `status`, `index`

use clap::{Args, Parser};
use lessonkit_lessons::{
    FsLessonStore, LessonRecord, LessonStatus, Level, PromotionEngine, PromotionError,
    PromotionPolicy, PromotionRequest,
};
use std::path::PathBuf;

use crate::{EXIT_ERROR, EXIT_OK, EXIT_REJECTED, resolve};

/// Where the lessons live
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    #[arg(long = "repo-root", default_value = ".")]
    pub repo_root: PathBuf,

    /// Lessons root, relative to the repo root unless absolute
    #[arg(long = "lessons-root", default_value = lessonkit_lessons::DEFAULT_LESSONS_ROOT)]
    pub lessons_root: PathBuf,
}

impl StoreArgs {
    fn store(&self) -> FsLessonStore {
        FsLessonStore::new(resolve(&self.repo_root, &self.lessons_root))
    }
}

#[derive(Debug, Parser)]
pub struct PromoteCli {
    /// Lesson to promote
    #[arg(long = "source-id")]
    pub source_id: String,

    /// `pattern` (from a case) or `principle` (from a pattern)
    #[arg(long = "target-level")]
    pub target_level: Level,

    /// Additional supporting case id (repeatable)
    #[arg(long = "source-case-id")]
    pub source_case_ids: Vec<String>,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long = "new-id")]
    pub new_id: Option<String>,

    /// Overwrite an earlier promotion of the same source
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub store: StoreArgs,
}

impl PromoteCli {
    pub fn run(self) -> i32 {
        let mut request = PromotionRequest::new(&self.source_id, self.target_level)
            .with_case_ids(self.source_case_ids)
            .forced(self.force);
        if let Some(title) = self.title {
            request = request.with_title(title);
        }
        if let Some(new_id) = self.new_id {
            request = request.with_new_id(new_id);
        }

        let engine = PromotionEngine::new(PromotionPolicy::default());
        report(engine.promote(&self.store.store(), &request), |record| {
            println!(
                "Promoted {} -> {} ({}): {}",
                self.source_id, record.id, record.level, record.path
            );
            println!("Source case ids: {}", record.source_case_ids.join(", "));
        })
    }
}

#[derive(Debug, Parser)]
pub struct RetireCli {
    #[arg(long)]
    pub id: String,

    /// Why the lesson no longer applies
    #[arg(long)]
    pub reason: String,

    #[command(flatten)]
    pub store: StoreArgs,
}

impl RetireCli {
    pub fn run(self) -> i32 {
        let engine = PromotionEngine::new(PromotionPolicy::default());
        report(engine.retire(&self.store.store(), &self.id, &self.reason), |record| {
            println!("Retired {}: {}", record.id, self.reason.trim());
        })
    }
}

#[derive(Debug, Parser)]
pub struct StatusCli {
    #[arg(long)]
    pub id: String,

    /// `validated` or `canonical`
    #[arg(long)]
    pub to: LessonStatus,

    #[command(flatten)]
    pub store: StoreArgs,
}

impl StatusCli {
    pub fn run(self) -> i32 {
        let engine = PromotionEngine::new(PromotionPolicy::default());
        report(engine.advance_status(&self.store.store(), &self.id, self.to), |record| {
            println!("{} is now {}", record.id, record.status);
        })
    }
}

#[derive(Debug, Parser)]
pub struct IndexCli {
    /// Write the index here instead of `<lessons-root>/index.json`
    #[arg(long = "output-path")]
    pub output_path: Option<PathBuf>,

    #[command(flatten)]
    pub store: StoreArgs,
}

impl IndexCli {
    pub fn run(self) -> i32 {
        match self.execute() {
            Ok(()) => EXIT_OK,
            Err(err) => {
                eprintln!("Error: {err}");
                EXIT_ERROR
            }
        }
    }

    fn execute(&self) -> lessonkit_lessons::Result<()> {
        let store = self.store.store();
        let (index, target) = match &self.output_path {
            Some(output) => {
                let target = resolve(&self.store.repo_root, output);
                let index = store.scan()?;
                store.write_index_to(&index, &target)?;
                (index, target)
            }
            None => (store.rebuild_index()?, store.index_path()),
        };

        let stats = index.stats();
        println!("Index written: {}", target.display());
        let by_level: Vec<String> = Level::all()
            .iter()
            .map(|level| format!("{}={}", level.folder(), stats.by_level.get(level).copied().unwrap_or(0)))
            .collect();
        println!("Lessons: {} ({})", stats.total, by_level.join(", "));
        Ok(())
    }
}

/// Engine rejections exit 4; store failures exit 3.
fn report(result: Result<LessonRecord, PromotionError>, on_success: impl FnOnce(&LessonRecord)) -> i32 {
    match result {
        Ok(record) => {
            on_success(&record);
            EXIT_OK
        }
        Err(PromotionError::Store(err)) => {
            eprintln!("Error: {err}");
            EXIT_ERROR
        }
        Err(err) => {
            eprintln!("Rejected: {err}");
            EXIT_REJECTED
        }
    }
}
