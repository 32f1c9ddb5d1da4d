//! Error types for lesson store operations

use std::path::PathBuf;
use thiserror::Error;

/// Lesson store result type alias
pub type Result<T> = std::result::Result<T, LessonError>;

/// Lesson store error taxonomy
#[derive(Debug, Error)]
pub enum LessonError {
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read directory {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("Failed to serialize JSON: {source}")]
    JsonSerialize { source: serde_json::Error },

    #[error("Failed to deserialize {path}: {source}")]
    JsonDeserialize {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to render frontmatter for {id}: {source}")]
    FrontmatterRender {
        id: String,
        source: serde_yaml::Error,
    },

    #[error("Duplicate lesson id `{id}` ({first} and {second})")]
    DuplicateId {
        id: String,
        first: String,
        second: String,
    },

    #[error("Index entry `{id}` points at missing lesson body {path}")]
    DanglingEntry { id: String, path: PathBuf },

    #[error("Lesson body already exists at {path}")]
    AlreadyExists { path: PathBuf },

    #[error("Lesson not found: {0}")]
    NotFound(String),
}
