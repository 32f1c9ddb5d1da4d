//! Lesson store and metadata index
//!
//! The store is an explicit handle passed to ranking and promotion code.
//! `FsLessonStore` persists bodies as markdown and the index as
//! `<root>/index.json`; `MemoryLessonStore` backs tests.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::error::{LessonError, Result};
use crate::frontmatter;
use crate::io::write_atomic;
use crate::record::{LessonRecord, LessonStatus, Level};

/// Index file name inside the lessons root
pub const INDEX_FILENAME: &str = "index.json";

/// Index schema version written to `index.json`
pub const INDEX_SCHEMA_VERSION: &str = "1.0.0";

// ============================================================================
// Index
// ============================================================================

/// Metadata-only view of all lessons, keyed by id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LessonIndex {
    records: BTreeMap<String, LessonRecord>,
}

impl LessonIndex {
    /// Build an index, rejecting duplicate ids.
    pub fn from_records(records: impl IntoIterator<Item = LessonRecord>) -> Result<Self> {
        let mut map: BTreeMap<String, LessonRecord> = BTreeMap::new();
        for record in records {
            if let Some(existing) = map.get(&record.id) {
                return Err(LessonError::DuplicateId {
                    id: record.id.clone(),
                    first: existing.path.clone(),
                    second: record.path,
                });
            }
            map.insert(record.id.clone(), record);
        }
        Ok(Self { records: map })
    }

    pub fn get(&self, id: &str) -> Option<&LessonRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Records in id order
    pub fn records(&self) -> impl Iterator<Item = &LessonRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert or replace the record with the same id
    pub fn upsert(&mut self, record: LessonRecord) {
        self.records.insert(record.id.clone(), record);
    }

    pub fn stats(&self) -> IndexStats {
        let mut by_level: BTreeMap<Level, usize> = Level::all().into_iter().map(|l| (l, 0)).collect();
        let mut by_status: BTreeMap<LessonStatus, usize> =
            LessonStatus::all().into_iter().map(|s| (s, 0)).collect();
        for record in self.records.values() {
            *by_level.entry(record.level).or_default() += 1;
            *by_status.entry(record.status).or_default() += 1;
        }
        IndexStats {
            total: self.records.len(),
            by_level,
            by_status,
        }
    }

    /// Serializable form, lessons sorted by (level, id)
    pub fn to_document(&self, generated_at: DateTime<Utc>) -> IndexDocument {
        let mut lessons: Vec<LessonRecord> = self.records.values().cloned().collect();
        lessons.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.id.cmp(&b.id)));
        IndexDocument {
            schema_version: INDEX_SCHEMA_VERSION.to_string(),
            generated_at,
            stats: self.stats(),
            lessons,
        }
    }
}

/// Counts per level and per status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub total: usize,
    pub by_level: BTreeMap<Level, usize>,
    pub by_status: BTreeMap<LessonStatus, usize>,
}

/// On-disk shape of `index.json`
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDocument {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub stats: IndexStats,
    pub lessons: Vec<LessonRecord>,
}

// ============================================================================
// Store handle
// ============================================================================

/// Load / query / replace operations over a lesson collection.
pub trait LessonStore {
    /// Load the metadata index without materializing bodies
    fn load_index(&self) -> Result<LessonIndex>;

    /// Read the body (markdown after frontmatter) of a record
    fn read_body(&self, record: &LessonRecord) -> Result<String>;

    /// Persist a record and its body. Fails with `AlreadyExists` unless `overwrite`.
    fn write_lesson(&self, record: &LessonRecord, body: &str, overwrite: bool) -> Result<()>;

    /// Atomically replace the persisted index
    fn replace_index(&self, index: &LessonIndex) -> Result<()>;

    /// Relative body path a new record at `level` with `id` should use
    fn body_path(&self, level: Level, id: &str) -> String;

    /// Identifier reported in artifacts
    fn describe(&self) -> String;
}

// ============================================================================
// Filesystem store
// ============================================================================

/// Markdown lessons under `<root>/{cases,patterns,principles}` plus `<root>/index.json`.
#[derive(Clone, Debug)]
pub struct FsLessonStore {
    root: PathBuf,
}

impl FsLessonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILENAME)
    }

    /// Bodies are addressed relative to the root's parent (e.g. `lessons/cases/x.md`)
    fn base(&self) -> &Path {
        self.root.parent().unwrap_or_else(|| Path::new(""))
    }

    fn absolute(&self, rel_path: &str) -> PathBuf {
        self.base().join(rel_path)
    }

    fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(self.base()).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Markdown bodies under the level folders, in a stable order.
    fn body_files(&self) -> Result<Vec<(Level, PathBuf)>> {
        let mut files = Vec::new();
        for level in Level::all() {
            let folder = self.root.join(level.folder());
            if !folder.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&folder).sort_by_file_name() {
                let entry = entry.map_err(|source| LessonError::DirectoryRead {
                    path: folder.clone(),
                    source,
                })?;
                let path = entry.path();
                if entry.file_type().is_file() && path.extension().and_then(|e| e.to_str()) == Some("md") {
                    files.push((level, path.to_path_buf()));
                }
            }
        }
        Ok(files)
    }

    /// Build the index from lesson bodies on disk.
    pub fn scan(&self) -> Result<LessonIndex> {
        let today = Local::now().date_naive();
        let records = self
            .body_files()?
            .iter()
            .map(|(level, path)| self.read_record(path, *level, today))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(root = %self.root.display(), lessons = records.len(), "Scanned lesson bodies");
        LessonIndex::from_records(records)
    }

    /// Whether bodies were added or edited after `index.json` was written.
    fn index_is_stale(&self, index: &LessonIndex, index_modified: SystemTime) -> Result<bool> {
        let files = self.body_files()?;
        if files.len() > index.len() {
            return Ok(true);
        }
        for (_, path) in &files {
            let modified = std::fs::metadata(path)
                .and_then(|m| m.modified())
                .map_err(|source| LessonError::FileRead {
                    path: path.clone(),
                    source,
                })?;
            if modified > index_modified {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn read_record(&self, path: &Path, folder_level: Level, today: NaiveDate) -> Result<LessonRecord> {
        let text = std::fs::read_to_string(path).map_err(|source| LessonError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let doc = frontmatter::parse(&text, path);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(frontmatter::normalize(&doc, &stem, folder_level, self.relative(path), today))
    }

    /// Rescan bodies and atomically rewrite `index.json`.
    pub fn rebuild_index(&self) -> Result<LessonIndex> {
        let index = self.scan()?;
        self.replace_index(&index)?;
        Ok(index)
    }

    /// Write the index to an explicit location instead of `<root>/index.json`.
    pub fn write_index_to(&self, index: &LessonIndex, target: &Path) -> Result<()> {
        let document = index.to_document(Utc::now());
        let json = serde_json::to_string_pretty(&document)
            .map_err(|source| LessonError::JsonSerialize { source })?;
        write_atomic(target, json.as_bytes()).map_err(|source| LessonError::FileWrite {
            path: target.to_path_buf(),
            source,
        })
    }

    /// Every index entry must have a body on disk.
    fn verify_integrity(&self, index: &LessonIndex) -> Result<()> {
        for record in index.records() {
            let body = self.absolute(&record.path);
            if !body.is_file() {
                return Err(LessonError::DanglingEntry {
                    id: record.id.clone(),
                    path: body,
                });
            }
        }
        Ok(())
    }
}

impl LessonStore for FsLessonStore {
    fn load_index(&self) -> Result<LessonIndex> {
        let index_path = self.index_path();
        if !index_path.exists() {
            tracing::debug!(path = %index_path.display(), "No index file, scanning bodies");
            return self.scan();
        }

        let text = std::fs::read_to_string(&index_path).map_err(|source| LessonError::FileRead {
            path: index_path.clone(),
            source,
        })?;
        let index_modified = std::fs::metadata(&index_path)
            .and_then(|m| m.modified())
            .map_err(|source| LessonError::FileRead {
                path: index_path.clone(),
                source,
            })?;
        let document: IndexDocument =
            serde_json::from_str(&text).map_err(|source| LessonError::JsonDeserialize {
                path: index_path.clone(),
                source,
            })?;
        if document.schema_version != INDEX_SCHEMA_VERSION {
            tracing::warn!(
                found = %document.schema_version,
                expected = INDEX_SCHEMA_VERSION,
                "Lesson index schema version differs"
            );
        }

        let index = LessonIndex::from_records(document.lessons)?;
        self.verify_integrity(&index)?;
        if self.index_is_stale(&index, index_modified)? {
            tracing::info!(path = %index_path.display(), "Lesson index is older than its bodies, rescanning");
            return self.scan();
        }
        Ok(index)
    }

    fn read_body(&self, record: &LessonRecord) -> Result<String> {
        let path = self.absolute(&record.path);
        let text = std::fs::read_to_string(&path).map_err(|source| LessonError::FileRead {
            path: path.clone(),
            source,
        })?;
        Ok(frontmatter::split(&text).1)
    }

    fn write_lesson(&self, record: &LessonRecord, body: &str, overwrite: bool) -> Result<()> {
        let path = self.absolute(&record.path);
        if path.exists() && !overwrite {
            return Err(LessonError::AlreadyExists { path });
        }
        let text = frontmatter::render(record, body).map_err(|source| LessonError::FrontmatterRender {
            id: record.id.clone(),
            source,
        })?;
        write_atomic(&path, text.as_bytes()).map_err(|source| LessonError::FileWrite { path, source })
    }

    fn replace_index(&self, index: &LessonIndex) -> Result<()> {
        self.write_index_to(index, &self.index_path())?;
        tracing::info!(path = %self.index_path().display(), lessons = index.len(), "Lesson index updated");
        Ok(())
    }

    fn body_path(&self, level: Level, id: &str) -> String {
        self.relative(&self.root.join(level.folder()).join(format!("{id}.md")))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Isolated store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryLessonStore {
    index: RefCell<LessonIndex>,
    bodies: RefCell<BTreeMap<String, String>>,
}

impl MemoryLessonStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with records whose bodies are empty.
    pub fn with_records(records: impl IntoIterator<Item = LessonRecord>) -> Result<Self> {
        let index = LessonIndex::from_records(records)?;
        let bodies = index
            .records()
            .map(|r| (r.path.clone(), String::new()))
            .collect();
        Ok(Self {
            index: RefCell::new(index),
            bodies: RefCell::new(bodies),
        })
    }

    /// Body stored for a relative path, if any
    pub fn body(&self, path: &str) -> Option<String> {
        self.bodies.borrow().get(path).cloned()
    }
}

impl LessonStore for MemoryLessonStore {
    fn load_index(&self) -> Result<LessonIndex> {
        let index = self.index.borrow().clone();
        let bodies = self.bodies.borrow();
        if let Some(orphan) = index.records().find(|r| !bodies.contains_key(&r.path)) {
            return Err(LessonError::DanglingEntry {
                id: orphan.id.clone(),
                path: PathBuf::from(&orphan.path),
            });
        }
        Ok(index)
    }

    fn read_body(&self, record: &LessonRecord) -> Result<String> {
        self.body(&record.path)
            .ok_or_else(|| LessonError::NotFound(record.id.clone()))
    }

    fn write_lesson(&self, record: &LessonRecord, body: &str, overwrite: bool) -> Result<()> {
        let mut bodies = self.bodies.borrow_mut();
        if bodies.contains_key(&record.path) && !overwrite {
            return Err(LessonError::AlreadyExists {
                path: PathBuf::from(&record.path),
            });
        }
        bodies.insert(record.path.clone(), body.to_string());
        Ok(())
    }

    fn replace_index(&self, index: &LessonIndex) -> Result<()> {
        *self.index.borrow_mut() = index.clone();
        Ok(())
    }

    fn body_path(&self, level: Level, id: &str) -> String {
        format!("memory/{}/{id}.md", level.folder())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
    }

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, text).expect("write");
    }

    #[test]
    fn test_from_records_rejects_duplicate_ids() {
        let a = LessonRecord::new_case("dup", "A", "lessons/cases/a.md", date(2025, 1, 1));
        let b = LessonRecord::new_case("dup", "B", "lessons/cases/b.md", date(2025, 1, 1));
        let err = LessonIndex::from_records([a, b]).expect_err("duplicate");
        assert!(matches!(err, LessonError::DuplicateId { ref id, .. } if id == "dup"));
    }

    #[test]
    fn test_stats_count_every_level_and_status() {
        let mut p = LessonRecord::new_case("p1", "P", "lessons/patterns/p1.md", date(2025, 1, 1));
        p.level = Level::Pattern;
        p.status = LessonStatus::Validated;
        let c = LessonRecord::new_case("c1", "C", "lessons/cases/c1.md", date(2025, 1, 1));
        let stats = LessonIndex::from_records([p, c]).expect("index").stats();

        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_level[&Level::Case], 1);
        assert_eq!(stats.by_level[&Level::Pattern], 1);
        assert_eq!(stats.by_level[&Level::Principle], 0);
        assert_eq!(stats.by_status[&LessonStatus::Validated], 1);
        assert_eq!(stats.by_status[&LessonStatus::Retired], 0);
    }

    #[test]
    fn test_fs_scan_and_rebuild_roundtrip() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().join("lessons");
        write(&root, "cases/ssh-alias.md", "---\nid: case-ssh-alias\ntags: [ssh]\n---\n# SSH alias\n");
        write(&root, "principles/least-privilege.md", "# Least privilege\n\nGrant the minimum.");
        write(&root, "cases/notes.txt", "ignored");

        let store = FsLessonStore::new(&root);
        let built = store.rebuild_index().expect("rebuild");
        assert_eq!(built.len(), 2);

        let principle = built.get("least-privilege").expect("principle");
        assert_eq!(principle.level, Level::Principle);
        assert_eq!(principle.path, "lessons/principles/least-privilege.md");

        let loaded = store.load_index().expect("load");
        assert_eq!(loaded, built);
    }

    #[test]
    fn test_fs_missing_root_is_empty_index() {
        let dir = TempDir::new().expect("tempdir");
        let store = FsLessonStore::new(dir.path().join("lessons"));
        assert!(store.load_index().expect("load").is_empty());
    }

    #[test]
    fn test_fs_dangling_index_entry_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().join("lessons");
        write(&root, "cases/a.md", "# A");
        let store = FsLessonStore::new(&root);
        store.rebuild_index().expect("rebuild");

        std::fs::remove_file(root.join("cases/a.md")).expect("remove");
        let err = store.load_index().expect_err("dangling");
        assert!(matches!(err, LessonError::DanglingEntry { ref id, .. } if id == "a"));
    }

    fn age_index(store: &FsLessonStore) {
        let an_hour_ago = SystemTime::now() - std::time::Duration::from_secs(3600);
        std::fs::File::options()
            .write(true)
            .open(store.index_path())
            .and_then(|f| f.set_modified(an_hour_ago))
            .expect("set index mtime");
    }

    #[test]
    fn test_fs_body_added_after_index_is_visible() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().join("lessons");
        write(&root, "cases/case-a.md", "---\nid: case-a\ntags: [ssh]\n---\n# Host key mismatch\n");
        let store = FsLessonStore::new(&root);
        store.rebuild_index().expect("rebuild");

        write(&root, "cases/case-b.md", "---\nid: case-b\ntags: [ssh]\n---\n# Known hosts drift\n");
        let loaded = store.load_index().expect("load");
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains("case-b"));
    }

    #[test]
    fn test_fs_body_edited_after_index_is_rescanned() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().join("lessons");
        write(&root, "cases/case-a.md", "---\nid: case-a\ntags: [ssh]\n---\n# Host key mismatch\n");
        let store = FsLessonStore::new(&root);
        store.rebuild_index().expect("rebuild");
        age_index(&store);

        write(&root, "cases/case-a.md", "---\nid: case-a\ntags: [ssh, dns]\n---\n# Host key mismatch\n");
        let loaded = store.load_index().expect("load");
        assert_eq!(loaded.get("case-a").map(|r| r.tags.len()), Some(2));
    }

    #[test]
    fn test_fs_write_lesson_refuses_overwrite() {
        let dir = TempDir::new().expect("tempdir");
        let store = FsLessonStore::new(dir.path().join("lessons"));
        let path = store.body_path(Level::Case, "c1");
        let record = LessonRecord::new_case("c1", "C1", path, date(2025, 1, 1));

        store.write_lesson(&record, "# C1", false).expect("first write");
        let err = store.write_lesson(&record, "# C1 again", false).expect_err("exists");
        assert!(matches!(err, LessonError::AlreadyExists { .. }));
        store.write_lesson(&record, "# C1 again", true).expect("overwrite");
        assert_eq!(store.read_body(&record).expect("body"), "# C1 again");
    }

    #[test]
    fn test_memory_store_is_isolated() {
        let store = MemoryLessonStore::new();
        let path = store.body_path(Level::Case, "c1");
        let record = LessonRecord::new_case("c1", "C1", path, date(2025, 1, 1));
        store.write_lesson(&record, "body", false).expect("write");
        let mut index = store.load_index().expect("load");
        index.upsert(record.clone());
        store.replace_index(&index).expect("replace");

        assert_eq!(store.load_index().expect("reload").get("c1"), Some(&record));
        assert_eq!(MemoryLessonStore::new().load_index().expect("fresh").len(), 0);
    }
}
