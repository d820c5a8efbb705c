//! History of analyzed snippets
//!
//! Stored as JSON in `~/.local/share/codelift/history.json` (platform data dir),
//! newest entry first. Writers take an exclusive `fs2` lock on a sibling `.lock`
//! file so concurrent invocations do not lose entries.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::source::split_markers;

const LOCK_TIMEOUT_SECS: u64 = 5;
const LOCK_RETRY_MS: u64 = 50;
const PREVIEW_MAX_CHARS: usize = 60;

/// One analyzed snippet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub source: String,
}

impl HistoryEntry {
    /// Short label for listings. A multi-file snippet shows its first path and
    /// how many files follow; anything else shows its first non-blank line.
    pub fn preview(&self) -> String {
        let files = split_markers(&self.source);
        if let Some(first) = files.first().filter(|f| !f.path.is_empty()) {
            return match files.len() {
                1 => first.path.clone(),
                n => format!("{} (+{} more)", first.path, n - 1),
            };
        }
        match self.source.lines().map(str::trim).find(|l| !l.is_empty()) {
            Some(line) if line.chars().count() > PREVIEW_MAX_CHARS => {
                let cut: String = line.chars().take(PREVIEW_MAX_CHARS).collect();
                format!("{}...", cut)
            }
            Some(line) => line.to_string(),
            None => "Empty Snippet".to_string(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    entries: Vec<HistoryEntry>,
}

struct HistoryLock {
    file: fs::File,
}

impl Drop for HistoryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// File-backed snippet history
pub struct HistoryStore {
    path: PathBuf,
    limit: usize,
}

impl HistoryStore {
    /// Store in the platform data directory.
    pub fn open(limit: usize) -> Result<Self> {
        let dir = dirs::data_dir()
            .context("Could not determine data directory")?
            .join("codelift");
        Ok(Self::at(dir.join("history.json"), limit))
    }

    /// Store at an explicit path.
    pub fn at(path: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            path: path.into(),
            limit: limit.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corrupt_path(&self) -> PathBuf {
        self.path.with_extension("json.corrupt")
    }

    fn lock(&self) -> Result<HistoryLock> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).context("Failed to create history directory")?;
        }
        let lock_path = self.path.with_extension("lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        let start = Instant::now();
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(HistoryLock { file }),
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if start.elapsed() >= Duration::from_secs(LOCK_TIMEOUT_SECS) {
                        anyhow::bail!("Timed out waiting for history lock ({}s)", LOCK_TIMEOUT_SECS);
                    }
                    std::thread::sleep(Duration::from_millis(LOCK_RETRY_MS));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn read(&self) -> Result<HistoryFile> {
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(file) => Ok(file),
                Err(err) => {
                    let backup = self.corrupt_path();
                    if fs::rename(&self.path, &backup).is_err() {
                        let _ = fs::write(&backup, &content);
                    }
                    tracing::warn!(
                        "History file {} is unreadable ({}). A backup was saved to {} and history starts fresh.",
                        self.path.display(),
                        err,
                        backup.display()
                    );
                    Ok(HistoryFile::default())
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(HistoryFile::default()),
            Err(err) => Err(err)
                .with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }

    fn write(&self, history: &HistoryFile) -> Result<()> {
        let content = serde_json::to_string_pretty(history)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600));
        }

        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))
    }

    fn modify<T>(&self, update: impl FnOnce(&mut Vec<HistoryEntry>) -> T) -> Result<T> {
        let _lock = self.lock()?;
        let mut history = self.read()?;
        let result = update(&mut history.entries);
        self.write(&history)?;
        Ok(result)
    }

    /// Record a snippet at the front. Returns `None` when it repeats the newest entry.
    pub fn record(&self, source: &str) -> Result<Option<HistoryEntry>> {
        let limit = self.limit;
        self.modify(|entries| {
            if entries.first().map(|e| e.source.as_str()) == Some(source) {
                return None;
            }
            let entry = HistoryEntry {
                id: Uuid::new_v4(),
                created_at: Utc::now(),
                source: source.to_string(),
            };
            entries.insert(0, entry.clone());
            entries.truncate(limit);
            Some(entry)
        })
    }

    /// All entries, newest first.
    pub fn list(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.read()?.entries)
    }

    /// Entry by zero-based position in `list` order.
    pub fn get(&self, index: usize) -> Result<Option<HistoryEntry>> {
        Ok(self.read()?.entries.into_iter().nth(index))
    }

    pub fn remove(&self, index: usize) -> Result<Option<HistoryEntry>> {
        self.modify(|entries| (index < entries.len()).then(|| entries.remove(index)))
    }

    /// Delete every entry. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        self.modify(|entries| {
            let count = entries.len();
            entries.clear();
            count
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir, limit: usize) -> HistoryStore {
        HistoryStore::at(dir.path().join("data").join("history.json"), limit)
    }

    #[test]
    fn test_record_newest_first() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir, 10);
        history.record("<p>one</p>").unwrap();
        history.record("<p>two</p>").unwrap();

        let entries = history.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].source, "<p>two</p>");
        assert_eq!(history.get(1).unwrap().unwrap().source, "<p>one</p>");
        assert!(history.get(2).unwrap().is_none());
    }

    #[test]
    fn test_consecutive_duplicate_is_skipped() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir, 10);
        assert!(history.record("same").unwrap().is_some());
        assert!(history.record("same").unwrap().is_none());
        history.record("other").unwrap();
        assert!(history.record("same").unwrap().is_some());
        assert_eq!(history.list().unwrap().len(), 3);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir, 2);
        for snippet in ["a", "b", "c"] {
            history.record(snippet).unwrap();
        }
        let sources: Vec<_> = history
            .list()
            .unwrap()
            .into_iter()
            .map(|e| e.source)
            .collect();
        assert_eq!(sources, vec!["c", "b"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir, 10);
        for snippet in ["a", "b", "c"] {
            history.record(snippet).unwrap();
        }
        assert_eq!(history.remove(1).unwrap().unwrap().source, "b");
        assert!(history.remove(5).unwrap().is_none());
        assert_eq!(history.clear().unwrap(), 2);
        assert!(history.list().unwrap().is_empty());
    }

    #[test]
    fn test_missing_or_corrupt_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir, 10);
        assert!(history.list().unwrap().is_empty());

        fs::create_dir_all(history.path().parent().unwrap()).unwrap();
        fs::write(history.path(), "{\"entries\": [{\"id\": ").unwrap();
        history.record("fresh").unwrap();
        assert_eq!(history.list().unwrap().len(), 1);

        // the unreadable bytes survive next to the fresh log
        let backup = history.path().with_extension("json.corrupt");
        assert_eq!(
            fs::read_to_string(backup).unwrap(),
            "{\"entries\": [{\"id\": "
        );
    }

    #[test]
    fn test_preview() {
        let entry = |source: &str| HistoryEntry {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            source: source.to_string(),
        };
        assert_eq!(entry("\n  <div>\n</div>").preview(), "<div>");
        assert_eq!(entry("   \n\t").preview(), "Empty Snippet");
        let long = entry(&"x".repeat(80)).preview();
        assert!(long.ends_with("..."));
        assert_eq!(long.chars().count(), PREVIEW_MAX_CHARS + 3);
    }

    #[test]
    fn test_preview_of_multi_file_snippet() {
        let blob = crate::source::join_with_markers(&[
            crate::source::SourceFile {
                path: "index.html".to_string(),
                content: "<h1>Shop</h1>".to_string(),
            },
            crate::source::SourceFile {
                path: "js/cart.js".to_string(),
                content: "var total = 0;".to_string(),
            },
        ]);
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            source: blob,
        };
        assert_eq!(entry.preview(), "index.html (+1 more)");
    }
}
