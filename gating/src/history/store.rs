//! History store: persistence of accepted sections keyed by document id.

use super::History;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History I/O failed on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt history record at {path}:{line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("History record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One stored section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub document_id: String,
    /// 1-based position of the section within its document
    pub section_id: usize,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStatistics {
    pub total_entries: usize,
    pub total_characters: usize,
    /// Section ids present, ascending
    pub sections: Vec<usize>,
}

/// Append-log of accepted sections, one log per document id.
pub trait HistoryStore {
    /// Append `content` as the next section of `document_id`.
    fn append(
        &mut self,
        document_id: &str,
        content: &str,
        metadata: serde_json::Value,
    ) -> Result<HistoryEntry, HistoryError>;

    /// All entries of `document_id` in insertion order.
    fn entries(&self, document_id: &str) -> Result<Vec<HistoryEntry>, HistoryError>;

    /// Remove every entry of `document_id`, returning how many were dropped.
    fn clear(&mut self, document_id: &str) -> Result<usize, HistoryError>;

    fn read_all(&self, document_id: &str) -> Result<Vec<String>, HistoryError> {
        Ok(self
            .entries(document_id)?
            .into_iter()
            .map(|e| e.content)
            .collect())
    }

    /// Seed an in-process [`History`] from the store.
    fn load(&self, document_id: &str) -> Result<History, HistoryError> {
        self.read_all(document_id).map(History::from)
    }

    fn statistics(&self, document_id: &str) -> Result<HistoryStatistics, HistoryError> {
        let entries = self.entries(document_id)?;
        let sections: BTreeSet<usize> = entries.iter().map(|e| e.section_id).collect();
        Ok(HistoryStatistics {
            total_entries: entries.len(),
            total_characters: entries.iter().map(|e| e.content.chars().count()).sum(),
            sections: sections.into_iter().collect(),
        })
    }
}

fn new_entry(
    document_id: &str,
    section_id: usize,
    content: &str,
    metadata: serde_json::Value,
) -> HistoryEntry {
    HistoryEntry {
        document_id: document_id.to_string(),
        section_id,
        content: content.to_string(),
        timestamp: Utc::now(),
        metadata,
    }
}

/// Process-local store; lost on exit.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    entries: Vec<HistoryEntry>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn append(
        &mut self,
        document_id: &str,
        content: &str,
        metadata: serde_json::Value,
    ) -> Result<HistoryEntry, HistoryError> {
        let section_id = self
            .entries
            .iter()
            .filter(|e| e.document_id == document_id)
            .count()
            + 1;
        let entry = new_entry(document_id, section_id, content, metadata);
        self.entries.push(entry.clone());
        Ok(entry)
    }

    fn entries(&self, document_id: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.document_id == document_id)
            .cloned()
            .collect())
    }

    fn clear(&mut self, document_id: &str) -> Result<usize, HistoryError> {
        let before = self.entries.len();
        self.entries.retain(|e| e.document_id != document_id);
        Ok(before - self.entries.len())
    }
}

/// JSON-lines file shared by all documents; one [`HistoryEntry`] per line.
///
/// Appends never rewrite the file; `clear` rewrites it without the
/// document's lines.
#[derive(Debug, Clone)]
pub struct JsonlHistoryStore {
    path: PathBuf,
}

impl JsonlHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_every_entry(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(e)),
        };

        let mut entries = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| self.io_err(e))?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: HistoryEntry =
                serde_json::from_str(&line).map_err(|source| HistoryError::Corrupt {
                    path: self.path.clone(),
                    line: idx + 1,
                    source,
                })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

impl HistoryStore for JsonlHistoryStore {
    fn append(
        &mut self,
        document_id: &str,
        content: &str,
        metadata: serde_json::Value,
    ) -> Result<HistoryEntry, HistoryError> {
        let section_id = self.entries(document_id)?.len() + 1;
        let entry = new_entry(document_id, section_id, content, metadata);
        let json = serde_json::to_string(&entry)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        writeln!(file, "{json}").map_err(|e| self.io_err(e))?;

        tracing::debug!(
            path = %self.path.display(),
            document_id,
            section_id,
            "Appended history entry"
        );
        Ok(entry)
    }

    fn entries(&self, document_id: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        Ok(self
            .read_every_entry()?
            .into_iter()
            .filter(|e| e.document_id == document_id)
            .collect())
    }

    fn clear(&mut self, document_id: &str) -> Result<usize, HistoryError> {
        let all = self.read_every_entry()?;
        let (dropped, kept): (Vec<_>, Vec<_>) =
            all.into_iter().partition(|e| e.document_id == document_id);
        if dropped.is_empty() {
            return Ok(0);
        }

        let mut out = String::new();
        for entry in &kept {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        std::fs::write(&self.path, out).map_err(|e| self.io_err(e))?;

        tracing::info!(
            path = %self.path.display(),
            document_id,
            removed = dropped.len(),
            "Cleared document history"
        );
        Ok(dropped.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exercise(store: &mut dyn HistoryStore) {
        store.append("doc-a", "First section.", json!({"iterations": 1})).unwrap();
        store.append("doc-b", "Other doc.", json!(null)).unwrap();
        let second = store.append("doc-a", "Second section.", json!({})).unwrap();
        assert_eq!(second.section_id, 2);

        assert_eq!(
            store.read_all("doc-a").unwrap(),
            vec!["First section.".to_string(), "Second section.".to_string()]
        );

        let stats = store.statistics("doc-a").unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.total_characters, 29);
        assert_eq!(stats.sections, vec![1, 2]);

        assert_eq!(store.clear("doc-a").unwrap(), 2);
        assert!(store.read_all("doc-a").unwrap().is_empty());
        assert_eq!(store.read_all("doc-b").unwrap(), vec!["Other doc.".to_string()]);
        assert_eq!(store.clear("missing").unwrap(), 0);
    }

    #[test]
    fn test_in_memory_store_contract() {
        exercise(&mut InMemoryHistoryStore::new());
    }

    #[test]
    fn test_jsonl_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&mut JsonlHistoryStore::new(dir.path().join("history.jsonl")));
    }

    #[test]
    fn test_jsonl_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        {
            let mut store = JsonlHistoryStore::new(&path);
            store.append("doc", "Persisted.", json!({"section": 1})).unwrap();
        }
        let reopened = JsonlHistoryStore::new(&path);
        let history = reopened.load("doc").unwrap();
        assert_eq!(history.entries(), &["Persisted.".to_string()]);
        let entries = reopened.entries("doc").unwrap();
        assert_eq!(entries[0].metadata["section"], 1);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlHistoryStore::new(dir.path().join("absent.jsonl"));
        assert!(store.read_all("doc").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_line_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        std::fs::write(&path, "not json\n").unwrap();
        let err = JsonlHistoryStore::new(&path).read_all("doc").unwrap_err();
        assert!(matches!(err, HistoryError::Corrupt { line: 1, .. }));
    }
}
