//! History — accepted sections of the document being written.
//!
//! [`History`] is the in-process value the scoring engine compares drafts
//! against. It is passed explicitly to whoever needs it; there is no shared
//! global. [`HistoryStore`] is the persistence contract behind it.

pub mod store;

pub use store::{
    HistoryEntry, HistoryError, HistoryStatistics, HistoryStore, InMemoryHistoryStore,
    JsonlHistoryStore,
};

use serde::{Deserialize, Serialize};

/// Ordered, append-only list of accepted section texts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(Vec<String>);

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, content: impl Into<String>) {
        self.0.push(content.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The last `k` entries, oldest first.
    pub fn recent(&self, k: usize) -> &[String] {
        &self.0[self.0.len().saturating_sub(k)..]
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for History {
    fn from(entries: Vec<String>) -> Self {
        Self(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_order() {
        let mut h = History::new();
        assert!(h.is_empty());
        h.push("one");
        h.push(String::from("two"));
        assert_eq!(h.entries(), &["one".to_string(), "two".to_string()]);
        assert_eq!(h.last(), Some("two"));
    }

    #[test]
    fn test_recent_clamps() {
        let h = History::from(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(h.recent(2), &["b".to_string(), "c".to_string()]);
        assert_eq!(h.recent(10).len(), 3);
        assert!(h.recent(0).is_empty());
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let h = History::from(vec!["a".into()]);
        assert_eq!(serde_json::to_string(&h).unwrap(), r#"["a"]"#);
    }
}
