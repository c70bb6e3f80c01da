//! A single topic node.

use std::collections::BTreeSet;
use std::time::SystemTime;

/// One topic in the tree.
///
/// `content` is an accumulated markdown-like body: it grows by appending
/// (newline-joined) and is never truncated by this core.  `touched` is the
/// node's position in the tree's logical modification sequence — recency
/// queries sort on it rather than on wall time, which under rapid mutation
/// cannot break ties reliably.  The wall-clock timestamps are metadata for
/// display only.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: u64,
    /// Short human-readable topic title.
    pub title: String,
    /// One-line summary; may be empty.
    pub summary: String,
    /// Accumulated body text.
    pub content: String,
    /// `None` only for roots.
    pub parent_id: Option<u64>,
    /// Children in creation order.
    pub child_ids: Vec<u64>,
    /// Edge label describing how this node relates to its parent
    /// (e.g. "child of", "example of").  `None` for roots.
    pub relationship: Option<String>,
    pub tags: BTreeSet<String>,
    pub created_at: SystemTime,
    pub modified_at: SystemTime,
    /// Logical modification sequence number, assigned by the tree's clock.
    pub(crate) touched: u64,
}

impl Node {
    pub(crate) fn new(
        id: u64,
        title: &str,
        summary: &str,
        content: &str,
        parent_id: Option<u64>,
        relationship: Option<&str>,
        touched: u64,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            title: title.to_string(),
            summary: summary.to_string(),
            content: content.to_string(),
            parent_id,
            child_ids: Vec::new(),
            relationship: relationship.map(str::to_string),
            tags: BTreeSet::new(),
            created_at: now,
            modified_at: now,
            touched,
        }
    }

    /// Append `text` to the body, newline-joined.  Never destructive: the
    /// body grows by exactly the appended text (plus the joining newline
    /// when the body was non-empty).
    pub(crate) fn append(&mut self, text: &str, touched: u64) {
        if !self.content.is_empty() {
            self.content.push('\n');
        }
        self.content.push_str(text);
        self.modified_at = SystemTime::now();
        self.touched = touched;
    }

    /// `true` when this node has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
