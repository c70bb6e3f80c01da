//! The tree container: id allocation, linkage, recency, summaries.
//!
//! [`Tree`] owns the full `id → Node` map and enforces the forest
//! invariant: every non-root's parent exists and lists it among its
//! children, and there are no cycles (parents are always pre-existing
//! nodes, so a new edge can never close a loop).
//!
//! All structural changes from the analysis pipeline go through
//! [`TreeActionApplier`](crate::tree::TreeActionApplier); background
//! reorganization shares the same [`SharedTree`] mutex, so batches from the
//! two never interleave.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::tree::node::Node;

// ---------------------------------------------------------------------------
// TreeError
// ---------------------------------------------------------------------------

/// Errors from direct tree mutation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TreeError {
    /// A create referenced a parent id that does not exist.
    #[error("unknown parent node {0}")]
    UnknownParent(u64),

    /// An append referenced a node id that does not exist.
    #[error("unknown node {0}")]
    UnknownNode(u64),
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// The topic-tree store.
///
/// Ids start at 1, come from a monotonic counter and are never reused.
/// The logical clock ticks on every mutation and stamps each node's
/// `touched` sequence, which is the sort key for recency.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: HashMap<u64, Node>,
    next_id: u64,
    clock: u64,
}

impl Tree {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_id: 1,
            clock: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Create a node under `parent` (`None` for a new root) and return its
    /// id.  The id is allocated only after the parent is validated, so a
    /// failed create never burns an id.
    pub fn create_node(
        &mut self,
        parent: Option<u64>,
        title: &str,
        summary: &str,
        content: &str,
        relationship: Option<&str>,
    ) -> Result<u64, TreeError> {
        if let Some(parent_id) = parent {
            if !self.nodes.contains_key(&parent_id) {
                return Err(TreeError::UnknownParent(parent_id));
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.clock += 1;

        let node = Node::new(
            id,
            title,
            summary,
            content,
            parent,
            relationship,
            self.clock,
        );
        self.nodes.insert(id, node);

        if let Some(parent_id) = parent {
            // Parent existence checked above.
            if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                parent_node.child_ids.push(id);
            }
        }

        log::info!("tree: created node {id} '{title}' (parent {parent:?})");
        Ok(id)
    }

    /// Append `text` to a node's body (newline-joined, never destructive).
    pub fn append_content(&mut self, id: u64, text: &str) -> Result<(), TreeError> {
        let clock = self.clock + 1;
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.append(text, clock);
                self.clock = clock;
                log::info!("tree: appended {} chars to node {id}", text.len());
                Ok(())
            }
            None => Err(TreeError::UnknownNode(id)),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn node(&self, id: u64) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of the `n` most recently modified nodes, newest first.
    ///
    /// Ordered by the logical modification sequence, not wall time, so the
    /// order is stable under rapid successive mutations.
    pub fn recent_nodes(&self, n: usize) -> Vec<u64> {
        let mut ids: Vec<u64> = self.nodes.keys().copied().collect();
        ids.sort_by_key(|id| std::cmp::Reverse(self.nodes[id].touched));
        ids.truncate(n);
        ids
    }

    /// Parent of `id`, or `None` when `id` is a root **or unknown**.
    ///
    /// The conflation is deliberate and callers must not distinguish the
    /// two cases through this call alone; use [`contains`](Self::contains)
    /// first when the difference matters.
    pub fn parent_id(&self, id: u64) -> Option<u64> {
        self.nodes.get(&id).and_then(|n| n.parent_id)
    }

    /// Root node ids, in id order.
    pub fn roots(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .nodes
            .values()
            .filter(|n| n.is_root())
            .map(|n| n.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// A compact "Title: summary" digest of the most recent nodes, used as
    /// the tree-summary input to the analysis engine.
    pub fn summaries(&self, max_nodes: usize) -> String {
        if self.nodes.is_empty() {
            return "No existing nodes yet".to_string();
        }

        self.recent_nodes(max_nodes)
            .into_iter()
            .filter_map(|id| self.nodes.get(&id))
            .map(|node| format!("[{}] {}: {}", node.id, node.title, node.summary))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Verify the forest invariant; returns the offending node id on the
    /// first violation found.  Cheap enough to run in tests after every
    /// batch.
    #[cfg(test)]
    pub(crate) fn check_forest(&self) -> Result<(), u64> {
        for node in self.nodes.values() {
            if let Some(parent_id) = node.parent_id {
                match self.nodes.get(&parent_id) {
                    Some(parent) if parent.child_ids.contains(&node.id) => {}
                    _ => return Err(node.id),
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SharedTree
// ---------------------------------------------------------------------------

/// Thread-safe handle to a [`Tree`].
///
/// One exclusive critical section per mutation batch: lock, apply, unlock.
/// Never hold the lock across an `.await` — the analysis call in
/// particular must run lock-free.
pub type SharedTree = Arc<Mutex<Tree>>;

/// Construct a [`SharedTree`] wrapping an empty [`Tree`].
pub fn new_shared_tree() -> SharedTree {
    Arc::new(Mutex::new(Tree::new()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
