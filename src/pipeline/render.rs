//! Output seam for tree snapshots.

use std::collections::BTreeSet;

use crate::tree::Tree;

/// Consumes a tree snapshot after each successful apply.
///
/// Implementations receive a clone of the tree taken inside the critical
/// section, so they may take as long as they like without blocking the
/// pipeline.  `updated` accumulates every node id touched since the last
/// render, letting incremental renderers rewrite only what changed.
pub trait Renderer: Send + Sync {
    fn render(&self, tree: &Tree, updated: &BTreeSet<u64>) -> anyhow::Result<()>;
}

// Compile-time assertion: Box<dyn Renderer> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Renderer>) {}
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
