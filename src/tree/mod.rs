//! The topic-tree store and its mutation discipline.
//!
//! * [`node`]  — [`Node`], the per-topic record.
//! * [`store`] — [`Tree`], the `id → Node` map with forest invariants, and
//!   [`SharedTree`], the single-writer handle every mutation batch goes
//!   through.
//! * [`apply`] — [`Edit`] (the tagged structural instruction produced by the
//!   analysis engine) and [`TreeActionApplier`], which interprets a batch of
//!   edits against the store.
//!
//! Nodes are only ever created or appended to; deletion does not exist at
//! this layer.  Ids are allocated from a monotonic counter and never reused.

pub mod apply;
pub mod node;
pub mod store;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use apply::{ApplyReport, Edit, EditError, NodeRef, TreeActionApplier};
pub use node::Node;
pub use store::{new_shared_tree, SharedTree, Tree, TreeError};
