//! Structural edits and their batch application.
//!
//! The analysis engine hands back a batch of [`Edit`]s — a tagged union
//! deserialized strictly at the boundary, so a malformed payload is
//! rejected by serde before it reaches any use site.
//!
//! A `Create` earlier in a batch may be referenced by a later edit through
//! [`NodeRef::Created`] (its index among the batch's creates); ids are
//! assigned deterministically during the same apply call, so the mapping
//! resolves without a second pass.
//!
//! On the first failed edit the applier aborts the rest of the batch and
//! reports the applied/failed split.  Already-applied edits stand — the
//! mutations are append-only, so a partially applied batch is safe to
//! leave in place.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tree::store::{Tree, TreeError};

// ---------------------------------------------------------------------------
// NodeRef
// ---------------------------------------------------------------------------

/// Reference to a node from within an edit batch.
///
/// Wire form: `{"existing": 5}` for a node already in the tree, or
/// `{"created": 0}` for the first node created by this same batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRef {
    /// An id already present in the tree.
    Existing(u64),
    /// Index into this batch's `Create` edits, in order of appearance.
    Created(usize),
}

// ---------------------------------------------------------------------------
// Edit
// ---------------------------------------------------------------------------

/// A structural instruction from the analysis engine.
///
/// Wire form is tagged by `"action"`:
///
/// ```json
/// {"action": "CREATE", "parent": {"existing": 1}, "title": "New topic",
///  "summary": "…", "content": "…", "relationship": "child of"}
/// {"action": "APPEND", "target": {"created": 0}, "content": "…"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "UPPERCASE")]
pub enum Edit {
    /// Create a new node.  `parent: None` creates a new root.
    Create {
        #[serde(default)]
        parent: Option<NodeRef>,
        title: String,
        #[serde(default)]
        summary: String,
        content: String,
        #[serde(default)]
        relationship: Option<String>,
    },
    /// Append content to an existing (or just-created) node.
    Append { target: NodeRef, content: String },
}

// ---------------------------------------------------------------------------
// EditError / ApplyReport
// ---------------------------------------------------------------------------

/// Why a batch stopped early.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EditError {
    /// The tree rejected the edit (unknown parent/target id).
    #[error("edit {index} failed: {source}")]
    Tree {
        index: usize,
        #[source]
        source: TreeError,
    },

    /// The edit referenced batch create `reference`, but the batch has not
    /// (yet) created that many nodes.
    #[error("edit {index} references batch create #{reference}, which does not exist")]
    UnresolvedReference { index: usize, reference: usize },
}

/// Outcome of one batch application.
///
/// `touched` is the complete set of node ids modified by the batch —
/// created nodes, append targets, and parents whose child lists changed —
/// which is exactly what the renderer needs to refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Every node id modified by the batch.
    pub touched: BTreeSet<u64>,
    /// Ids allocated to this batch's `Create` edits, in order.
    pub created: Vec<u64>,
    /// How many edits were applied before the batch stopped.
    pub applied: usize,
    /// `None` when the whole batch applied cleanly.
    pub error: Option<EditError>,
}

impl ApplyReport {
    /// `true` when every edit in the batch was applied.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

// ---------------------------------------------------------------------------
// TreeActionApplier
// ---------------------------------------------------------------------------

/// Interprets edit batches against a [`Tree`].
///
/// Stateless; the tree is passed per call so the caller controls the
/// critical section (lock, apply, unlock — nothing else inside).
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeActionApplier;

impl TreeActionApplier {
    pub fn new() -> Self {
        Self
    }

    /// Apply `edits` in order.  Stops at the first failure; see the module
    /// docs for the partial-application contract.
    pub fn apply(&self, tree: &mut Tree, edits: &[Edit]) -> ApplyReport {
        let mut report = ApplyReport::default();
        log::info!("applier: applying {} edits", edits.len());

        for (index, edit) in edits.iter().enumerate() {
            let result = self.apply_one(tree, edit, index, &mut report);
            match result {
                Ok(()) => report.applied += 1,
                Err(error) => {
                    log::error!(
                        "applier: batch aborted at edit {index} ({} of {} applied): {error}",
                        report.applied,
                        edits.len()
                    );
                    report.error = Some(error);
                    break;
                }
            }
        }

        report
    }

    fn apply_one(
        &self,
        tree: &mut Tree,
        edit: &Edit,
        index: usize,
        report: &mut ApplyReport,
    ) -> Result<(), EditError> {
        match edit {
            Edit::Create {
                parent,
                title,
                summary,
                content,
                relationship,
            } => {
                let parent_id = match parent {
                    None => None,
                    Some(node_ref) => Some(resolve(*node_ref, &report.created, index)?),
                };

                let id = tree
                    .create_node(
                        parent_id,
                        title,
                        summary,
                        content,
                        relationship.as_deref(),
                    )
                    .map_err(|source| EditError::Tree { index, source })?;

                report.created.push(id);
                report.touched.insert(id);
                // The parent's child list changed, so it needs re-rendering.
                if let Some(parent_id) = parent_id {
                    report.touched.insert(parent_id);
                }
                Ok(())
            }

            Edit::Append { target, content } => {
                let id = resolve(*target, &report.created, index)?;
                tree.append_content(id, content)
                    .map_err(|source| EditError::Tree { index, source })?;
                report.touched.insert(id);
                Ok(())
            }
        }
    }
}

/// Resolve a [`NodeRef`] against the creates applied so far in this batch.
fn resolve(node_ref: NodeRef, created: &[u64], index: usize) -> Result<u64, EditError> {
    match node_ref {
        NodeRef::Existing(id) => Ok(id),
        NodeRef::Created(reference) => {
            created
                .get(reference)
                .copied()
                .ok_or(EditError::UnresolvedReference { index, reference })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn create(parent: Option<NodeRef>, title: &str) -> Edit {
        Edit::Create {
            parent,
            title: title.to_string(),
            summary: format!("summary of {title}"),
            content: format!("content of {title}"),
            relationship: Some("child of".to_string()),
        }
    }

    // ---- basic application ---

    #[test]
    fn create_then_create_under_provisional_parent() {
        let mut tree = Tree::new();
        let applier = TreeActionApplier::new();

        // Scenario: root "A", then "B" under A, both in one batch.
        let report = applier.apply(
            &mut tree,
            &[
                create(None, "A"),
                create(Some(NodeRef::Created(0)), "B"),
            ],
        );

        assert!(report.is_complete());
        assert_eq!(tree.len(), 2);
        let (a, b) = (report.created[0], report.created[1]);
        assert_eq!(tree.parent_id(b), Some(a));
        assert!(tree.check_forest().is_ok());
    }

    #[test]
    fn append_to_provisional_node() {
        let mut tree = Tree::new();
        let applier = TreeActionApplier::new();

        let report = applier.apply(
            &mut tree,
            &[
                create(None, "Topic"),
                Edit::Append {
                    target: NodeRef::Created(0),
                    content: "more detail".to_string(),
                },
            ],
        );

        assert!(report.is_complete());
        let id = report.created[0];
        assert!(tree.node(id).unwrap().content.contains("more detail"));
    }

    #[test]
    fn touched_includes_parent_of_created_node() {
        let mut tree = Tree::new();
        let root = tree.create_node(None, "Root", "", "", None).unwrap();
        let applier = TreeActionApplier::new();

        let report = applier.apply(&mut tree, &[create(Some(NodeRef::Existing(root)), "Child")]);

        assert!(report.touched.contains(&root));
        assert!(report.touched.contains(&report.created[0]));
    }

    // ---- failure handling ---

    #[test]
    fn unknown_target_aborts_rest_of_batch() {
        let mut tree = Tree::new();
        let applier = TreeActionApplier::new();

        let report = applier.apply(
            &mut tree,
            &[
                create(None, "Applied"),
                Edit::Append {
                    target: NodeRef::Existing(99),
                    content: "never lands".to_string(),
                },
                create(None, "Skipped"),
            ],
        );

        // First edit stands, second failed, third never ran.
        assert_eq!(report.applied, 1);
        assert_eq!(tree.len(), 1);
        assert!(matches!(
            report.error,
            Some(EditError::Tree {
                index: 1,
                source: TreeError::UnknownNode(99)
            })
        ));
    }

    #[test]
    fn unresolved_provisional_reference_aborts() {
        let mut tree = Tree::new();
        let applier = TreeActionApplier::new();

        let report = applier.apply(
            &mut tree,
            &[Edit::Append {
                target: NodeRef::Created(0),
                content: "no create before me".to_string(),
            }],
        );

        assert_eq!(report.applied, 0);
        assert!(matches!(
            report.error,
            Some(EditError::UnresolvedReference {
                index: 0,
                reference: 0
            })
        ));
    }

    #[test]
    fn unknown_parent_on_create_aborts() {
        let mut tree = Tree::new();
        let applier = TreeActionApplier::new();

        let report = applier.apply(&mut tree, &[create(Some(NodeRef::Existing(7)), "X")]);

        assert_eq!(report.applied, 0);
        assert!(tree.is_empty());
        assert!(matches!(
            report.error,
            Some(EditError::Tree {
                index: 0,
                source: TreeError::UnknownParent(7)
            })
        ));
    }

    #[test]
    fn empty_batch_is_a_complete_noop() {
        let mut tree = Tree::new();
        let report = TreeActionApplier::new().apply(&mut tree, &[]);
        assert!(report.is_complete());
        assert!(report.touched.is_empty());
        assert_eq!(report.applied, 0);
    }

    // ---- wire format ---

    #[test]
    fn create_edit_deserializes_from_tagged_json() {
        let json = r#"{
            "action": "CREATE",
            "parent": {"existing": 3},
            "title": "New topic",
            "summary": "short",
            "content": "body",
            "relationship": "child of"
        }"#;

        let edit: Edit = serde_json::from_str(json).unwrap();
        assert_eq!(
            edit,
            Edit::Create {
                parent: Some(NodeRef::Existing(3)),
                title: "New topic".to_string(),
                summary: "short".to_string(),
                content: "body".to_string(),
                relationship: Some("child of".to_string()),
            }
        );
    }

    #[test]
    fn append_edit_deserializes_with_provisional_target() {
        let json = r#"{"action": "APPEND", "target": {"created": 1}, "content": "tail"}"#;
        let edit: Edit = serde_json::from_str(json).unwrap();
        assert_eq!(
            edit,
            Edit::Append {
                target: NodeRef::Created(1),
                content: "tail".to_string(),
            }
        );
    }

    #[test]
    fn create_without_optional_fields_defaults_them() {
        let json = r#"{"action": "CREATE", "title": "Root topic", "content": "body"}"#;
        let edit: Edit = serde_json::from_str(json).unwrap();
        match edit {
            Edit::Create {
                parent,
                summary,
                relationship,
                ..
            } => {
                assert!(parent.is_none());
                assert!(summary.is_empty());
                assert!(relationship.is_none());
            }
            _ => panic!("expected Create"),
        }
    }

    #[test]
    fn malformed_payload_is_rejected_at_the_boundary() {
        // Missing required `content`.
        let json = r#"{"action": "APPEND", "target": {"existing": 1}}"#;
        assert!(serde_json::from_str::<Edit>(json).is_err());
        // Unknown action tag.
        let json = r#"{"action": "DELETE", "target": {"existing": 1}}"#;
        assert!(serde_json::from_str::<Edit>(json).is_err());
    }
}
