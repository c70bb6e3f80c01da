//! Streaming voice-transcript → topic-tree core.
//!
//! This crate ingests a continuous stream of transcribed speech and
//! incrementally builds a tree of topic nodes.  The hard part is not the
//! LLM call (an external collaborator behind the [`analysis::Analyzer`]
//! trait) but the streaming reconciliation core: deciding when enough text
//! has accumulated, matching the possibly-reworded "fully processed" text
//! back against the original buffer, retiring that text without loss or
//! duplication, and atomically applying structural edits to a shared tree.
//!
//! # Module map
//!
//! * [`config`]   — settings, TOML persistence, fail-fast validation.
//! * [`text`]     — leaf utilities: sentence heuristics + fuzzy matching.
//! * [`buffer`]   — the pending-text state machine ([`buffer::BufferManager`]).
//! * [`tree`]     — the node store and the edit applier.
//! * [`analysis`] — the async analysis seam + OpenAI-compatible backend.
//! * [`pipeline`] — the [`pipeline::ChunkProcessor`] orchestrator and the
//!   renderer seam.
//!
//! # One streaming cycle
//!
//! ```text
//! raw text ─▶ BufferManager::add_text
//!   └─▶ ready_text()                      (empty → await more text)
//!         └─▶ Analyzer::analyze(candidate, history, tree summary, carry)
//!               ├─ Err transient → bounded backoff retry
//!               ├─ Err permanent → cycle fails, buffer untouched
//!               └─ Ok { chunks, edits }
//!                     └─▶ flush_completely_processed_text(complete chunks)
//!                           ├─ Err → surface, keep buffer, drop edits
//!                           └─ Ok  → TreeActionApplier::apply(edits)
//!                                      └─▶ Renderer::render(tree, touched)
//! ```
//!
//! The buffer is the single source of truth: it only ever shrinks after a
//! verified match, so no failure mode can silently lose transcript text.

pub mod analysis;
pub mod buffer;
pub mod config;
pub mod pipeline;
pub mod text;
pub mod tree;
