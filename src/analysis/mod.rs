//! The external analysis seam.
//!
//! The language-analysis engine is a black box to this crate: it receives
//! a candidate text span plus context and returns which sub-spans it fully
//! processed ([`ChunkDescriptor`]) and which structural [`Edit`]s to apply.
//!
//! * [`Analyzer`] — async trait every backend implements.
//! * [`ApiAnalyzer`] — production backend for any OpenAI-compatible
//!   `/v1/chat/completions` endpoint.
//! * [`AnalysisError`] — failure taxonomy with a transient/permanent split
//!   that drives the orchestrator's retry policy.

pub mod api;
pub mod engine;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use api::ApiAnalyzer;
pub use engine::{AnalysisError, AnalysisOutcome, AnalysisRequest, Analyzer, ChunkDescriptor};
