//! Core [`Analyzer`] trait and its request/response types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tree::Edit;

// ---------------------------------------------------------------------------
// AnalysisError
// ---------------------------------------------------------------------------

/// Errors from the analysis collaborator.
///
/// Transient variants ([`Request`](Self::Request), [`Timeout`](Self::Timeout))
/// are worth retrying with backoff; the rest are permanent for the current
/// cycle.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// HTTP transport or connection error.
    #[error("analysis request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("analysis request timed out")]
    Timeout,

    /// The response could not be parsed into chunks + edits.
    #[error("failed to parse analysis response: {0}")]
    Parse(String),

    /// The engine returned no usable content.
    #[error("analysis returned an empty response")]
    EmptyResponse,
}

impl AnalysisError {
    /// `true` for failures that a bounded retry may resolve.
    pub fn is_transient(&self) -> bool {
        matches!(self, AnalysisError::Request(_) | AnalysisError::Timeout)
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AnalysisError::Timeout
        } else {
            AnalysisError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Everything the engine needs for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    /// The candidate span from the buffer.
    pub text: &'a str,
    /// Recent transcript (including already-processed text) for context.
    pub transcript_history: &'a str,
    /// Digest of recent tree nodes, from [`Tree::summaries`](crate::tree::Tree::summaries).
    pub tree_summary: &'a str,
    /// Text the previous cycle judged incomplete, resubmitted for
    /// continuity.
    pub incomplete_carry: Option<&'a str>,
}

/// A sub-span of the submitted text, as segmented by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    pub text: String,
    /// `true` when the engine fully processed this span; `false` marks it
    /// for carry into the next cycle.
    #[serde(default)]
    pub is_complete: bool,
}

/// The engine's full answer for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    #[serde(default)]
    pub chunks: Vec<ChunkDescriptor>,
    #[serde(default)]
    pub edits: Vec<Edit>,
}

impl AnalysisOutcome {
    /// Concatenation of all complete chunk texts, space-joined — the text
    /// the buffer will be asked to retire.
    pub fn completed_text(&self) -> String {
        self.chunks
            .iter()
            .filter(|c| c.is_complete)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Concatenation of all incomplete chunk texts, space-joined — the next
    /// cycle's incomplete carry.  `None` when every chunk was complete.
    pub fn incomplete_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .chunks
            .iter()
            .filter(|c| !c.is_complete)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

// ---------------------------------------------------------------------------
// Analyzer trait
// ---------------------------------------------------------------------------

/// Async, object-safe interface for analysis backends.
///
/// Implementations must be `Send + Sync` so they can be shared as
/// `Arc<dyn Analyzer>` across the orchestrator and tests.  Failures must be
/// reported as [`AnalysisError`], never as silently empty results.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest<'_>)
        -> Result<AnalysisOutcome, AnalysisError>;
}

// Compile-time assertion: Box<dyn Analyzer> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Analyzer>) {}
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
