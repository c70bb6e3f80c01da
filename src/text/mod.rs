//! Leaf text utilities — no dependencies on the rest of the crate.
//!
//! * [`sentence`] — complete-sentence extraction, sentence splitting and
//!   duplicate removal, tuned for noisy speech transcripts.
//! * [`matcher`] — [`FuzzyTextMatcher`], similarity scoring and best-window
//!   search used to reconcile analysis output against the pending buffer.

pub mod matcher;
pub mod sentence;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use matcher::{FuzzyTextMatcher, TextMatch};
pub use sentence::{deduplicate_sentences, extract_complete_sentences, split_into_sentences};
