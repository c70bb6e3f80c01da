//! The pending-text state machine.
//!
//! # State machine
//!
//! ```text
//! Empty ──add_text──▶ Accumulating
//!   Accumulating ──ready_text() non-empty──▶ ReadyToFlush
//!     ReadyToFlush ──flush ok──▶ Accumulating   (minus the consumed span)
//!     ReadyToFlush ──flush err─▶ Accumulating   (buffer unchanged, error surfaced)
//! ```
//!
//! `ready_text` is a pure read; only a successful
//! [`flush_completely_processed_text`](BufferManager::flush_completely_processed_text)
//! ever shortens the buffer, and [`clear`](BufferManager::clear) exists for
//! session reset only — error recovery never clears.

use thiserror::Error;

use crate::config::BufferConfig;
use crate::text::{extract_complete_sentences, split_into_sentences, FuzzyTextMatcher};

// ---------------------------------------------------------------------------
// BufferError
// ---------------------------------------------------------------------------

/// Errors surfaced by buffer reconciliation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BufferError {
    /// The completed text reported by the analysis engine could not be
    /// located in the buffer above the similarity threshold.  The buffer is
    /// retained unchanged; the caller decides whether to retry the cycle or
    /// escalate.
    #[error(
        "completed text not found in buffer: best similarity {best:.2} \
         below threshold {threshold:.2}"
    )]
    ReconciliationFailed { best: f64, threshold: f64 },
}

// ---------------------------------------------------------------------------
// BufferManager
// ---------------------------------------------------------------------------

/// Accumulates streamed transcript text and retires it once processed.
///
/// Also maintains a bounded transcript history (the recent text *including*
/// already-processed spans) that the orchestrator passes to the analysis
/// engine as context.  The history window is capped at
/// `flush_threshold_chars * history_multiplier`.
///
/// Owned exclusively by the foreground processing cycle; created once per
/// session.
pub struct BufferManager {
    pending: String,
    history: String,
    config: BufferConfig,
    matcher: FuzzyTextMatcher,
}

impl BufferManager {
    /// Create a buffer manager from validated configuration.
    pub fn new(config: BufferConfig) -> Self {
        let matcher = FuzzyTextMatcher::new(config.similarity_threshold);
        log::info!(
            "buffer: initialized with flush threshold {} chars",
            config.flush_threshold_chars
        );
        Self {
            pending: String::new(),
            history: String::new(),
            config,
            matcher,
        }
    }

    // -----------------------------------------------------------------------
    // Accumulation
    // -----------------------------------------------------------------------

    /// Append streamed text to the pending buffer and the history window.
    ///
    /// A single joining space is inserted between phrases when neither the
    /// buffer tail nor the incoming text carries one — transcription
    /// engines deliver phrases without guaranteed spacing.
    pub fn add_text(&mut self, text: &str) {
        if text.is_empty() {
            log::warn!("buffer: add_text called with empty text");
            return;
        }

        if !self.pending.is_empty() && !self.pending.ends_with(' ') && !text.starts_with(' ') {
            self.pending.push(' ');
        }
        self.pending.push_str(text);

        if !self.history.is_empty() && !self.history.ends_with(' ') && !text.starts_with(' ') {
            self.history.push(' ');
        }
        self.history.push_str(text);
        self.trim_history();

        log::debug!(
            "buffer: added {} chars, pending now {} chars",
            text.len(),
            self.pending.len()
        );
    }

    /// Keep only the newest `flush_threshold_chars * history_multiplier`
    /// bytes of transcript history.
    fn trim_history(&mut self) {
        let max = self.config.flush_threshold_chars * self.config.history_multiplier;
        if self.history.len() > max {
            let mut cut = self.history.len() - max;
            while !self.history.is_char_boundary(cut) {
                cut += 1;
            }
            self.history.drain(..cut);
        }
    }

    // -----------------------------------------------------------------------
    // Readiness
    // -----------------------------------------------------------------------

    /// The buffer text that should be submitted for analysis now, or an
    /// empty string when the buffer is not ready.  Pure — never mutates.
    ///
    /// Two paths make the buffer ready, both returning the complete-sentence
    /// prefix:
    ///
    /// * the buffer has grown past `flush_threshold_chars`;
    /// * the immediate path: the buffer exceeds
    ///   `flush_threshold_chars * immediate_processing_multiplier`, holds at
    ///   least `min_sentences_for_immediate` sentences, and the
    ///   complete-sentence fraction exceeds `substantial_content_ratio`.
    pub fn ready_text(&self) -> String {
        let complete = extract_complete_sentences(&self.pending);
        if complete.is_empty() {
            return String::new();
        }

        let len = self.pending.len();
        if len > self.config.flush_threshold_chars {
            return complete;
        }

        let immediate_at = self.config.flush_threshold_chars as f32
            * self.config.immediate_processing_multiplier;
        if (len as f32) > immediate_at {
            let sentences = split_into_sentences(&self.pending).len();
            let complete_fraction = complete.len() as f32 / len as f32;
            if sentences >= self.config.min_sentences_for_immediate
                && complete_fraction > self.config.substantial_content_ratio
            {
                log::debug!(
                    "buffer: immediate path ready ({sentences} sentences, \
                     {complete_fraction:.2} complete)"
                );
                return complete;
            }
        }

        String::new()
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Retire `completed` from the front of the buffer and return what
    /// remains.
    ///
    /// Empty `completed` is a no-op returning the unchanged buffer.
    /// Otherwise the completed text is located by fuzzy match; on success
    /// everything up to and including the match end is removed.  On failure
    /// the buffer stays exactly as it was and
    /// [`BufferError::ReconciliationFailed`] is returned.
    pub fn flush_completely_processed_text(
        &mut self,
        completed: &str,
    ) -> Result<String, BufferError> {
        if completed.is_empty() {
            log::debug!("buffer: no completed text to flush");
            return Ok(self.pending.clone());
        }
        if self.pending.is_empty() {
            log::warn!("buffer: flush called with empty buffer");
            return Ok(String::new());
        }

        match self.matcher.find_best_match(completed, &self.pending) {
            Some(found) => {
                let remainder = self.pending[found.end..].to_string();
                log::info!(
                    "buffer: flushed {} of {} chars (match score {:.2}), {} remain",
                    found.end,
                    self.pending.len(),
                    found.score,
                    remainder.len()
                );
                self.pending = remainder.clone();
                Ok(remainder)
            }
            None => {
                let best = self.matcher.calculate_similarity(completed, &self.pending);
                log::error!(
                    "buffer: reconciliation failed, best similarity {best:.2}. \
                     completed ({} chars): '{}' / buffer ({} chars): '{}'",
                    completed.len(),
                    preview(completed),
                    self.pending.len(),
                    preview(&self.pending)
                );
                Err(BufferError::ReconciliationFailed {
                    best,
                    threshold: self.matcher.threshold(),
                })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries and session reset
    // -----------------------------------------------------------------------

    /// Current pending (not yet fully processed) text.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Bounded transcript history, newest text last.
    pub fn history(&self) -> &str {
        &self.history
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Reset all buffers.  Session teardown only — reconciliation failures
    /// must never be "recovered" by clearing.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.history.clear();
        log::info!("buffer: cleared");
    }
}

/// First 120 chars of `s` for log lines.
fn preview(s: &str) -> &str {
    let mut end = s.len().min(120);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BufferConfig;

    fn small_config() -> BufferConfig {
        BufferConfig {
            flush_threshold_chars: 20,
            ..BufferConfig::default()
        }
    }

    fn manager() -> BufferManager {
        BufferManager::new(small_config())
    }

    // ---- add_text ---

    #[test]
    fn add_text_accumulates() {
        let mut buf = manager();
        buf.add_text("Hello");
        buf.add_text("world");
        assert_eq!(buf.pending(), "Hello world");
    }

    #[test]
    fn add_text_does_not_double_spaces() {
        let mut buf = manager();
        buf.add_text("Hello ");
        buf.add_text("world");
        assert_eq!(buf.pending(), "Hello world");

        let mut buf = manager();
        buf.add_text("Hello");
        buf.add_text(" world");
        assert_eq!(buf.pending(), "Hello world");
    }

    #[test]
    fn add_empty_text_is_a_warning_noop() {
        let mut buf = manager();
        buf.add_text("");
        assert!(buf.is_empty());
    }

    #[test]
    fn history_is_trimmed_to_window() {
        let mut config = small_config();
        config.history_multiplier = 2; // window = 40 chars
        let mut buf = BufferManager::new(config);

        for _ in 0..10 {
            buf.add_text("0123456789");
        }
        assert!(buf.history().len() <= 40);
        // Newest text survives.
        assert!(buf.history().ends_with("0123456789"));
    }

    // ---- ready_text ---

    #[test]
    fn not_ready_below_threshold() {
        let mut buf = manager();
        buf.add_text("Short bit.");
        assert_eq!(buf.ready_text(), "");
    }

    #[test]
    fn ready_once_threshold_exceeded() {
        let mut buf = manager();
        buf.add_text("This is a complete sentence. And an unfinished");
        assert_eq!(buf.ready_text(), "This is a complete sentence.");
    }

    #[test]
    fn not_ready_without_any_complete_sentence() {
        let mut buf = manager();
        buf.add_text("a long run of words with no terminator at all in it");
        assert_eq!(buf.ready_text(), "");
    }

    #[test]
    fn ready_text_is_pure() {
        let mut buf = manager();
        buf.add_text("This is a complete sentence. And an unfinished");
        let before = buf.pending().to_string();
        let _ = buf.ready_text();
        let _ = buf.ready_text();
        assert_eq!(buf.pending(), before);
    }

    #[test]
    fn immediate_path_triggers_below_normal_threshold() {
        let config = BufferConfig {
            flush_threshold_chars: 200,
            immediate_processing_multiplier: 0.2, // immediate at 40 chars
            substantial_content_ratio: 0.5,
            min_sentences_for_immediate: 3,
            ..BufferConfig::default()
        };
        let mut buf = BufferManager::new(config);
        buf.add_text("First thing done. Second thing done. Third thing done.");

        // Below the 200-char threshold, but substantial and sentence-rich.
        let ready = buf.ready_text();
        assert_eq!(ready, "First thing done. Second thing done. Third thing done.");
    }

    #[test]
    fn immediate_path_needs_enough_sentences() {
        let config = BufferConfig {
            flush_threshold_chars: 200,
            immediate_processing_multiplier: 0.2,
            substantial_content_ratio: 0.5,
            min_sentences_for_immediate: 3,
            ..BufferConfig::default()
        };
        let mut buf = BufferManager::new(config);
        buf.add_text("Only one sentence here but it is fairly long indeed.");
        assert_eq!(buf.ready_text(), "");
    }

    // ---- flush_completely_processed_text ---

    #[test]
    fn empty_completed_text_leaves_buffer_unchanged() {
        let mut buf = manager();
        buf.add_text("Hello world.");
        let remaining = buf.flush_completely_processed_text("").unwrap();
        assert_eq!(remaining, "Hello world.");
        assert_eq!(buf.pending(), "Hello world.");
    }

    #[test]
    fn exact_match_empties_buffer() {
        let mut buf = manager();
        buf.add_text("Hello world.");
        let remaining = buf.flush_completely_processed_text("Hello world.").unwrap();
        assert_eq!(remaining, "");
        assert!(buf.is_empty());
    }

    #[test]
    fn whitespace_insensitive_match_empties_buffer() {
        let mut buf = manager();
        buf.add_text("Hello    world   test");
        let remaining = buf
            .flush_completely_processed_text("Hello world test")
            .unwrap();
        assert_eq!(remaining, "");
    }

    #[test]
    fn partial_match_leaves_the_tail() {
        let mut buf = manager();
        buf.add_text("This is a long sentence that will be processed.");
        let remaining = buf
            .flush_completely_processed_text("This is a long sentence")
            .unwrap();
        assert_eq!(remaining.trim(), "that will be processed.");
    }

    #[test]
    fn failed_reconciliation_keeps_buffer_and_errors() {
        let mut buf = manager();
        buf.add_text("abc");
        let err = buf.flush_completely_processed_text("xyz").unwrap_err();
        assert!(matches!(err, BufferError::ReconciliationFailed { .. }));
        assert_eq!(buf.pending(), "abc");
    }

    #[test]
    fn repeated_empty_flush_is_idempotent() {
        let mut buf = manager();
        buf.add_text("Keep me around.");
        for _ in 0..3 {
            let remaining = buf.flush_completely_processed_text("").unwrap();
            assert_eq!(remaining, "Keep me around.");
        }
    }

    // ---- clear ---

    #[test]
    fn clear_resets_everything() {
        let mut buf = manager();
        buf.add_text("Some text here.");
        buf.clear();
        assert!(buf.is_empty());
        assert!(buf.history().is_empty());
    }
}
