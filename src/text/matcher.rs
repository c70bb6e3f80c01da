//! Fuzzy matching between analysis output and the pending buffer.
//!
//! The analysis engine reports back the text it fully processed, but that
//! text rarely comes back byte-identical: punctuation gets normalized,
//! whitespace collapses, the odd word changes.  [`FuzzyTextMatcher`] finds
//! where that reworded text sits inside the original buffer so the buffer
//! layer can retire exactly the matched span.
//!
//! Similarity is normalized Levenshtein (via `strsim`) computed over
//! whitespace-collapsed strings, so pure whitespace differences never cost
//! anything while content differences always do.

use strsim::normalized_levenshtein;

/// Punctuation that may trail a matched span in the source without having
/// been part of the reported text.  The match is extended over it so the
/// buffer is not left starting with stray punctuation.
const TRAILING_PUNCTUATION: &[char] = &['.', '!', '?', ',', ';', ':'];

/// Lengths within this many bytes of each other are "close enough" to try
/// a whole-source comparison before any window search.
const FULL_MATCH_LENGTH_SLACK: usize = 10;

/// Minimum similarity for the whole-source shortcut.  Deliberately above
/// the default window threshold: claiming the entire buffer is a bigger
/// commitment than claiming a span.
const FULL_MATCH_MIN_SCORE: f64 = 0.88;

// ---------------------------------------------------------------------------
// TextMatch
// ---------------------------------------------------------------------------

/// A located match inside a source string.
///
/// `start`/`end` are byte offsets into the source, always on char
/// boundaries.  `score` is the similarity of the matched span to the
/// target, in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMatch {
    pub start: usize,
    pub end: usize,
    pub score: f64,
}

// ---------------------------------------------------------------------------
// FuzzyTextMatcher
// ---------------------------------------------------------------------------

/// Similarity scoring and best-window search.
///
/// ```rust
/// use voicetree::text::FuzzyTextMatcher;
///
/// let matcher = FuzzyTextMatcher::default();
/// let m = matcher
///     .find_best_match("Hello world", "Hello world. And more text here")
///     .unwrap();
/// assert_eq!(m.start, 0);
/// assert!(m.score > 0.9);
/// ```
#[derive(Debug, Clone)]
pub struct FuzzyTextMatcher {
    similarity_threshold: f64,
}

impl Default for FuzzyTextMatcher {
    fn default() -> Self {
        Self::new(0.8)
    }
}

impl FuzzyTextMatcher {
    /// Create a matcher with the given minimum similarity in `(0, 1]`.
    ///
    /// # Panics
    ///
    /// Panics when `similarity_threshold` is outside `(0, 1]` — the config
    /// layer validates user-supplied values before they reach this point.
    pub fn new(similarity_threshold: f64) -> Self {
        assert!(
            similarity_threshold > 0.0 && similarity_threshold <= 1.0,
            "similarity threshold must be in (0, 1]"
        );
        Self {
            similarity_threshold,
        }
    }

    /// The configured minimum similarity.
    pub fn threshold(&self) -> f64 {
        self.similarity_threshold
    }

    // -----------------------------------------------------------------------
    // Similarity
    // -----------------------------------------------------------------------

    /// Similarity of `a` and `b` in `[0, 1]`.
    ///
    /// Whitespace runs are collapsed before comparison, so
    /// `"Hello   world"` and `"Hello world"` score `1.0`.  Two empty (or
    /// whitespace-only) strings score `1.0`; one empty and one non-empty
    /// score `0.0`.
    pub fn calculate_similarity(&self, a: &str, b: &str) -> f64 {
        let a = normalize_whitespace(a);
        let b = normalize_whitespace(b);

        match (a.is_empty(), b.is_empty()) {
            (true, true) => 1.0,
            (true, false) | (false, true) => 0.0,
            (false, false) => normalized_levenshtein(&a, &b),
        }
    }

    // -----------------------------------------------------------------------
    // Best-window search
    // -----------------------------------------------------------------------

    /// Find the contiguous span of `source` most similar to `target`.
    ///
    /// Returns `None` when either input is empty or the best score falls
    /// below the configured threshold.  The search order is:
    ///
    /// 1. exact substring (fast path),
    /// 2. whole-source comparison when the lengths are close,
    /// 3. a word-boundary sliding window around the target's word count.
    ///
    /// A successful match is extended over trailing punctuation in the
    /// source, since the analysis engine frequently drops or rewrites the
    /// final `.`/`,` of a span.
    pub fn find_best_match(&self, target: &str, source: &str) -> Option<TextMatch> {
        if target.is_empty() || source.is_empty() {
            return None;
        }

        // 1. Exact substring.
        if let Some(start) = source.find(target) {
            let end = extend_over_punctuation(source, start + target.len());
            log::debug!("matcher: exact match at {start}..{end}");
            return Some(TextMatch {
                start,
                end,
                score: 1.0,
            });
        }

        // 2. Whole-source match for near-equal lengths.  Handles the common
        //    case where the engine echoed the entire span back with only
        //    punctuation or whitespace changes.
        if target.len().abs_diff(source.len()) <= FULL_MATCH_LENGTH_SLACK {
            let score = self.calculate_similarity(target, source);
            if score >= FULL_MATCH_MIN_SCORE && score >= self.similarity_threshold {
                log::debug!("matcher: whole-source match with score {score:.3}");
                return Some(TextMatch {
                    start: 0,
                    end: source.len(),
                    score,
                });
            }
        }

        // 3. Sliding window over word boundaries.
        let best = self.best_window(target, source)?;
        if best.score >= self.similarity_threshold {
            let end = extend_over_punctuation(source, best.end);
            log::debug!(
                "matcher: window match at {}..{} with score {:.3}",
                best.start,
                end,
                best.score
            );
            return Some(TextMatch { end, ..best });
        }

        log::debug!(
            "matcher: best window score {:.3} below threshold {:.3}",
            best.score,
            self.similarity_threshold
        );
        None
    }

    /// Unthresholded best window: slide windows of roughly the target's
    /// word count across `source` and keep the highest-scoring span.
    fn best_window(&self, target: &str, source: &str) -> Option<TextMatch> {
        let spans = word_spans(source);
        if spans.is_empty() {
            return None;
        }

        let target_words = target.split_whitespace().count().max(1);
        let slack = (target_words / 4).max(2);
        let min_len = target_words.saturating_sub(slack).max(1);
        let max_len = (target_words + slack).min(spans.len());

        let mut best: Option<TextMatch> = None;
        for window_len in min_len..=max_len {
            for start_word in 0..=(spans.len() - window_len) {
                let start = spans[start_word].0;
                let end = spans[start_word + window_len - 1].1;
                let score = self.calculate_similarity(&source[start..end], target);
                if best.map_or(true, |b| score > b.score) {
                    best = Some(TextMatch { start, end, score });
                }
            }
        }
        best
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Collapse all whitespace runs to single spaces and trim.
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Byte spans `(start, end)` of each whitespace-separated word in `s`.
fn word_spans(s: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut word_start = None;

    for (i, c) in s.char_indices() {
        if c.is_whitespace() {
            if let Some(start) = word_start.take() {
                spans.push((start, i));
            }
        } else if word_start.is_none() {
            word_start = Some(i);
        }
    }
    if let Some(start) = word_start {
        spans.push((start, s.len()));
    }
    spans
}

/// Advance `end` over any trailing punctuation characters in `source`.
fn extend_over_punctuation(source: &str, mut end: usize) -> usize {
    let bytes = source.as_bytes();
    while end < source.len() && TRAILING_PUNCTUATION.contains(&(bytes[end] as char)) {
        end += 1;
    }
    end
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
