//! Sentence-boundary heuristics for streamed transcripts.
//!
//! Transcribed speech arrives as arbitrary fragments, so the buffer layer
//! needs to know which leading part of the accumulated text already forms
//! whole sentences and which tail is still in flight.  The rules here are
//! deliberately simple: a sentence ends at `.`, `!` or `?`, except that a
//! `.` belonging to an ellipsis (`...`) never terminates anything — a
//! trailing ellipsis is exactly how transcription engines render a speaker
//! who has not finished their thought.

/// Fragments shorter than this (after trimming) are transcription noise
/// ("uh", "so", stray words) and are dropped by [`split_into_sentences`].
const MIN_SENTENCE_CHARS: usize = 5;

// ---------------------------------------------------------------------------
// Complete-sentence extraction
// ---------------------------------------------------------------------------

/// Return the longest leading substring of `text` that consists only of
/// whole sentences, trimmed.  Returns an empty string when no complete
/// sentence exists yet.
///
/// A `.` that is adjacent to another `.` is treated as part of an ellipsis
/// and does not terminate a sentence.  When the text *ends* in an ellipsis,
/// only sentences appearing before that ellipsis are returned.
///
/// ```rust
/// use voicetree::text::extract_complete_sentences;
///
/// assert_eq!(extract_complete_sentences("Hello world. And then"), "Hello world.");
/// assert_eq!(extract_complete_sentences("Still talking"), "");
/// assert_eq!(extract_complete_sentences("Done. But maybe..."), "Done.");
/// ```
pub fn extract_complete_sentences(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let trimmed = text.trim_end();
    let search = if trimmed.ends_with("...") {
        // Speaker trailed off: only sentences before the ellipsis count.
        let mut cut = trimmed.len();
        let bytes = trimmed.as_bytes();
        while cut > 0 && bytes[cut - 1] == b'.' {
            cut -= 1;
        }
        &trimmed[..cut]
    } else {
        text
    };

    match last_sentence_end(search) {
        Some(end) => search[..end].trim().to_string(),
        None => String::new(),
    }
}

/// Byte offset just past the last sentence terminator in `text`, or `None`
/// when no terminator exists.  Ellipsis dots do not count.
fn last_sentence_end(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    for i in (0..bytes.len()).rev() {
        match bytes[i] {
            b'!' | b'?' => return Some(i + 1),
            b'.' => {
                let prev_is_dot = i > 0 && bytes[i - 1] == b'.';
                let next_is_dot = i + 1 < bytes.len() && bytes[i + 1] == b'.';
                if !prev_is_dot && !next_is_dot {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Sentence splitting
// ---------------------------------------------------------------------------

/// Split `text` into individual sentences on runs of terminal punctuation.
///
/// Each piece is trimmed; fragments shorter than [`MIN_SENTENCE_CHARS`]
/// are discarded as transcription artifacts.
pub fn split_into_sentences(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    text.split(|c| matches!(c, '.' | '!' | '?'))
        .map(str::trim)
        .filter(|s| s.chars().count() >= MIN_SENTENCE_CHARS)
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Duplicate removal
// ---------------------------------------------------------------------------

/// Remove repeated sentences from `text`, keeping the first occurrence.
///
/// Sentences are compared after lowercasing and whitespace collapsing, so
/// `"Same sentence."` and `"SAME  SENTENCE."` count as duplicates.  The
/// survivors are rejoined with `". "` and a trailing period is ensured.
/// Empty or whitespace-only input is passed through unchanged.
pub fn deduplicate_sentences(text: &str) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }

    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();

    for sentence in split_into_sentences(text) {
        let normalized = sentence
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if seen.insert(normalized) {
            unique.push(sentence);
        }
    }

    let mut result = unique.join(". ");
    if !result.is_empty() && !result.ends_with('.') {
        result.push('.');
    }
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
