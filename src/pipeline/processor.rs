//! Chunk processor — drives the full buffer → analysis → tree cycle.
//!
//! [`ChunkProcessor`] owns the [`BufferManager`] and responds to transcript
//! fragments passed to [`process_text`](ChunkProcessor::process_text).
//!
//! # Cycle flow
//!
//! ```text
//! process_text(fragment)
//!   └─▶ buffer.add_text → buffer.ready_text
//!         ├─ empty         → CycleOutcome::Idle
//!         └─ candidate
//!               ├─▶ analyzer.analyze (retried on transient errors)
//!               │     └─ Err (permanent / retries spent) → buffer untouched
//!               ├─▶ buffer.flush_completely_processed_text(completed)
//!               │     └─ Err → edits DROPPED, buffer untouched
//!               └─▶ lock tree, applier.apply, clone snapshot, unlock
//!                     └─▶ renderer.render(snapshot)  — failure non-fatal
//! ```
//!
//! The tree mutex is held for exactly one apply plus one clone; the
//! analysis call and the renderer never run under the lock.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::analysis::{AnalysisError, AnalysisOutcome, AnalysisRequest, Analyzer};
use crate::buffer::{BufferError, BufferManager};
use crate::config::{AnalysisConfig, AppConfig};
use crate::pipeline::render::Renderer;
use crate::tree::{ApplyReport, SharedTree, TreeActionApplier};

/// How many node summaries to show the engine per request.
const SUMMARY_NODE_LIMIT: usize = 10;

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Errors that can surface inside one processing cycle.
///
/// An `Err` from [`ChunkProcessor::process_text`] always means the buffer
/// was left untouched: the same text will be resubmitted by a later cycle.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The analysis engine failed (after retries, for transient failures).
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// The engine's completed text could not be reconciled with the buffer.
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// The shared tree mutex was poisoned by a panicking holder.
    #[error("tree lock poisoned")]
    LockPoisoned,
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Bounded retry with exponential backoff, applied to transient analysis
/// failures only.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled per further attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            max_attempts: config.max_retries,
            base_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// CycleOutcome
// ---------------------------------------------------------------------------

/// What one [`process_text`](ChunkProcessor::process_text) call did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The buffer has not accumulated enough text yet; nothing was sent to
    /// the engine.
    Idle,
    /// A batch ran; `report` says which nodes changed and whether the batch
    /// applied fully.
    Processed { report: ApplyReport },
}

// ---------------------------------------------------------------------------
// ChunkProcessor
// ---------------------------------------------------------------------------

/// Drives the complete transcript-to-tree cycle.
///
/// Create with [`ChunkProcessor::new`], feed transcript fragments through
/// [`process_text`](Self::process_text), and call
/// [`finalize`](Self::finalize) when the transcript ends to process the
/// below-threshold remainder.
pub struct ChunkProcessor {
    tree: SharedTree,
    buffer: BufferManager,
    applier: TreeActionApplier,
    analyzer: Arc<dyn Analyzer>,
    renderer: Option<Arc<dyn Renderer>>,
    retry: RetryPolicy,
    /// Text the previous cycle's engine judged incomplete, resubmitted as
    /// context with the next batch.
    incomplete_carry: Option<String>,
    /// Node ids touched since the last successful render.
    nodes_to_update: BTreeSet<u64>,
}

impl ChunkProcessor {
    /// Create a new processor.
    ///
    /// # Arguments
    ///
    /// * `tree`     — shared tree, also read by renderers / UI.
    /// * `config`   — buffer thresholds and retry settings.
    /// * `analyzer` — analysis backend (e.g. `ApiAnalyzer`).
    pub fn new(tree: SharedTree, config: &AppConfig, analyzer: Arc<dyn Analyzer>) -> Self {
        Self {
            tree,
            buffer: BufferManager::new(config.buffer.clone()),
            applier: TreeActionApplier::new(),
            analyzer,
            renderer: None,
            retry: RetryPolicy::from_config(&config.analysis),
            incomplete_carry: None,
            nodes_to_update: BTreeSet::new(),
        }
    }

    /// Attach a renderer that receives a tree snapshot after every apply.
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    // -----------------------------------------------------------------------
    // Main cycle
    // -----------------------------------------------------------------------

    /// Feed one transcript fragment and, if the buffer is ready, run a full
    /// analysis + apply cycle.
    ///
    /// On any error the buffer keeps the unprocessed text and no edits are
    /// applied, so a later call retries the same content.
    pub async fn process_text(&mut self, text: &str) -> Result<CycleOutcome, PipelineError> {
        self.buffer.add_text(text);

        let candidate = self.buffer.ready_text();
        if candidate.is_empty() {
            log::debug!("pipeline: buffer below threshold, waiting for more text");
            return Ok(CycleOutcome::Idle);
        }

        self.run_cycle(&candidate).await
    }

    /// Process whatever remains in the buffer, ignoring the flush threshold.
    ///
    /// Call once when the transcript ends so trailing below-threshold text
    /// still reaches the tree.  Returns `Idle` when the buffer is empty.
    pub async fn finalize(&mut self) -> Result<CycleOutcome, PipelineError> {
        let candidate = self.buffer.pending().trim().to_string();
        if candidate.is_empty() {
            return Ok(CycleOutcome::Idle);
        }

        log::info!("pipeline: finalizing {} pending chars", candidate.len());
        self.run_cycle(&candidate).await
    }

    /// One full cycle for an already-selected candidate span.
    async fn run_cycle(&mut self, candidate: &str) -> Result<CycleOutcome, PipelineError> {
        log::debug!("pipeline: submitting {} chars for analysis", candidate.len());

        // ── 1. Gather context (short critical section for the summary) ───
        let tree_summary = {
            let tree = self.tree.lock().map_err(|_| PipelineError::LockPoisoned)?;
            tree.summaries(SUMMARY_NODE_LIMIT)
        };
        let history = self.buffer.history().to_string();
        let carry = self.incomplete_carry.clone();

        // ── 2. Analysis (lock NOT held; retried on transient errors) ─────
        let request = AnalysisRequest {
            text: candidate,
            transcript_history: &history,
            tree_summary: &tree_summary,
            incomplete_carry: carry.as_deref(),
        };
        let outcome = self.analyze_with_retry(request).await?;

        // ── 3. Reconcile the buffer BEFORE touching the tree ─────────────
        // A reconciliation failure means the engine's completed text does
        // not correspond to anything we hold, so its edits are untrusted
        // and dropped wholesale.
        let completed = outcome.completed_text();
        let remainder = self.buffer.flush_completely_processed_text(&completed)?;
        log::debug!(
            "pipeline: flushed {} chars, {} remain pending",
            completed.len(),
            remainder.len()
        );

        self.incomplete_carry = outcome.incomplete_text();

        // ── 4. Apply edits (one short critical section) ──────────────────
        let (report, snapshot) = {
            let mut tree = self.tree.lock().map_err(|_| PipelineError::LockPoisoned)?;
            let report = self.applier.apply(&mut tree, &outcome.edits);
            (report, tree.clone())
        };

        self.nodes_to_update.extend(report.touched.iter().copied());

        // ── 5. Render the snapshot (failure is non-fatal) ────────────────
        if let Some(renderer) = &self.renderer {
            match renderer.render(&snapshot, &self.nodes_to_update) {
                Ok(()) => self.nodes_to_update.clear(),
                Err(e) => {
                    // Keep the accumulated ids so the next render catches up.
                    log::warn!("pipeline: render failed: {e}");
                }
            }
        }

        Ok(CycleOutcome::Processed { report })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Call the analyzer, retrying transient failures with exponential
    /// backoff.  Permanent failures return immediately.
    async fn analyze_with_retry(
        &self,
        request: AnalysisRequest<'_>,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let mut delay = self.retry.base_delay;

        for attempt in 1..=self.retry.max_attempts {
            match self.analyzer.analyze(request).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    log::warn!(
                        "pipeline: analysis attempt {attempt}/{} failed ({e}), \
                         retrying in {delay:?}",
                        self.retry.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }

        // max_attempts >= 1 is enforced by config validation.
        Err(AnalysisError::Timeout)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The shared tree handle, for renderers and inspection.
    pub fn tree(&self) -> &SharedTree {
        &self.tree
    }

    /// Unprocessed buffer text.
    pub fn pending(&self) -> &str {
        self.buffer.pending()
    }

    /// Text carried from the previous cycle as incomplete.
    pub fn incomplete_carry(&self) -> Option<&str> {
        self.incomplete_carry.as_deref()
    }

    /// Drop all buffered text, history, and carry.  The tree is untouched.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.incomplete_carry = None;
        self.nodes_to_update.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisOutcome, ChunkDescriptor};
    use crate::config::AppConfig;
    use crate::tree::{new_shared_tree, Edit};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Owned copy of one request, for assertions after the fact.
    #[derive(Debug, Clone)]
    struct CapturedRequest {
        text: String,
        incomplete_carry: Option<String>,
    }

    /// Echoes the submitted text back as one complete chunk plus a CREATE
    /// edit, and records every request it sees.
    struct EchoAnalyzer {
        calls: AtomicU32,
        requests: Mutex<Vec<CapturedRequest>>,
        /// Extra incomplete chunk appended to every outcome.
        carry_out: Option<String>,
    }

    impl EchoAnalyzer {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                requests: Mutex::new(Vec::new()),
                carry_out: None,
            }
        }

        fn with_carry(text: &str) -> Self {
            Self {
                carry_out: Some(text.to_string()),
                ..Self::new()
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Analyzer for EchoAnalyzer {
        async fn analyze(
            &self,
            request: AnalysisRequest<'_>,
        ) -> Result<AnalysisOutcome, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(CapturedRequest {
                text: request.text.to_string(),
                incomplete_carry: request.incomplete_carry.map(str::to_string),
            });

            let mut chunks = vec![ChunkDescriptor {
                text: request.text.to_string(),
                is_complete: true,
            }];
            if let Some(carry) = &self.carry_out {
                chunks.push(ChunkDescriptor {
                    text: carry.clone(),
                    is_complete: false,
                });
            }

            Ok(AnalysisOutcome {
                chunks,
                edits: vec![Edit::Create {
                    parent: None,
                    title: "Topic".into(),
                    summary: "a topic".into(),
                    content: request.text.to_string(),
                    relationship: None,
                }],
            })
        }
    }

    /// Fails transiently `failures` times, then delegates to echo behaviour.
    struct FlakyAnalyzer {
        remaining_failures: AtomicU32,
        inner: EchoAnalyzer,
    }

    impl FlakyAnalyzer {
        fn new(failures: u32) -> Self {
            Self {
                remaining_failures: AtomicU32::new(failures),
                inner: EchoAnalyzer::new(),
            }
        }
    }

    #[async_trait]
    impl Analyzer for FlakyAnalyzer {
        async fn analyze(
            &self,
            request: AnalysisRequest<'_>,
        ) -> Result<AnalysisOutcome, AnalysisError> {
            if self
                .remaining_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(AnalysisError::Request("connection reset".into()));
            }
            self.inner.analyze(request).await
        }
    }

    /// Always fails with a permanent (non-transient) error.
    struct BrokenAnalyzer;

    #[async_trait]
    impl Analyzer for BrokenAnalyzer {
        async fn analyze(
            &self,
            _request: AnalysisRequest<'_>,
        ) -> Result<AnalysisOutcome, AnalysisError> {
            Err(AnalysisError::Parse("not json".into()))
        }
    }

    /// Claims to have completed text that never appeared in the buffer.
    struct HallucinatingAnalyzer;

    #[async_trait]
    impl Analyzer for HallucinatingAnalyzer {
        async fn analyze(
            &self,
            _request: AnalysisRequest<'_>,
        ) -> Result<AnalysisOutcome, AnalysisError> {
            Ok(AnalysisOutcome {
                chunks: vec![ChunkDescriptor {
                    text: "completely unrelated text that was never spoken".into(),
                    is_complete: true,
                }],
                edits: vec![Edit::Create {
                    parent: None,
                    title: "Ghost".into(),
                    summary: String::new(),
                    content: "ghost".into(),
                    relationship: None,
                }],
            })
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Config with near-zero retry delay so retry tests run fast.
    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.analysis.retry_delay_ms = 1;
        config
    }

    fn make_processor(analyzer: Arc<dyn Analyzer>) -> ChunkProcessor {
        ChunkProcessor::new(new_shared_tree(), &test_config(), analyzer)
    }

    /// Comfortably past the 83-char threshold, all complete sentences.
    const LONG_TEXT: &str = "So today I want to talk about the way we cache \
                             results in the service. The main problem is invalidation.";

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    /// Below the flush threshold nothing reaches the engine.
    #[tokio::test]
    async fn short_text_is_idle_and_never_calls_engine() {
        let analyzer = Arc::new(EchoAnalyzer::new());
        let mut processor = make_processor(analyzer.clone());

        let outcome = processor.process_text("Short fragment").await.unwrap();

        assert_eq!(outcome, CycleOutcome::Idle);
        assert_eq!(analyzer.call_count(), 0);
        assert_eq!(processor.pending(), "Short fragment");
    }

    /// A ready buffer runs a full cycle: node created, buffer retired.
    #[tokio::test]
    async fn full_cycle_creates_node_and_empties_buffer() {
        let analyzer = Arc::new(EchoAnalyzer::new());
        let mut processor = make_processor(analyzer.clone());

        let outcome = processor.process_text(LONG_TEXT).await.unwrap();

        let CycleOutcome::Processed { report } = outcome else {
            panic!("expected a processed cycle");
        };
        assert!(report.is_complete());
        assert_eq!(report.created.len(), 1);
        assert_eq!(analyzer.call_count(), 1);

        // The echo analyzer completed the entire candidate, so the buffer
        // must be fully retired.
        assert!(processor.pending().is_empty());

        let tree = processor.tree().lock().unwrap();
        assert_eq!(tree.len(), 1);
    }

    /// Transient failures are retried; the cycle still succeeds.
    #[tokio::test]
    async fn transient_failure_is_retried_then_succeeds() {
        let analyzer = Arc::new(FlakyAnalyzer::new(2));
        let mut processor = make_processor(analyzer.clone());

        let outcome = processor.process_text(LONG_TEXT).await.unwrap();

        assert!(matches!(outcome, CycleOutcome::Processed { .. }));
        // Two failed attempts plus the successful one.
        assert_eq!(analyzer.inner.call_count(), 1);
        assert!(processor.pending().is_empty());
    }

    /// A permanent failure propagates and leaves the buffer untouched.
    #[tokio::test]
    async fn permanent_failure_keeps_buffer() {
        let mut processor = make_processor(Arc::new(BrokenAnalyzer));

        let err = processor.process_text(LONG_TEXT).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Analysis(AnalysisError::Parse(_))
        ));
        // Nothing was flushed and no node was created.
        assert!(!processor.pending().is_empty());
        assert!(processor.tree().lock().unwrap().is_empty());
    }

    /// Exhausting retries on a transient failure also keeps the buffer.
    #[tokio::test]
    async fn exhausted_retries_keep_buffer() {
        let analyzer = Arc::new(FlakyAnalyzer::new(u32::MAX));
        let mut processor = make_processor(analyzer);

        let err = processor.process_text(LONG_TEXT).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Analysis(AnalysisError::Request(_))
        ));
        assert!(!processor.pending().is_empty());
    }

    /// Reconciliation failure drops the batch's edits and keeps the buffer.
    #[tokio::test]
    async fn reconciliation_failure_drops_edits() {
        let mut processor = make_processor(Arc::new(HallucinatingAnalyzer));

        let err = processor.process_text(LONG_TEXT).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Buffer(BufferError::ReconciliationFailed { .. })
        ));
        // The hallucinated CREATE edit must never have reached the tree.
        assert!(processor.tree().lock().unwrap().is_empty());
        assert!(!processor.pending().is_empty());
    }

    /// Incomplete chunks from one cycle arrive as carry in the next request.
    #[tokio::test]
    async fn incomplete_carry_reaches_next_request() {
        let analyzer = Arc::new(EchoAnalyzer::with_carry("and the other thing"));
        let mut processor = make_processor(analyzer.clone());

        processor.process_text(LONG_TEXT).await.unwrap();
        assert_eq!(
            processor.incomplete_carry(),
            Some("and the other thing")
        );

        processor.process_text(LONG_TEXT).await.unwrap();

        let requests = analyzer.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].incomplete_carry.is_none());
        assert_eq!(
            requests[1].incomplete_carry.as_deref(),
            Some("and the other thing")
        );
    }

    /// `finalize` processes a below-threshold remainder.
    #[tokio::test]
    async fn finalize_processes_short_remainder() {
        let analyzer = Arc::new(EchoAnalyzer::new());
        let mut processor = make_processor(analyzer.clone());

        let outcome = processor.process_text("One last thought.").await.unwrap();
        assert_eq!(outcome, CycleOutcome::Idle);

        let outcome = processor.finalize().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Processed { .. }));
        assert!(processor.pending().is_empty());

        // Submitted text is the full pending buffer, threshold ignored.
        let requests = analyzer.requests.lock().unwrap();
        assert_eq!(requests[0].text, "One last thought.");
    }

    /// `finalize` on an empty buffer is a no-op.
    #[tokio::test]
    async fn finalize_on_empty_buffer_is_idle() {
        let analyzer = Arc::new(EchoAnalyzer::new());
        let mut processor = make_processor(analyzer.clone());

        let outcome = processor.finalize().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Idle);
        assert_eq!(analyzer.call_count(), 0);
    }

    /// `clear` drops buffer state but never touches the tree.
    #[tokio::test]
    async fn clear_resets_buffer_not_tree() {
        let analyzer = Arc::new(EchoAnalyzer::with_carry("leftover"));
        let mut processor = make_processor(analyzer);

        processor.process_text(LONG_TEXT).await.unwrap();
        processor.process_text("partial tail").await.unwrap();

        processor.clear();

        assert!(processor.pending().is_empty());
        assert!(processor.incomplete_carry().is_none());
        assert_eq!(processor.tree().lock().unwrap().len(), 1);
    }
}
