//! Pipeline orchestrator module.
//!
//! This module wires the full transcript → buffer → analysis → tree cycle
//! and exposes the shared tree that renderers read after every apply.
//!
//! # Architecture
//!
//! ```text
//! transcript fragment
//!        │
//!        ▼
//! ChunkProcessor::process_text()  ← async, one cycle per call
//!        │
//!        ├─ BufferManager::add_text / ready_text
//!        │      (below threshold → CycleOutcome::Idle)
//!        │
//!        ├─ Analyzer::analyze  (retried on transient errors, lock NOT held)
//!        │
//!        ├─ BufferManager::flush_completely_processed_text
//!        │      (reconciliation failure → edits dropped, buffer kept)
//!        │
//!        └─ TreeActionApplier::apply  (one short critical section)
//!              │
//!              └─ Renderer::render(tree snapshot)   — failure non-fatal
//!
//! SharedTree (Arc<Mutex<Tree>>) ←─── read by renderers / UI
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voicetree::analysis::ApiAnalyzer;
//! use voicetree::config::AppConfig;
//! use voicetree::pipeline::ChunkProcessor;
//! use voicetree::tree::new_shared_tree;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     config.validate()?;
//!
//!     let tree = new_shared_tree();
//!     let analyzer = Arc::new(ApiAnalyzer::from_config(&config.analysis));
//!     let mut processor = ChunkProcessor::new(tree, &config, analyzer);
//!
//!     processor.process_text("So today I want to talk about caching.").await?;
//!     Ok(())
//! }
//! ```

pub mod processor;
pub mod render;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use processor::{ChunkProcessor, CycleOutcome, PipelineError, RetryPolicy};
pub use render::Renderer;
