//! Pending-text buffering and reconciliation.
//!
//! [`BufferManager`] owns the span of transcript text that has not yet been
//! fully processed.  It decides when enough has accumulated to hand to the
//! analysis engine, and afterwards retires exactly the text the engine
//! reported as completely processed — located by fuzzy match, since the
//! engine may have reworded it.
//!
//! The buffer only ever shrinks after a verified match.  Reconciliation
//! failure is a hard error ([`BufferError::ReconciliationFailed`]) with the
//! buffer retained byte-for-byte, never a silent drop.

pub mod manager;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use manager::{BufferError, BufferManager};
