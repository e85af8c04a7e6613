//! Foothold Engine - Submission Ledger and Derived Analytics
//!
//! The ledger is an append-only, deduplicated accumulation of submissions
//! for one user; the derived-state computation is a pure function from
//! (ledger, catalog key set, today) to the observable aggregates. Derived
//! state is always recomputed wholesale from the full ledger - never
//! patched incrementally - trading redundant work for the absence of an
//! entire class of incremental-update bugs.

mod derived;
mod ledger;

pub use derived::{local_date, CatalogCounts, DerivedState};
pub use ledger::{MergeOutcome, SubmissionLedger};
