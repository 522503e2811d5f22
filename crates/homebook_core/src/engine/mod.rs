//! Pure bookkeeping engines.
//!
//! # Responsibility
//! - Aggregate flats and transactions into per-party reconciliation rows.
//! - Parse assistant command lines into structured intents.
//! - Produce prefix-driven autocomplete suggestions.
//!
//! # Invariants
//! - Nothing here touches storage or holds state between calls; callers pass
//!   snapshots in and re-invoke on every store change.

pub mod command;
pub mod reconcile;
pub mod suggest;
