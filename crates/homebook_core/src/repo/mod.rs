//! Record store contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the key-indexed store over projects, parties, flats and
//!   transactions consumed by the engines and services.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths validate records before any SQL mutation.
//! - Every committed mutation is announced to subscribers.
//! - Bulk import and clear-all are single atomic transactions.

pub mod app_state_repo;
pub mod record_store;
mod records;

pub use records::{Collection, RefField, StoredRecord};
