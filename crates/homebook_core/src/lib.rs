//! Bookkeeping core for home-construction projects.
//!
//! Owns the record store, reconciliation, the assistant command language,
//! suggestions, reports and bulk transfer. Shells only render and forward.

pub mod auth;
pub mod config;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod report;
pub mod repo;
pub mod service;

pub use auth::{sha256_hex, AuthError, PasswordGate, SessionState};
pub use config::{AppConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use engine::command::{
    parse_command, parse_flexible_date, Command, CommandError, FlatCandidate, FlatCommand,
    PartyCommand,
};
pub use engine::reconcile::{reconcile, PartyKey, PartyRow, ReconcileScope, ReconcileTotals};
pub use engine::suggest::{suggest, Suggestion, SuggestionList};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::flat::Flat;
pub use model::party::Party;
pub use model::project::Project;
pub use model::transaction::{Transaction, TransactionMode};
pub use model::{RecordId, RecordValidationError};
pub use report::TransferError;
pub use repo::record_store::{
    ChangeKind, ImportSummary, RecordSnapshot, RecordStore, RepoError, RepoResult,
    SqliteRecordStore, StoreChange,
};
pub use repo::{Collection, RefField, StoredRecord};
pub use service::assistant_service::{
    AssistantLog, AssistantService, AssistantSession, CommandEffect, CommandOutcome, LogKind,
    SelectedContext, SuggestionKey,
};
pub use service::record_service::{
    NewFlat, NewTransaction, RecordService, RecordServiceError, RecordServiceResult,
};
pub use service::report_service::{Dashboard, ReportService};
pub use service::transfer_service::TransferService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
