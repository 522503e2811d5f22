//! Use-case services over a record store.
//!
//! # Responsibility
//! - Orchestrate store calls into the operations a shell exposes.
//! - Keep shells decoupled from storage details.

pub mod assistant_service;
pub mod record_service;
pub mod report_service;
pub mod transfer_service;
