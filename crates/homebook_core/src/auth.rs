//! Single-password login gate and persisted session flag.
//!
//! # Responsibility
//! - Compare the SHA-256 of a typed password with one configured digest.
//! - Persist the unlocked flag in `app_state` until explicit logout.
//!
//! # Invariants
//! - There is no user identity; the gate only answers locked/unlocked.
//! - Without a configured digest every gated operation is refused.
//! - Passwords and digests are never logged.

use crate::repo::app_state_repo::SqliteAppStateRepository;
use crate::repo::record_store::RepoError;
use log::{info, warn};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};

const SESSION_KEY: &str = "logged_in";

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug)]
pub enum AuthError {
    /// No password digest configured.
    NotConfigured,
    /// Configured digest is not 64 hex characters.
    MalformedDigest,
    InvalidPassword,
    /// Session has not been unlocked by a login.
    Locked,
    Repo(RepoError),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "no password is configured"),
            Self::MalformedDigest => {
                write!(f, "configured password digest must be 64 hex characters")
            }
            Self::InvalidPassword => write!(f, "Invalid password"),
            Self::Locked => write!(f, "session is locked; log in first"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AuthError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Holds the expected password digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordGate {
    expected_hex: String,
}

impl PasswordGate {
    pub fn new(expected_hex: &str) -> Result<Self, AuthError> {
        let normalized = expected_hex.trim().to_ascii_lowercase();
        if normalized.len() != 64 || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AuthError::MalformedDigest);
        }
        Ok(Self {
            expected_hex: normalized,
        })
    }

    /// Builds the gate from an optional configured digest.
    pub fn from_config(expected_hex: Option<&str>) -> Result<Self, AuthError> {
        match expected_hex {
            Some(value) if !value.trim().is_empty() => Self::new(value),
            _ => Err(AuthError::NotConfigured),
        }
    }

    pub fn verify(&self, password: &str) -> bool {
        sha256_hex(password.as_bytes()) == self.expected_hex
    }
}

/// Persisted unlocked flag.
pub struct SessionState<'conn> {
    state: SqliteAppStateRepository<'conn>,
}

impl<'conn> SessionState<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            state: SqliteAppStateRepository::new(conn),
        }
    }

    pub fn is_unlocked(&self) -> Result<bool, AuthError> {
        Ok(self.state.get(SESSION_KEY)?.as_deref() == Some("true"))
    }

    /// Unlocks the session when `password` matches; the flag survives restarts.
    pub fn login(&self, gate: &PasswordGate, password: &str) -> Result<(), AuthError> {
        if !gate.verify(password) {
            warn!("event=login module=auth status=rejected");
            return Err(AuthError::InvalidPassword);
        }
        self.state.set(SESSION_KEY, "true")?;
        info!("event=login module=auth status=ok");
        Ok(())
    }

    /// Admits a gated operation only when a valid digest is configured and
    /// the session is unlocked.
    pub fn ensure_unlocked(&self, expected_hex: Option<&str>) -> Result<(), AuthError> {
        let gate = PasswordGate::from_config(expected_hex);
        if let Err(err) = &gate {
            warn!("event=login_gate module=auth status=refused reason={err}");
        }
        gate?;
        if !self.is_unlocked()? {
            warn!("event=login_gate module=auth status=locked");
            return Err(AuthError::Locked);
        }
        Ok(())
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        self.state.remove(SESSION_KEY)?;
        info!("event=logout module=auth status=ok");
        Ok(())
    }
}
