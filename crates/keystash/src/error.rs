//! Error taxonomy surfaced by the secret manager

use thiserror::Error;

/// Errors returned by [`SecretManager`](crate::SecretManager) operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeystashError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Entry already exists: {0}")]
    EntryAlreadyExists(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// The vault refused access because the process lacks a capability.
    /// Points at deployment misconfiguration, never a transient condition.
    #[error("Security entitlement error: {0}")]
    SecurityEntitlementError(String),

    #[error("Vault returned data in an unexpected format")]
    DataFormatMismatch,

    #[error("Vault entry is missing required elements")]
    EntryIsMissingElements,

    #[error("Vault error (status {0})")]
    GenericError(i32),
}

impl KeystashError {
    /// Whether this error reports a missing entry
    pub fn is_not_found(&self) -> bool {
        matches!(self, KeystashError::EntryNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, KeystashError>;
