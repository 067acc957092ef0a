//! keystash - typed facade over a secure credential vault
//!
//! Secrets (passwords, tokens, keys) are addressed by any combination of
//! account, label and service, plus a kind. The [`SecretManager`] turns
//! those identifiers into vault queries, maps the vault's status codes to
//! [`KeystashError`], and materializes results as [`Secret`] records.
//!
//! The storage engine sits behind the [`Vault`] trait. Two backends ship
//! with the crate: [`MemoryVault`] for tests and [`FileVault`], an
//! age-encrypted (X25519 + ChaCha20-Poly1305) item file.

pub mod accessor;
pub mod config;
pub mod error;
pub mod manager;
pub mod materialize;
pub mod query;
pub mod types;
pub mod vault;

pub use accessor::SecretSlot;
pub use config::{KeystashConfig, ManagerConfig};
pub use error::{KeystashError, Result};
pub use manager::{SecretManager, UpdateOutcome, DEFAULT_FIND_LIMIT};
pub use types::{
    AccessibilityPolicy, Identifier, ItemProcessed, PrimaryAttribute, Secret, SecretChanges,
    SecretKind,
};
pub use vault::{FileVault, MemoryVault, Vault, VaultStatus};
