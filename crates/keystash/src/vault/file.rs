//! File vault - age-encrypted item store on local disk
//!
//! Layout under the vault root:
//! - `keys/identity.key`: X25519 identity (mode 600)
//! - `vault/items.age`: every item as one encrypted JSON document (mode 600)
//!
//! Each operation decrypts the item file, applies the change and writes it
//! back. Operations are serialized within the process; concurrent writers
//! in other processes are not coordinated.

use age::secrecy::ExposeSecret;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::fs::{self, File, Permissions};
use std::io::{Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use super::store::ItemStore;
use super::{FindResponse, Vault, VaultStatus, ERR_DECODE, ERR_IO, ERR_NOT_AVAILABLE};
use crate::query::AttributeMap;

/// File vault failures, reported to callers as native status codes
#[derive(Error, Debug)]
pub enum FileVaultError {
    #[error("Vault not initialized - run 'keystash init' first")]
    NotInitialized,

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Item file is corrupt: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FileVaultError {
    pub fn status(&self) -> VaultStatus {
        match self {
            FileVaultError::NotInitialized => VaultStatus::Other(ERR_NOT_AVAILABLE),
            FileVaultError::Corrupt(_) => VaultStatus::Other(ERR_DECODE),
            FileVaultError::Encryption(_)
            | FileVaultError::Decryption(_)
            | FileVaultError::Io(_) => VaultStatus::Other(ERR_IO),
        }
    }
}

/// Age-encrypted vault stored in a directory
pub struct FileVault {
    /// Root directory for the vault
    root: PathBuf,
    /// Directory holding the item file
    vault_dir: PathBuf,
    /// Directory for identity keys
    keys_dir: PathBuf,
    /// Path to the identity key file
    identity_path: PathBuf,
    /// Path to the encrypted item file
    items_path: PathBuf,
    guard: Mutex<()>,
}

impl FileVault {
    /// Create a vault handle rooted at `root`. Nothing is touched on disk.
    pub fn new(root: &Path) -> Self {
        let vault_dir = root.join("vault");
        let keys_dir = root.join("keys");
        let identity_path = keys_dir.join("identity.key");
        let items_path = vault_dir.join("items.age");

        Self {
            root: root.to_path_buf(),
            vault_dir,
            keys_dir,
            identity_path,
            items_path,
            guard: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Initialize the vault - create directories and generate identity key.
    ///
    /// Returns the public key; re-running on an initialized vault keeps the
    /// existing identity.
    pub fn init(&self) -> Result<String> {
        // Create directories with secure permissions
        fs::create_dir_all(&self.vault_dir)?;
        fs::create_dir_all(&self.keys_dir)?;

        // Set directory permissions to 700
        fs::set_permissions(&self.root, Permissions::from_mode(0o700))?;
        fs::set_permissions(&self.vault_dir, Permissions::from_mode(0o700))?;
        fs::set_permissions(&self.keys_dir, Permissions::from_mode(0o700))?;

        // Keep an existing identity
        if self.identity_path.exists() {
            return self.public_key();
        }

        // Generate new identity
        let identity = age::x25519::Identity::generate();
        let identity_str = identity.to_string();

        // Write identity to file with secure permissions
        let mut file = File::create(&self.identity_path)?;
        file.write_all(identity_str.expose_secret().as_bytes())?;
        fs::set_permissions(&self.identity_path, Permissions::from_mode(0o600))?;

        tracing::info!(root = %self.root.display(), "initialized file vault");
        Ok(identity.to_public().to_string())
    }

    /// Check if the vault is initialized
    pub fn is_initialized(&self) -> bool {
        self.identity_path.exists()
    }

    /// Get the public key (recipient)
    pub fn public_key(&self) -> Result<String> {
        if !self.is_initialized() {
            bail!(FileVaultError::NotInitialized);
        }
        let identity = self.load_identity()?;
        Ok(identity.to_public().to_string())
    }

    fn load_identity(&self) -> std::result::Result<age::x25519::Identity, FileVaultError> {
        if !self.is_initialized() {
            return Err(FileVaultError::NotInitialized);
        }
        let content = fs::read_to_string(&self.identity_path)?;
        content
            .trim()
            .parse::<age::x25519::Identity>()
            .map_err(|e| FileVaultError::Decryption(format!("Failed to parse identity: {}", e)))
    }

    /// Decrypt and parse the item file; a missing file is an empty store
    fn load(
        &self,
        identity: &age::x25519::Identity,
    ) -> std::result::Result<ItemStore, FileVaultError> {
        if !self.items_path.exists() {
            return Ok(ItemStore::new());
        }

        // Read encrypted data
        let encrypted = fs::read(&self.items_path)?;
        let decryptor = match age::Decryptor::new(&encrypted[..])
            .map_err(|e| FileVaultError::Decryption(e.to_string()))?
        {
            age::Decryptor::Recipients(d) => d,
            _ => {
                return Err(FileVaultError::Decryption(
                    "Unexpected passphrase encryption".to_string(),
                ))
            }
        };

        // Decrypt
        let mut decrypted = vec![];
        let mut reader = decryptor
            .decrypt(std::iter::once(identity as &dyn age::Identity))
            .map_err(|e| FileVaultError::Decryption(e.to_string()))?;
        reader
            .read_to_end(&mut decrypted)
            .map_err(|e| FileVaultError::Decryption(e.to_string()))?;

        serde_json::from_slice(&decrypted).map_err(|e| FileVaultError::Corrupt(e.to_string()))
    }

    /// Encrypt the store and replace the item file
    fn save(
        &self,
        identity: &age::x25519::Identity,
        store: &ItemStore,
    ) -> std::result::Result<(), FileVaultError> {
        let plaintext =
            serde_json::to_vec(store).map_err(|e| FileVaultError::Encryption(e.to_string()))?;

        // Encrypt to our own public key
        let encryptor = age::Encryptor::with_recipients(vec![Box::new(identity.to_public())])
            .ok_or_else(|| FileVaultError::Encryption("No recipients".to_string()))?;

        let mut encrypted = vec![];
        let mut writer = encryptor
            .wrap_output(&mut encrypted)
            .map_err(|e| FileVaultError::Encryption(e.to_string()))?;
        writer
            .write_all(&plaintext)
            .map_err(|e| FileVaultError::Encryption(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| FileVaultError::Encryption(e.to_string()))?;

        // Write to a temp file first, then swap it in
        fs::create_dir_all(&self.vault_dir)?;
        let tmp_path = self.items_path.with_extension("age.tmp");
        let mut file = File::create(&tmp_path)?;
        file.write_all(&encrypted)?;
        fs::set_permissions(&tmp_path, Permissions::from_mode(0o600))?;
        fs::rename(&tmp_path, &self.items_path)?;

        Ok(())
    }

    /// Run a mutating operation against the decrypted store
    fn mutate<F>(&self, op: &str, apply: F) -> VaultStatus
    where
        F: FnOnce(&mut ItemStore) -> VaultStatus,
    {
        let _guard = self.guard.lock().unwrap_or_else(|p| p.into_inner());

        let result = self.load_identity().and_then(|identity| {
            let mut store = self.load(&identity)?;
            let status = apply(&mut store);
            if status.is_success() {
                self.save(&identity, &store)?;
            }
            Ok(status)
        });

        result.unwrap_or_else(|e| {
            tracing::warn!(op, error = %e, "file vault operation failed");
            e.status()
        })
    }

    /// Check the item file can be decrypted, for diagnostics
    pub fn verify(&self) -> Result<usize> {
        let identity = self.load_identity()?;
        let store = self
            .load(&identity)
            .with_context(|| format!("Failed to read {}", self.items_path.display()))?;
        Ok(store.len())
    }
}

impl Vault for FileVault {
    fn insert(&self, attrs: &AttributeMap) -> VaultStatus {
        self.mutate("insert", |store| store.insert(attrs, Utc::now()))
    }

    fn find(&self, query: &AttributeMap) -> FindResponse {
        let _guard = self.guard.lock().unwrap_or_else(|p| p.into_inner());

        let loaded = self.load_identity().and_then(|identity| self.load(&identity));
        match loaded {
            Ok(store) => store.find(query),
            Err(FileVaultError::Corrupt(e)) => {
                tracing::warn!(error = %e, "item file decrypted but could not be parsed");
                FindResponse {
                    status: VaultStatus::Success,
                    items: None,
                }
            }
            Err(e) => {
                tracing::warn!(op = "find", error = %e, "file vault operation failed");
                FindResponse::status(e.status())
            }
        }
    }

    fn update(&self, search: &AttributeMap, changes: &AttributeMap) -> VaultStatus {
        self.mutate("update", |store| store.update(search, changes, Utc::now()))
    }

    fn delete(&self, query: &AttributeMap) -> VaultStatus {
        self.mutate("delete", |store| store.delete(query))
    }
}
