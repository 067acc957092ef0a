//! Vault adapter - the narrow boundary to the secure storage engine
//!
//! Four operations, each answering with a status code from a closed set.
//! This is the single injection point for the storage backend:
//! - [`MemoryVault`]: in-process store for tests, with failure injection
//! - [`FileVault`]: age-encrypted item file on local disk

pub mod file;
pub mod memory;
pub mod store;

pub use file::FileVault;
pub use memory::MemoryVault;

use std::fmt;

use crate::query::AttributeMap;

/// Native status code for success
pub const ERR_SUCCESS: i32 = 0;
/// Item could not be found
pub const ERR_ITEM_NOT_FOUND: i32 = -25300;
/// Item already exists
pub const ERR_DUPLICATE_ITEM: i32 = -25299;
/// Required entitlement is missing
pub const ERR_MISSING_ENTITLEMENT: i32 = -34018;
/// Vault is not available (not initialized, locked)
pub const ERR_NOT_AVAILABLE: i32 = -25291;
/// I/O failure
pub const ERR_IO: i32 = -36;
/// Stored data could not be decoded
pub const ERR_DECODE: i32 = -26275;
/// Malformed query
pub const ERR_PARAM: i32 = -50;

/// Outcome of a vault operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VaultStatus {
    Success,
    ItemNotFound,
    DuplicateItem,
    MissingEntitlement,
    Other(i32),
}

impl VaultStatus {
    /// Native numeric code
    pub fn code(&self) -> i32 {
        match self {
            VaultStatus::Success => ERR_SUCCESS,
            VaultStatus::ItemNotFound => ERR_ITEM_NOT_FOUND,
            VaultStatus::DuplicateItem => ERR_DUPLICATE_ITEM,
            VaultStatus::MissingEntitlement => ERR_MISSING_ENTITLEMENT,
            VaultStatus::Other(code) => *code,
        }
    }

    /// Classify a native numeric code
    pub fn from_code(code: i32) -> Self {
        match code {
            ERR_SUCCESS => VaultStatus::Success,
            ERR_ITEM_NOT_FOUND => VaultStatus::ItemNotFound,
            ERR_DUPLICATE_ITEM => VaultStatus::DuplicateItem,
            ERR_MISSING_ENTITLEMENT => VaultStatus::MissingEntitlement,
            other => VaultStatus::Other(other),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, VaultStatus::Success)
    }
}

impl fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultStatus::Success => write!(f, "success"),
            VaultStatus::ItemNotFound => write!(f, "item not found"),
            VaultStatus::DuplicateItem => write!(f, "duplicate item"),
            VaultStatus::MissingEntitlement => write!(f, "missing entitlement"),
            VaultStatus::Other(code) => write!(f, "status {}", code),
        }
    }
}

/// Reply to a find query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindResponse {
    pub status: VaultStatus,
    /// Raw attribute bags, at most the requested limit. `None` when the
    /// vault replied with something that could not be read as bags.
    pub items: Option<Vec<AttributeMap>>,
}

impl FindResponse {
    pub fn found(items: Vec<AttributeMap>) -> Self {
        Self {
            status: VaultStatus::Success,
            items: Some(items),
        }
    }

    pub fn status(status: VaultStatus) -> Self {
        Self {
            status,
            items: None,
        }
    }
}

/// Vault operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Find,
    Update,
    Delete,
}

/// The storage engine contract.
///
/// Each call is expected to be atomic on the vault side. Result order of
/// `find` is whatever the vault yields.
pub trait Vault: Send + Sync {
    /// Add a new item described by `attrs`
    fn insert(&self, attrs: &AttributeMap) -> VaultStatus;

    /// Look up items matching `query`
    fn find(&self, query: &AttributeMap) -> FindResponse;

    /// Apply `changes` to the items matching `search`
    fn update(&self, search: &AttributeMap, changes: &AttributeMap) -> VaultStatus;

    /// Remove the items matching `query`
    fn delete(&self, query: &AttributeMap) -> VaultStatus;
}

impl<V: Vault + ?Sized> Vault for std::sync::Arc<V> {
    fn insert(&self, attrs: &AttributeMap) -> VaultStatus {
        (**self).insert(attrs)
    }

    fn find(&self, query: &AttributeMap) -> FindResponse {
        (**self).find(query)
    }

    fn update(&self, search: &AttributeMap, changes: &AttributeMap) -> VaultStatus {
        (**self).update(search, changes)
    }

    fn delete(&self, query: &AttributeMap) -> VaultStatus {
        (**self).delete(query)
    }
}
