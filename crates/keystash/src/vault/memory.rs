//! In-memory vault
//!
//! Holds items for the lifetime of the process. Used as the test double for
//! the secret manager: any operation can be forced to answer with a given
//! status, and every call is counted.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::store::ItemStore;
use super::{FindResponse, Operation, Vault, VaultStatus};
use crate::query::AttributeMap;

/// Vault keeping its items in process memory
#[derive(Debug, Default)]
pub struct MemoryVault {
    store: Mutex<ItemStore>,
    failures: Mutex<HashMap<Operation, VaultStatus>>,
    calls: Mutex<HashMap<Operation, usize>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every future `op` with `status` instead of touching the store
    pub fn fail_with(&self, op: Operation, status: VaultStatus) {
        lock(&self.failures).insert(op, status);
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Number of times `op` has been called
    pub fn calls(&self, op: Operation) -> usize {
        lock(&self.calls).get(&op).copied().unwrap_or(0)
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        lock(&self.store).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.store).is_empty()
    }

    /// Record the call and return the injected status, if any
    fn enter(&self, op: Operation) -> Option<VaultStatus> {
        *lock(&self.calls).entry(op).or_insert(0) += 1;
        lock(&self.failures).get(&op).copied()
    }
}

impl Vault for MemoryVault {
    fn insert(&self, attrs: &AttributeMap) -> VaultStatus {
        if let Some(status) = self.enter(Operation::Insert) {
            return status;
        }
        lock(&self.store).insert(attrs, Utc::now())
    }

    fn find(&self, query: &AttributeMap) -> FindResponse {
        if let Some(status) = self.enter(Operation::Find) {
            return FindResponse::status(status);
        }
        lock(&self.store).find(query)
    }

    fn update(&self, search: &AttributeMap, changes: &AttributeMap) -> VaultStatus {
        if let Some(status) = self.enter(Operation::Update) {
            return status;
        }
        lock(&self.store).update(search, changes, Utc::now())
    }

    fn delete(&self, query: &AttributeMap) -> VaultStatus {
        if let Some(status) = self.enter(Operation::Delete) {
            return status;
        }
        lock(&self.store).delete(query)
    }
}
