//! Property-style access to one secret
//!
//! A [`SecretSlot`] binds an identifier and its creation settings so callers
//! can read, write and clear a secret like a variable.

use crate::error::Result;
use crate::manager::SecretManager;
use crate::types::{AccessibilityPolicy, Identifier, SecretChanges};
use crate::vault::Vault;

/// One secret, addressed through a [`SecretManager`]
pub struct SecretSlot<'a, V: Vault> {
    manager: &'a SecretManager<V>,
    identifier: Identifier,
    comment: Option<String>,
    policy: AccessibilityPolicy,
    synchronizable: bool,
}

impl<'a, V: Vault> SecretSlot<'a, V> {
    pub fn new(manager: &'a SecretManager<V>, identifier: Identifier) -> Self {
        Self {
            manager,
            identifier,
            comment: None,
            policy: AccessibilityPolicy::default(),
            synchronizable: false,
        }
    }

    /// Comment written when the secret is first created
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_policy(mut self, policy: AccessibilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn synchronized(mut self) -> Self {
        self.synchronizable = true;
        self
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Current value, or `None` if it cannot be read.
    ///
    /// A missing secret is the normal state before the first write and is
    /// only logged at debug level.
    pub fn get(&self) -> Option<String> {
        match self.manager.get_one(&self.identifier) {
            Ok(secret) => Some(secret.value),
            Err(e) if e.is_not_found() => {
                tracing::debug!("secret not stored yet");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read secret");
                None
            }
        }
    }

    /// Store `value`, or remove the secret when `value` is `None`
    pub fn set(&self, value: Option<&str>) -> Result<()> {
        let Some(value) = value else {
            return self.manager.remove(&self.identifier);
        };

        if self.manager.get_one(&self.identifier).is_ok() {
            self.manager
                .update(&self.identifier, &SecretChanges::value(value))
        } else {
            self.manager.add(
                &self.identifier,
                value,
                self.comment.as_deref(),
                self.policy,
                self.synchronizable,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::error::KeystashError;
    use crate::vault::{MemoryVault, Operation, VaultStatus};

    #[test]
    fn test_slot_lifecycle() {
        let manager = SecretManager::new(MemoryVault::new(), ManagerConfig::default());
        let slot = SecretSlot::new(&manager, Identifier::account("mySimpleSecret"))
            .with_comment("cli token");

        assert_eq!(slot.get(), None);

        slot.set(Some("first")).unwrap();
        assert_eq!(slot.get().as_deref(), Some("first"));

        slot.set(Some("second")).unwrap();
        assert_eq!(slot.get().as_deref(), Some("second"));
        assert_eq!(manager.vault().calls(Operation::Insert), 1);
        assert_eq!(
            manager.get_one(slot.identifier()).unwrap().comment.as_deref(),
            Some("cli token")
        );

        slot.set(None).unwrap();
        assert_eq!(slot.get(), None);
        assert!(matches!(slot.set(None), Err(KeystashError::EntryNotFound(_))));
    }

    #[test]
    fn test_slot_hides_read_failures() {
        let manager = SecretManager::new(MemoryVault::new(), ManagerConfig::default());
        let slot = SecretSlot::new(&manager, Identifier::account("a"));
        slot.set(Some("v")).unwrap();

        manager.vault().fail_with(Operation::Find, VaultStatus::MissingEntitlement);
        assert_eq!(slot.get(), None);
    }
}
