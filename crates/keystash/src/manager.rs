//! Secret manager - the public facade
//!
//! Translates vault status codes into domain results. The only control flow
//! beyond that is [`SecretManager::add_or_update`], which tries an update
//! first and falls back to an add when nothing matched. The two steps are
//! not atomic together: a concurrent add of the same identifier in between
//! surfaces as [`KeystashError::EntryAlreadyExists`].

use crate::config::ManagerConfig;
use crate::error::{KeystashError, Result};
use crate::materialize::materialize;
use crate::query::QueryBuilder;
use crate::types::{AccessibilityPolicy, Identifier, ItemProcessed, Secret, SecretChanges};
use crate::vault::{Vault, VaultStatus};

/// Match limit used by callers that do not pick one
pub const DEFAULT_FIND_LIMIT: u32 = 255;

const NOT_FOUND: &str = "Requested secret not found";

/// Result of an update that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
}

/// Facade over a [`Vault`]
pub struct SecretManager<V: Vault> {
    vault: V,
    config: ManagerConfig,
    queries: QueryBuilder,
}

impl<V: Vault> SecretManager<V> {
    pub fn new(vault: V, config: ManagerConfig) -> Self {
        let queries = QueryBuilder::new(config.empty_placeholders);
        Self {
            vault,
            config,
            queries,
        }
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Add a new secret.
    ///
    /// The deployment's primary attribute must be set. An existing item with
    /// the same key is never overwritten; use [`update`](Self::update).
    pub fn add(
        &self,
        identifier: &Identifier,
        value: &str,
        comment: Option<&str>,
        policy: AccessibilityPolicy,
        synchronizable: bool,
    ) -> Result<()> {
        let primary = self.config.primary;
        if identifier.attribute(primary).is_none() {
            return Err(KeystashError::InvalidIdentifier(format!(
                "'{}' is required when adding a secret",
                primary
            )));
        }

        let query = self.queries.insert(identifier, value, comment, policy, synchronizable);
        let status = self.vault.insert(&query);
        check_status(status, "add")?;

        tracing::debug!(kind = %identifier.kind, %policy, synchronizable, "secret added");
        Ok(())
    }

    /// Retrieve up to `limit` secrets matching `identifier`.
    ///
    /// No match is an empty result, not an error. A single record that
    /// cannot be materialized fails the whole call.
    pub fn get_many(&self, identifier: &Identifier, limit: u32) -> Result<Vec<Secret>> {
        require_identifier(identifier)?;

        let query = self.queries.find(identifier, limit);
        let response = self.vault.find(&query);
        match response.status {
            VaultStatus::Success => {}
            VaultStatus::ItemNotFound => return Ok(vec![]),
            status => {
                check_status(status, "get")?;
            }
        }

        let Some(bags) = response.items else {
            tracing::warn!("vault reply could not be read as attribute bags");
            return Err(KeystashError::DataFormatMismatch);
        };

        let secrets = bags
            .iter()
            .map(|bag| materialize(bag, identifier.kind, self.config.primary))
            .collect::<Result<Vec<_>>>()
            .inspect_err(|_| tracing::warn!("vault returned an incomplete record"))?;

        tracing::debug!(count = secrets.len(), limit, "secrets retrieved");
        Ok(secrets)
    }

    /// Retrieve a single secret.
    ///
    /// Fails with [`KeystashError::EntryNotFound`] when nothing matches. When
    /// several items match, which one is returned depends on vault order.
    pub fn get_one(&self, identifier: &Identifier) -> Result<Secret> {
        self.get_many(identifier, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| KeystashError::EntryNotFound(NOT_FOUND.to_string()))
    }

    /// Change fields of the secret located by `identifier`.
    ///
    /// Only fields set in `changes` are written. Blanking the deployment's
    /// primary attribute is rejected with
    /// [`KeystashError::InvalidIdentifier`]. An empty changeset is passed
    /// through to the vault; the bundled vaults accept it as a no-op when an
    /// item matches.
    pub fn update(&self, identifier: &Identifier, changes: &SecretChanges) -> Result<()> {
        match self.try_update(identifier, changes)? {
            UpdateOutcome::Updated => Ok(()),
            UpdateOutcome::NotFound => Err(KeystashError::EntryNotFound(NOT_FOUND.to_string())),
        }
    }

    /// Update that reports "nothing matched" as an outcome instead of an error
    pub fn try_update(
        &self,
        identifier: &Identifier,
        changes: &SecretChanges,
    ) -> Result<UpdateOutcome> {
        require_identifier(identifier)?;
        let primary = self.config.primary;
        if changes.blanks(primary) {
            return Err(KeystashError::InvalidIdentifier(format!(
                "'{}' cannot be changed to an empty value",
                primary
            )));
        }

        let search = self.queries.update_search(identifier);
        let changeset = self.queries.update_changeset(changes);
        match self.vault.update(&search, &changeset) {
            VaultStatus::Success => {
                tracing::debug!(fields = changeset.len(), "secret updated");
                Ok(UpdateOutcome::Updated)
            }
            VaultStatus::ItemNotFound => Ok(UpdateOutcome::NotFound),
            status => check_status(status, "update").map(|_| UpdateOutcome::Updated),
        }
    }

    /// Remove the secrets matching `identifier`
    pub fn remove(&self, identifier: &Identifier) -> Result<()> {
        require_identifier(identifier)?;

        let query = self.queries.delete(identifier);
        check_status(self.vault.delete(&query), "remove")?;

        tracing::debug!(kind = %identifier.kind, "secret removed");
        Ok(())
    }

    /// Replace the value of an existing secret, or add it if none matches.
    ///
    /// Only the value is updated on an existing secret; `comment`, `policy`
    /// and `synchronizable` apply when the secret is added.
    pub fn add_or_update(
        &self,
        identifier: &Identifier,
        value: &str,
        comment: Option<&str>,
        policy: AccessibilityPolicy,
        synchronizable: bool,
    ) -> Result<ItemProcessed> {
        let processed = match self.try_update(identifier, &SecretChanges::value(value))? {
            UpdateOutcome::Updated => ItemProcessed::Updated,
            UpdateOutcome::NotFound => {
                self.add(identifier, value, comment, policy, synchronizable)?;
                ItemProcessed::Added
            }
        };
        Ok(processed)
    }
}

fn require_identifier(identifier: &Identifier) -> Result<()> {
    if identifier.is_specified() {
        Ok(())
    } else {
        Err(KeystashError::InvalidIdentifier(
            "'account', 'label' and 'service' cannot all be empty".to_string(),
        ))
    }
}

/// Map a vault status to the error taxonomy
fn check_status(status: VaultStatus, op: &str) -> Result<()> {
    let err = match status {
        VaultStatus::Success => return Ok(()),
        VaultStatus::MissingEntitlement => {
            tracing::error!(op, "vault denied access: missing entitlement");
            return Err(KeystashError::SecurityEntitlementError(
                "Check required entitlements and code signing settings".to_string(),
            ));
        }
        VaultStatus::DuplicateItem => KeystashError::EntryAlreadyExists(
            "Entry already exists. Use 'update' instead".to_string(),
        ),
        VaultStatus::ItemNotFound => KeystashError::EntryNotFound(NOT_FOUND.to_string()),
        VaultStatus::Other(code) => KeystashError::GenericError(code),
    };
    tracing::warn!(op, %status, "vault operation failed");
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{AttrKey, AttributeMap};
    use crate::types::{PrimaryAttribute, SecretKind};
    use crate::vault::{FindResponse, MemoryVault, Operation, ERR_IO};

    fn manager() -> SecretManager<MemoryVault> {
        SecretManager::new(MemoryVault::new(), ManagerConfig::default())
    }

    fn add(m: &SecretManager<MemoryVault>, id: &Identifier, value: &str) -> Result<()> {
        m.add(id, value, None, AccessibilityPolicy::WhenUnlocked, false)
    }

    fn upsert(
        m: &SecretManager<MemoryVault>,
        id: &Identifier,
        value: &str,
    ) -> Result<ItemProcessed> {
        m.add_or_update(id, value, None, AccessibilityPolicy::WhenUnlocked, false)
    }

    #[test]
    fn test_example_lifecycle() {
        let m = manager();
        let id = Identifier::account("a@x.com");

        add(&m, &id.clone().with_label("L"), "p1").unwrap();

        let secret = m.get_one(&id).unwrap();
        assert_eq!(secret.value, "p1");
        assert_eq!(secret.label.as_deref(), Some("L"));

        m.update(&id, &SecretChanges::value("p2")).unwrap();
        let secret = m.get_one(&id).unwrap();
        assert_eq!(secret.value, "p2");
        assert_eq!(secret.label.as_deref(), Some("L"));

        m.remove(&id).unwrap();
        assert!(matches!(m.get_one(&id), Err(KeystashError::EntryNotFound(_))));
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let m = manager();
        let id = Identifier::account("test1@account.com")
            .with_label("SimpleLabel")
            .with_service("SimpleService");
        m.add(&id, "secret", Some("a comment"), AccessibilityPolicy::AfterFirstUnlock, false)
            .unwrap();

        let secret = m.get_one(&Identifier::service("SimpleService")).unwrap();
        assert_eq!(secret.account.as_deref(), Some("test1@account.com"));
        assert_eq!(secret.label.as_deref(), Some("SimpleLabel"));
        assert_eq!(secret.service.as_deref(), Some("SimpleService"));
        assert_eq!(secret.comment.as_deref(), Some("a comment"));
        assert_eq!(secret.value, "secret");
        assert_eq!(secret.kind, SecretKind::GenericPassword);
        assert!((secret.modified - secret.created).num_seconds().abs() < 1);
    }

    #[test]
    fn test_empty_identifier_is_rejected() {
        let m = manager();
        let empty = Identifier::default().with_service("");
        let invalid = |r: Result<()>| matches!(r, Err(KeystashError::InvalidIdentifier(_)));

        assert!(invalid(m.get_many(&empty, 10).map(|_| ())));
        assert!(invalid(m.get_one(&empty).map(|_| ())));
        assert!(invalid(m.update(&empty, &SecretChanges::value("x"))));
        assert!(invalid(m.remove(&empty)));
        assert_eq!(m.vault().calls(Operation::Find), 0);
        assert_eq!(m.vault().calls(Operation::Update), 0);
        assert_eq!(m.vault().calls(Operation::Delete), 0);
    }

    #[test]
    fn test_add_requires_primary_attribute() {
        let m = manager();
        let result = add(&m, &Identifier::label("L"), "v");
        assert!(matches!(result, Err(KeystashError::InvalidIdentifier(_))));

        let label_primary = SecretManager::new(
            MemoryVault::new(),
            ManagerConfig {
                primary: PrimaryAttribute::Label,
                ..Default::default()
            },
        );
        label_primary
            .add(&Identifier::label("L"), "v", None, AccessibilityPolicy::WhenUnlocked, false)
            .unwrap();
        assert_eq!(label_primary.get_one(&Identifier::label("L")).unwrap().value, "v");
    }

    #[test]
    fn test_add_duplicate() {
        let m = manager();
        let id = Identifier::account("a");
        add(&m, &id, "1").unwrap();
        assert!(matches!(add(&m, &id, "2"), Err(KeystashError::EntryAlreadyExists(_))));
        assert_eq!(m.get_one(&id).unwrap().value, "1");
    }

    #[test]
    fn test_plural_vs_singular_on_no_match() {
        let m = manager();
        let id = Identifier::account("nobody");
        assert_eq!(m.get_many(&id, DEFAULT_FIND_LIMIT).unwrap(), vec![]);
        assert!(matches!(m.get_one(&id), Err(KeystashError::EntryNotFound(_))));
    }

    #[test]
    fn test_multiple_matches() {
        let m = manager();
        add(&m, &Identifier::account("one").with_label("shared"), "1").unwrap();
        add(&m, &Identifier::account("two").with_label("shared"), "2").unwrap();

        let shared = Identifier::label("shared");
        let all = m.get_many(&shared, DEFAULT_FIND_LIMIT).unwrap();
        assert_eq!(all.len(), 2);

        // Reads are repeatable
        let sorted = |mut secrets: Vec<Secret>| {
            secrets.sort_by(|a, b| a.account.cmp(&b.account));
            secrets
        };
        let again = m.get_many(&shared, DEFAULT_FIND_LIMIT).unwrap();
        assert_eq!(sorted(all), sorted(again));

        let one = m.get_one(&shared).unwrap();
        assert!(["1", "2"].contains(&one.value.as_str()));

        assert_eq!(m.get_many(&shared, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_kind_separates_items() {
        let m = manager();
        let id = Identifier::account("a");
        add(&m, &id.clone().with_kind(SecretKind::InternetPassword), "web").unwrap();
        assert!(m.get_one(&id).is_err());
        let secret = m.get_one(&id.with_kind(SecretKind::InternetPassword)).unwrap();
        assert_eq!(secret.kind, SecretKind::InternetPassword);
    }

    #[test]
    fn test_upsert() {
        let m = manager();
        let id = Identifier::account("a").with_label("L");

        assert_eq!(upsert(&m, &id, "v1").unwrap(), ItemProcessed::Added);
        assert_eq!(upsert(&m, &id, "v2").unwrap(), ItemProcessed::Updated);
        assert_eq!(m.get_one(&id).unwrap().value, "v2");
        assert_eq!(m.vault().calls(Operation::Insert), 1);
    }

    #[test]
    fn test_upsert_propagates_update_failure_without_adding() {
        let m = manager();
        m.vault().fail_with(Operation::Update, VaultStatus::Other(ERR_IO));

        let result = upsert(&m, &Identifier::account("a"), "v");
        assert_eq!(result, Err(KeystashError::GenericError(ERR_IO)));
        assert_eq!(m.vault().calls(Operation::Insert), 0);
    }

    #[test]
    fn test_upsert_propagates_add_failure() {
        let m = manager();
        m.vault().fail_with(Operation::Insert, VaultStatus::DuplicateItem);

        let result = upsert(&m, &Identifier::account("a"), "v");
        assert!(matches!(result, Err(KeystashError::EntryAlreadyExists(_))));
        assert_eq!(m.vault().calls(Operation::Update), 1);
        assert_eq!(m.vault().calls(Operation::Insert), 1);
    }

    #[test]
    fn test_remove_twice() {
        let m = manager();
        let id = Identifier::account("a");
        add(&m, &id, "v").unwrap();
        m.remove(&id).unwrap();
        assert!(matches!(m.remove(&id), Err(KeystashError::EntryNotFound(_))));
    }

    #[test]
    fn test_update_is_sparse() {
        let m = manager();
        let id = Identifier::account("a").with_label("L").with_service("S");
        m.add(&id, "v1", Some("note"), AccessibilityPolicy::WhenUnlocked, false)
            .unwrap();

        m.update(&Identifier::account("a"), &SecretChanges::value("v2")).unwrap();

        let secret = m.get_one(&Identifier::account("a")).unwrap();
        assert_eq!(secret.value, "v2");
        assert_eq!(secret.label.as_deref(), Some("L"));
        assert_eq!(secret.service.as_deref(), Some("S"));
        assert_eq!(secret.comment.as_deref(), Some("note"));
        assert!(secret.modified >= secret.created);
    }

    #[test]
    fn test_update_renames_identity() {
        let m = manager();
        add(&m, &Identifier::account("old").with_label("L"), "v").unwrap();

        let changes = SecretChanges::default()
            .with_account("new")
            .with_label("L2")
            .with_comment("moved");
        m.update(&Identifier::account("old"), &changes).unwrap();

        assert!(m.get_one(&Identifier::account("old")).is_err());
        let secret = m.get_one(&Identifier::label("L2")).unwrap();
        assert_eq!(secret.account.as_deref(), Some("new"));
        assert_eq!(secret.comment.as_deref(), Some("moved"));
    }

    #[test]
    fn test_update_cannot_blank_primary() {
        let m = manager();
        add(&m, &Identifier::account("a").with_label("L"), "v").unwrap();

        let blank = SecretChanges::default().with_account("");
        let result = m.update(&Identifier::account("a"), &blank);
        assert!(matches!(result, Err(KeystashError::InvalidIdentifier(_))));
        assert_eq!(m.vault().calls(Operation::Update), 0);

        let secret = m.get_one(&Identifier::label("L")).unwrap();
        assert_eq!(secret.account.as_deref(), Some("a"));

        // Non-primary attributes may still be blanked
        m.update(&Identifier::account("a"), &SecretChanges::default().with_label(""))
            .unwrap();
        assert_eq!(m.get_one(&Identifier::account("a")).unwrap().label.as_deref(), Some(""));
    }

    #[test]
    fn test_blank_primary_in_vault_is_incomplete() {
        // Another writer blanked the account behind the manager's back
        let m = manager();
        add(&m, &Identifier::account("a").with_label("L"), "v").unwrap();
        let search = QueryBuilder::default().update_search(&Identifier::account("a"));
        let changeset =
            QueryBuilder::default().update_changeset(&SecretChanges::default().with_account(""));
        assert_eq!(m.vault().update(&search, &changeset), VaultStatus::Success);

        assert_eq!(
            m.get_one(&Identifier::label("L")),
            Err(KeystashError::EntryIsMissingElements)
        );
    }

    #[test]
    fn test_empty_changeset() {
        let m = manager();
        let id = Identifier::account("a");
        add(&m, &id, "v").unwrap();
        let before = m.get_one(&id).unwrap();

        m.update(&id, &SecretChanges::default()).unwrap();
        assert_eq!(m.get_one(&id).unwrap(), before);

        let missing = m.update(&Identifier::account("b"), &SecretChanges::default());
        assert!(matches!(missing, Err(KeystashError::EntryNotFound(_))));
    }

    #[test]
    fn test_update_missing_entry() {
        let m = manager();
        let id = Identifier::account("ghost");
        assert!(matches!(
            m.update(&id, &SecretChanges::value("x")),
            Err(KeystashError::EntryNotFound(_))
        ));
        assert_eq!(m.try_update(&id, &SecretChanges::value("x")).unwrap(), UpdateOutcome::NotFound);
    }

    #[test]
    fn test_status_mapping() {
        let m = manager();
        let id = Identifier::account("a");

        m.vault().fail_with(Operation::Insert, VaultStatus::MissingEntitlement);
        assert!(matches!(add(&m, &id, "v"), Err(KeystashError::SecurityEntitlementError(_))));

        m.vault().fail_with(Operation::Insert, VaultStatus::Other(-4));
        assert_eq!(add(&m, &id, "v"), Err(KeystashError::GenericError(-4)));

        m.vault().fail_with(Operation::Find, VaultStatus::Other(-4));
        assert_eq!(m.get_many(&id, 5), Err(KeystashError::GenericError(-4)));

        m.vault().fail_with(Operation::Delete, VaultStatus::MissingEntitlement);
        assert!(matches!(m.remove(&id), Err(KeystashError::SecurityEntitlementError(_))));
    }

    struct ScriptedVault(FindResponse);

    impl Vault for ScriptedVault {
        fn insert(&self, _: &AttributeMap) -> VaultStatus {
            VaultStatus::Success
        }
        fn find(&self, _: &AttributeMap) -> FindResponse {
            self.0.clone()
        }
        fn update(&self, _: &AttributeMap, _: &AttributeMap) -> VaultStatus {
            VaultStatus::Success
        }
        fn delete(&self, _: &AttributeMap) -> VaultStatus {
            VaultStatus::Success
        }
    }

    #[test]
    fn test_unreadable_and_incomplete_replies() {
        let id = Identifier::account("a");

        let unreadable = SecretManager::new(
            ScriptedVault(FindResponse {
                status: VaultStatus::Success,
                items: None,
            }),
            ManagerConfig::default(),
        );
        assert_eq!(unreadable.get_many(&id, 5), Err(KeystashError::DataFormatMismatch));

        // One good bag and one without timestamps: nothing is returned
        let good = {
            let m = manager();
            add(&m, &id, "v").unwrap();
            m.vault().find(&QueryBuilder::default().find(&id, 1)).items.unwrap().remove(0)
        };
        let mut bad = good.clone();
        bad.remove(&AttrKey::CreationDate);
        let incomplete = SecretManager::new(
            ScriptedVault(FindResponse::found(vec![good, bad])),
            ManagerConfig::default(),
        );
        assert_eq!(incomplete.get_many(&id, 5), Err(KeystashError::EntryIsMissingElements));
    }

    #[test]
    fn test_placeholder_mode_affects_matching() {
        let m = SecretManager::new(
            MemoryVault::new(),
            ManagerConfig {
                empty_placeholders: true,
                ..Default::default()
            },
        );
        add(&m, &Identifier::account("a"), "v").unwrap();

        let secret = m.get_one(&Identifier::account("a")).unwrap();
        assert_eq!(secret.label.as_deref(), Some(""));
        assert_eq!(secret.comment.as_deref(), Some(""));
    }
}
