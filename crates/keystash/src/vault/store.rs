//! Item store shared by the bundled vault backends
//!
//! Implements the vault-side semantics: attribute matching, uniqueness,
//! timestamps and match limits. Backends wrap an [`ItemStore`] and decide
//! where it lives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FindResponse, VaultStatus, ERR_PARAM};
use crate::query::{text, AttrKey, AttrValue, AttributeMap};

/// Match limit used when a find query does not carry one
pub const DEFAULT_MATCH_LIMIT: u32 = 1;

/// One persisted item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredItem {
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub value: Vec<u8>,
    pub accessible: String,
    #[serde(default)]
    pub synchronizable: bool,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl StoredItem {
    fn field(&self, key: AttrKey) -> Option<&str> {
        match key {
            AttrKey::Class => Some(&self.class),
            AttrKey::Account => self.account.as_deref(),
            AttrKey::Label => self.label.as_deref(),
            AttrKey::Service => self.service.as_deref(),
            AttrKey::Comment => self.comment.as_deref(),
            AttrKey::Accessible => Some(&self.accessible),
            _ => None,
        }
    }

    /// Whether every text attribute of the query equals the stored one
    fn matches(&self, query: &AttributeMap) -> bool {
        const MATCHED: [AttrKey; 6] = [
            AttrKey::Class,
            AttrKey::Account,
            AttrKey::Label,
            AttrKey::Service,
            AttrKey::Comment,
            AttrKey::Accessible,
        ];

        MATCHED.iter().all(|key| match text(query, *key) {
            Some(wanted) => self.field(*key) == Some(wanted),
            None => true,
        }) && match query.get(&AttrKey::Synchronizable).and_then(AttrValue::as_bool) {
            Some(sync) => self.synchronizable == sync,
            None => true,
        }
    }

    /// Attributes that make an item unique within the store
    fn unique_key(&self) -> (&str, Option<&str>, Option<&str>, bool) {
        (
            &self.class,
            self.account.as_deref(),
            self.service.as_deref(),
            self.synchronizable,
        )
    }

    fn to_bag(&self, with_data: bool, with_attributes: bool) -> AttributeMap {
        let mut bag = AttributeMap::new();
        if with_attributes {
            bag.insert(AttrKey::Class, AttrValue::Text(self.class.clone()));
            for (key, value) in [
                (AttrKey::Account, &self.account),
                (AttrKey::Label, &self.label),
                (AttrKey::Service, &self.service),
                (AttrKey::Comment, &self.comment),
            ] {
                if let Some(v) = value {
                    bag.insert(key, AttrValue::Text(v.clone()));
                }
            }
            bag.insert(AttrKey::Accessible, AttrValue::Text(self.accessible.clone()));
            bag.insert(AttrKey::Synchronizable, AttrValue::Bool(self.synchronizable));
            bag.insert(AttrKey::CreationDate, AttrValue::Date(self.created));
            bag.insert(AttrKey::ModificationDate, AttrValue::Date(self.modified));
        }
        if with_data {
            bag.insert(AttrKey::ValueData, AttrValue::Bytes(self.value.clone()));
        }
        bag
    }

    fn apply(&mut self, changes: &AttributeMap, now: DateTime<Utc>) {
        for (key, value) in changes {
            match (key, value) {
                (AttrKey::Account, AttrValue::Text(v)) => self.account = Some(v.clone()),
                (AttrKey::Label, AttrValue::Text(v)) => self.label = Some(v.clone()),
                (AttrKey::Service, AttrValue::Text(v)) => self.service = Some(v.clone()),
                (AttrKey::Comment, AttrValue::Text(v)) => self.comment = Some(v.clone()),
                (AttrKey::Accessible, AttrValue::Text(v)) => self.accessible = v.clone(),
                (AttrKey::ValueData, AttrValue::Bytes(v)) => self.value = v.clone(),
                (AttrKey::Synchronizable, AttrValue::Bool(v)) => self.synchronizable = *v,
                _ => {}
            }
        }
        if !changes.is_empty() {
            self.modified = now;
        }
    }
}

/// Ordered collection of items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemStore {
    items: Vec<StoredItem>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[StoredItem] {
        &self.items
    }

    pub fn insert(&mut self, attrs: &AttributeMap, now: DateTime<Utc>) -> VaultStatus {
        let (Some(class), Some(value)) = (
            text(attrs, AttrKey::Class),
            attrs.get(&AttrKey::ValueData).and_then(AttrValue::as_bytes),
        ) else {
            return VaultStatus::Other(ERR_PARAM);
        };

        let owned = |key: AttrKey| text(attrs, key).map(str::to_string);
        let item = StoredItem {
            class: class.to_string(),
            account: owned(AttrKey::Account),
            label: owned(AttrKey::Label),
            service: owned(AttrKey::Service),
            comment: owned(AttrKey::Comment),
            value: value.to_vec(),
            accessible: owned(AttrKey::Accessible).unwrap_or_default(),
            synchronizable: attrs
                .get(&AttrKey::Synchronizable)
                .and_then(AttrValue::as_bool)
                .unwrap_or(false),
            created: now,
            modified: now,
        };

        if self.items.iter().any(|i| i.unique_key() == item.unique_key()) {
            return VaultStatus::DuplicateItem;
        }

        self.items.push(item);
        VaultStatus::Success
    }

    pub fn find(&self, query: &AttributeMap) -> FindResponse {
        if text(query, AttrKey::Class).is_none() {
            return FindResponse::status(VaultStatus::Other(ERR_PARAM));
        }

        let limit = query
            .get(&AttrKey::MatchLimit)
            .and_then(AttrValue::as_limit)
            .unwrap_or(DEFAULT_MATCH_LIMIT) as usize;
        let flag = |key: AttrKey| query.get(&key).and_then(AttrValue::as_bool).unwrap_or(false);
        let with_data = flag(AttrKey::ReturnData);
        let with_attributes = flag(AttrKey::ReturnAttributes);

        let bags: Vec<AttributeMap> = self
            .items
            .iter()
            .filter(|item| item.matches(query))
            .take(limit)
            .map(|item| item.to_bag(with_data, with_attributes))
            .collect();

        if bags.is_empty() {
            return FindResponse::status(VaultStatus::ItemNotFound);
        }
        FindResponse::found(bags)
    }

    pub fn update(
        &mut self,
        search: &AttributeMap,
        changes: &AttributeMap,
        now: DateTime<Utc>,
    ) -> VaultStatus {
        if text(search, AttrKey::Class).is_none() {
            return VaultStatus::Other(ERR_PARAM);
        }

        let mut updated = self.items.clone();
        let mut matched = 0;
        for item in updated.iter_mut().filter(|item| item.matches(search)) {
            item.apply(changes, now);
            matched += 1;
        }

        if matched == 0 {
            return VaultStatus::ItemNotFound;
        }

        // Reject the whole change when it would leave two items sharing a key
        for (i, a) in updated.iter().enumerate() {
            if updated[i + 1..].iter().any(|b| a.unique_key() == b.unique_key()) {
                return VaultStatus::DuplicateItem;
            }
        }

        self.items = updated;
        VaultStatus::Success
    }

    pub fn delete(&mut self, query: &AttributeMap) -> VaultStatus {
        if text(query, AttrKey::Class).is_none() {
            return VaultStatus::Other(ERR_PARAM);
        }

        let before = self.items.len();
        self.items.retain(|item| !item.matches(query));
        if self.items.len() == before {
            VaultStatus::ItemNotFound
        } else {
            VaultStatus::Success
        }
    }
}
