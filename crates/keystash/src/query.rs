//! Query builder
//!
//! Translates identifiers and changesets into the attribute maps the vault
//! understands. Builders borrow their inputs and never modify them.
//!
//! Attributes that are not supplied are left out of find, update-search and
//! delete queries. Writing them as `""` would make the vault match only
//! items stored with an empty value. The insert path may write empty
//! placeholders instead, see [`QueryBuilder::new`].

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::types::{AccessibilityPolicy, Identifier, SecretChanges};

/// Attribute keys of the vault's native query representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttrKey {
    Class,
    Account,
    Label,
    Service,
    Comment,
    ValueData,
    Accessible,
    Synchronizable,
    CreationDate,
    ModificationDate,
    ReturnData,
    ReturnAttributes,
    MatchLimit,
}

/// Attribute values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Text(String),
    Bytes(Vec<u8>),
    Bool(bool),
    Date(DateTime<Utc>),
    Limit(u32),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AttrValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            AttrValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_limit(&self) -> Option<u32> {
        match self {
            AttrValue::Limit(n) => Some(*n),
            _ => None,
        }
    }
}

/// Attribute bag exchanged with the vault, both as query and as result
pub type AttributeMap = BTreeMap<AttrKey, AttrValue>;

/// Text attribute lookup on an attribute map
pub fn text(map: &AttributeMap, key: AttrKey) -> Option<&str> {
    map.get(&key).and_then(AttrValue::as_text)
}

/// Builds vault queries for each facade operation
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBuilder {
    empty_placeholders: bool,
}

impl QueryBuilder {
    /// Create a builder.
    ///
    /// With `empty_placeholders` set, inserts write `""` for a label,
    /// service or comment that was not supplied. A later find on that
    /// attribute then only matches when asked for `""` explicitly.
    pub fn new(empty_placeholders: bool) -> Self {
        Self { empty_placeholders }
    }

    pub fn empty_placeholders(&self) -> bool {
        self.empty_placeholders
    }

    /// Query adding a new item
    pub fn insert(
        &self,
        identifier: &Identifier,
        value: &str,
        comment: Option<&str>,
        policy: AccessibilityPolicy,
        synchronizable: bool,
    ) -> AttributeMap {
        let mut query = AttributeMap::new();
        query.insert(AttrKey::Class, AttrValue::Text(identifier.kind.token().to_string()));
        query.insert(AttrKey::ValueData, AttrValue::Bytes(value.as_bytes().to_vec()));
        query.insert(AttrKey::Accessible, AttrValue::Text(policy.token().to_string()));
        query.insert(AttrKey::Synchronizable, AttrValue::Bool(synchronizable));

        let fields = [
            (AttrKey::Account, identifier.account.as_deref()),
            (AttrKey::Label, identifier.label.as_deref()),
            (AttrKey::Service, identifier.service.as_deref()),
            (AttrKey::Comment, comment),
        ];
        for (key, value) in fields {
            match value {
                Some(v) if !v.is_empty() => {
                    query.insert(key, AttrValue::Text(v.to_string()));
                }
                _ if self.empty_placeholders => {
                    query.insert(key, AttrValue::Text(String::new()));
                }
                _ => {}
            }
        }

        query
    }

    /// Query returning up to `limit` items with data and attributes
    pub fn find(&self, identifier: &Identifier, limit: u32) -> AttributeMap {
        let mut query = Self::search(identifier);
        query.insert(AttrKey::ReturnData, AttrValue::Bool(true));
        query.insert(AttrKey::ReturnAttributes, AttrValue::Bool(true));
        query.insert(AttrKey::MatchLimit, AttrValue::Limit(limit));
        query
    }

    /// Query locating the item an update applies to.
    ///
    /// Always built from the original identifier, never from the new values.
    pub fn update_search(&self, identifier: &Identifier) -> AttributeMap {
        Self::search(identifier)
    }

    /// Changeset holding only the fields being changed
    pub fn update_changeset(&self, changes: &SecretChanges) -> AttributeMap {
        let mut changeset = AttributeMap::new();
        if let Some(label) = &changes.label {
            changeset.insert(AttrKey::Label, AttrValue::Text(label.clone()));
        }
        if let Some(service) = &changes.service {
            changeset.insert(AttrKey::Service, AttrValue::Text(service.clone()));
        }
        if let Some(account) = &changes.account {
            changeset.insert(AttrKey::Account, AttrValue::Text(account.clone()));
        }
        if let Some(value) = &changes.value {
            changeset.insert(AttrKey::ValueData, AttrValue::Bytes(value.as_bytes().to_vec()));
        }
        if let Some(comment) = &changes.comment {
            changeset.insert(AttrKey::Comment, AttrValue::Text(comment.clone()));
        }
        changeset
    }

    /// Query removing matching items
    pub fn delete(&self, identifier: &Identifier) -> AttributeMap {
        Self::search(identifier)
    }

    fn search(identifier: &Identifier) -> AttributeMap {
        let mut query = AttributeMap::new();
        query.insert(AttrKey::Class, AttrValue::Text(identifier.kind.token().to_string()));
        if let Some(account) = identifier.account_str() {
            query.insert(AttrKey::Account, AttrValue::Text(account.to_string()));
        }
        if let Some(label) = identifier.label_str() {
            query.insert(AttrKey::Label, AttrValue::Text(label.to_string()));
        }
        if let Some(service) = identifier.service_str() {
            query.insert(AttrKey::Service, AttrValue::Text(service.to_string()));
        }
        query
    }
}
