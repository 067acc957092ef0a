//! Identifier and policy model
//!
//! Value types shared by every layer: the secret's kind, its accessibility
//! policy, the composite identifier used to locate it, and the immutable
//! [`Secret`] read model produced by materialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The secret's kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecretKind {
    /// Generic password items
    #[default]
    GenericPassword,
    /// Internet password items
    InternetPassword,
    Certificate,
    /// Cryptographic key items
    CryptographicKey,
    Identity,
}

impl SecretKind {
    pub const ALL: [SecretKind; 5] = [
        SecretKind::GenericPassword,
        SecretKind::InternetPassword,
        SecretKind::Certificate,
        SecretKind::CryptographicKey,
        SecretKind::Identity,
    ];

    /// Native class token understood by the vault
    pub fn token(&self) -> &'static str {
        match self {
            SecretKind::GenericPassword => "genp",
            SecretKind::InternetPassword => "inet",
            SecretKind::Certificate => "cert",
            SecretKind::CryptographicKey => "keys",
            SecretKind::Identity => "idnt",
        }
    }

    /// Parse a native class token
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.token() == token)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecretKind::GenericPassword => "generic-password",
            SecretKind::InternetPassword => "internet-password",
            SecretKind::Certificate => "certificate",
            SecretKind::CryptographicKey => "key",
            SecretKind::Identity => "identity",
        }
    }
}

impl FromStr for SecretKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "generic-password" | "generic" | "password" => Ok(SecretKind::GenericPassword),
            "internet-password" | "internet" => Ok(SecretKind::InternetPassword),
            "certificate" | "cert" => Ok(SecretKind::Certificate),
            "key" | "cryptographic-key" => Ok(SecretKind::CryptographicKey),
            "identity" => Ok(SecretKind::Identity),
            other => Err(format!("unknown secret kind '{}'", other)),
        }
    }
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// When a stored secret may be read, and whether it migrates with backups
///
/// The five levels cross two axes: unlocked vs. after first unlock, and
/// migratable vs. device-local (optionally requiring a passcode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessibilityPolicy {
    /// Readable while the device is unlocked; included in encrypted backups
    #[default]
    WhenUnlocked,
    /// Readable once the device has been unlocked after a restart; included in encrypted backups
    AfterFirstUnlock,
    /// Readable while unlocked and only when a passcode is set; never leaves the device.
    /// Removing the passcode deletes these items.
    WhenPasscodeSetThisDeviceOnly,
    /// Readable while unlocked; never leaves the device
    WhenUnlockedThisDeviceOnly,
    /// Readable after first unlock; never leaves the device
    AfterFirstUnlockThisDeviceOnly,
}

impl AccessibilityPolicy {
    pub const ALL: [AccessibilityPolicy; 5] = [
        AccessibilityPolicy::WhenUnlocked,
        AccessibilityPolicy::AfterFirstUnlock,
        AccessibilityPolicy::WhenPasscodeSetThisDeviceOnly,
        AccessibilityPolicy::WhenUnlockedThisDeviceOnly,
        AccessibilityPolicy::AfterFirstUnlockThisDeviceOnly,
    ];

    /// Native protection token understood by the vault
    pub fn token(&self) -> &'static str {
        match self {
            AccessibilityPolicy::WhenUnlocked => "ak",
            AccessibilityPolicy::AfterFirstUnlock => "ck",
            AccessibilityPolicy::WhenPasscodeSetThisDeviceOnly => "akpu",
            AccessibilityPolicy::WhenUnlockedThisDeviceOnly => "aku",
            AccessibilityPolicy::AfterFirstUnlockThisDeviceOnly => "cku",
        }
    }

    /// Parse a native protection token
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|policy| policy.token() == token)
    }

    /// Whether items under this policy stay on the device (excluded from backups)
    pub fn is_device_local(&self) -> bool {
        !matches!(
            self,
            AccessibilityPolicy::WhenUnlocked | AccessibilityPolicy::AfterFirstUnlock
        )
    }

    /// Whether the device must currently be unlocked to read the item
    pub fn requires_unlock(&self) -> bool {
        matches!(
            self,
            AccessibilityPolicy::WhenUnlocked
                | AccessibilityPolicy::WhenPasscodeSetThisDeviceOnly
                | AccessibilityPolicy::WhenUnlockedThisDeviceOnly
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessibilityPolicy::WhenUnlocked => "when-unlocked",
            AccessibilityPolicy::AfterFirstUnlock => "after-first-unlock",
            AccessibilityPolicy::WhenPasscodeSetThisDeviceOnly => {
                "when-passcode-set-this-device-only"
            }
            AccessibilityPolicy::WhenUnlockedThisDeviceOnly => "when-unlocked-this-device-only",
            AccessibilityPolicy::AfterFirstUnlockThisDeviceOnly => {
                "after-first-unlock-this-device-only"
            }
        }
    }
}

impl FromStr for AccessibilityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|policy| policy.as_str() == lower)
            .ok_or_else(|| format!("unknown accessibility policy '{}'", s))
    }
}

impl fmt::Display for AccessibilityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifying attribute a deployment treats as the primary key
///
/// It is mandatory when adding a secret and must be present on every
/// record read back from the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryAttribute {
    #[default]
    Account,
    Label,
    Service,
}

impl PrimaryAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimaryAttribute::Account => "account",
            PrimaryAttribute::Label => "label",
            PrimaryAttribute::Service => "service",
        }
    }
}

impl FromStr for PrimaryAttribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "account" => Ok(PrimaryAttribute::Account),
            "label" => Ok(PrimaryAttribute::Label),
            "service" => Ok(PrimaryAttribute::Service),
            other => Err(format!("unknown primary attribute '{}'", other)),
        }
    }
}

impl fmt::Display for PrimaryAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Composite key locating a secret in the vault
///
/// Any subset of account/label/service may be given. Empty strings are
/// treated exactly like absent attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identifier {
    pub account: Option<String>,
    pub label: Option<String>,
    pub service: Option<String>,
    pub kind: SecretKind,
}

impl Identifier {
    /// Identifier matching on account only
    pub fn account(account: impl Into<String>) -> Self {
        Self::default().with_account(account)
    }

    /// Identifier matching on label only
    pub fn label(label: impl Into<String>) -> Self {
        Self::default().with_label(label)
    }

    /// Identifier matching on service only
    pub fn service(service: impl Into<String>) -> Self {
        Self::default().with_service(service)
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_kind(mut self, kind: SecretKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn account_str(&self) -> Option<&str> {
        non_empty(&self.account)
    }

    pub fn label_str(&self) -> Option<&str> {
        non_empty(&self.label)
    }

    pub fn service_str(&self) -> Option<&str> {
        non_empty(&self.service)
    }

    /// Non-empty value of the given attribute
    pub fn attribute(&self, attr: PrimaryAttribute) -> Option<&str> {
        match attr {
            PrimaryAttribute::Account => self.account_str(),
            PrimaryAttribute::Label => self.label_str(),
            PrimaryAttribute::Service => self.service_str(),
        }
    }

    /// True when at least one identifying attribute is non-empty
    pub fn is_specified(&self) -> bool {
        self.account_str().is_some() || self.label_str().is_some() || self.service_str().is_some()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Sparse set of fields to change on an existing secret
///
/// Only fields that are `Some` end up in the vault changeset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecretChanges {
    pub account: Option<String>,
    pub label: Option<String>,
    pub service: Option<String>,
    pub value: Option<String>,
    pub comment: Option<String>,
}

impl SecretChanges {
    /// Changeset replacing the secret value only
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.account.is_none()
            && self.label.is_none()
            && self.service.is_none()
            && self.value.is_none()
            && self.comment.is_none()
    }

    /// True when this changeset would set `attr` to an empty string
    pub fn blanks(&self, attr: PrimaryAttribute) -> bool {
        let field = match attr {
            PrimaryAttribute::Account => &self.account,
            PrimaryAttribute::Label => &self.label,
            PrimaryAttribute::Service => &self.service,
        };
        field.as_deref() == Some("")
    }
}

/// A secret as read back from the vault
///
/// Only produced by materialization. It is a snapshot: changing the secret
/// in the vault needs a fresh read to be observed.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Secret {
    pub account: Option<String>,
    pub label: Option<String>,
    pub service: Option<String>,
    #[serde(skip_serializing)]
    pub value: String,
    pub kind: SecretKind,
    pub comment: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("account", &self.account)
            .field("label", &self.label)
            .field("service", &self.service)
            .field("value", &"<redacted>")
            .field("kind", &self.kind)
            .field("comment", &self.comment)
            .field("created", &self.created)
            .field("modified", &self.modified)
            .finish()
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "Secret - account: {} label: {} service: {} kind: {} comment: {} created: {} modified: {}",
            show(&self.account),
            show(&self.label),
            show(&self.service),
            self.kind,
            show(&self.comment),
            self.created.to_rfc3339(),
            self.modified.to_rfc3339(),
        )
    }
}

/// Which branch an upsert took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemProcessed {
    Added,
    Updated,
    #[default]
    Nothing,
}

impl fmt::Display for ItemProcessed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemProcessed::Added => "added",
            ItemProcessed::Updated => "updated",
            ItemProcessed::Nothing => "nothing",
        };
        write!(f, "{}", s)
    }
}
