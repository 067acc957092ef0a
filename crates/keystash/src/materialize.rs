//! Record materialization - raw attribute bags to [`Secret`]s

use crate::error::{KeystashError, Result};
use crate::query::{text, AttrKey, AttrValue, AttributeMap};
use crate::types::{PrimaryAttribute, Secret, SecretKind};

/// Build a [`Secret`] from one attribute bag returned by the vault.
///
/// The deployment's primary attribute, UTF-8 value data and both timestamps
/// are required. A class token, when present, must be a known kind;
/// otherwise `kind` (the kind that was queried) is used.
pub fn materialize(
    bag: &AttributeMap,
    kind: SecretKind,
    primary: PrimaryAttribute,
) -> Result<Secret> {
    let primary_key = match primary {
        PrimaryAttribute::Account => AttrKey::Account,
        PrimaryAttribute::Label => AttrKey::Label,
        PrimaryAttribute::Service => AttrKey::Service,
    };
    // A blank primary counts as missing
    if text(bag, primary_key).filter(|s| !s.is_empty()).is_none() {
        return Err(KeystashError::EntryIsMissingElements);
    }

    let value = bag
        .get(&AttrKey::ValueData)
        .and_then(AttrValue::as_bytes)
        .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
        .ok_or(KeystashError::EntryIsMissingElements)?;

    let created = bag
        .get(&AttrKey::CreationDate)
        .and_then(AttrValue::as_date)
        .ok_or(KeystashError::EntryIsMissingElements)?;
    let modified = bag
        .get(&AttrKey::ModificationDate)
        .and_then(AttrValue::as_date)
        .ok_or(KeystashError::EntryIsMissingElements)?;

    let kind = match text(bag, AttrKey::Class) {
        Some(token) => SecretKind::from_token(token).ok_or(KeystashError::EntryIsMissingElements)?,
        None => kind,
    };

    let owned = |key: AttrKey| text(bag, key).map(str::to_string);
    Ok(Secret {
        account: owned(AttrKey::Account),
        label: owned(AttrKey::Label),
        service: owned(AttrKey::Service),
        value,
        kind,
        comment: owned(AttrKey::Comment),
        created,
        modified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bag() -> AttributeMap {
        let now = Utc::now();
        let mut bag = AttributeMap::new();
        bag.insert(AttrKey::Class, AttrValue::Text("genp".to_string()));
        bag.insert(AttrKey::Account, AttrValue::Text("a@x.com".to_string()));
        bag.insert(AttrKey::ValueData, AttrValue::Bytes(b"p1".to_vec()));
        bag.insert(AttrKey::CreationDate, AttrValue::Date(now));
        bag.insert(AttrKey::ModificationDate, AttrValue::Date(now));
        bag
    }

    #[test]
    fn test_materialize_defaults_optional_fields() {
        let secret =
            materialize(&bag(), SecretKind::GenericPassword, PrimaryAttribute::Account).unwrap();
        assert_eq!(secret.account.as_deref(), Some("a@x.com"));
        assert_eq!(secret.value, "p1");
        assert_eq!(secret.label, None);
        assert_eq!(secret.service, None);
        assert_eq!(secret.comment, None);
        assert_eq!(secret.created, secret.modified);
    }

    #[test]
    fn test_missing_required_fields() {
        let required = [
            AttrKey::Account,
            AttrKey::ValueData,
            AttrKey::CreationDate,
            AttrKey::ModificationDate,
        ];
        for key in required {
            let mut incomplete = bag();
            incomplete.remove(&key);
            assert_eq!(
                materialize(&incomplete, SecretKind::GenericPassword, PrimaryAttribute::Account),
                Err(KeystashError::EntryIsMissingElements),
                "missing {:?}",
                key
            );
        }
    }

    #[test]
    fn test_blank_primary_is_missing() {
        let mut blank = bag();
        blank.insert(AttrKey::Account, AttrValue::Text(String::new()));
        assert_eq!(
            materialize(&blank, SecretKind::GenericPassword, PrimaryAttribute::Account),
            Err(KeystashError::EntryIsMissingElements)
        );

        // Blank non-primary attributes are read back as stored
        let mut blank_label = bag();
        blank_label.insert(AttrKey::Label, AttrValue::Text(String::new()));
        let generic = SecretKind::GenericPassword;
        let secret = materialize(&blank_label, generic, PrimaryAttribute::Account).unwrap();
        assert_eq!(secret.label.as_deref(), Some(""));
    }

    #[test]
    fn test_primary_attribute_decides_requirement() {
        // Label-primary deployments need a label, not an account
        let mut label_only = bag();
        label_only.remove(&AttrKey::Account);
        let generic = SecretKind::GenericPassword;
        assert!(materialize(&label_only, generic, PrimaryAttribute::Label).is_err());

        label_only.insert(AttrKey::Label, AttrValue::Text("L".to_string()));
        let secret = materialize(&label_only, generic, PrimaryAttribute::Label).unwrap();
        assert_eq!(secret.account, None);
        assert_eq!(secret.label.as_deref(), Some("L"));
    }

    #[test]
    fn test_invalid_utf8_and_unknown_class() {
        let mut bad_value = bag();
        bad_value.insert(AttrKey::ValueData, AttrValue::Bytes(vec![0xff, 0xfe]));
        assert_eq!(
            materialize(&bad_value, SecretKind::GenericPassword, PrimaryAttribute::Account),
            Err(KeystashError::EntryIsMissingElements)
        );

        let mut bad_class = bag();
        bad_class.insert(AttrKey::Class, AttrValue::Text("zzzz".to_string()));
        assert_eq!(
            materialize(&bad_class, SecretKind::GenericPassword, PrimaryAttribute::Account),
            Err(KeystashError::EntryIsMissingElements)
        );

        let mut no_class = bag();
        no_class.remove(&AttrKey::Class);
        let secret =
            materialize(&no_class, SecretKind::Certificate, PrimaryAttribute::Account).unwrap();
        assert_eq!(secret.kind, SecretKind::Certificate);
    }
}
