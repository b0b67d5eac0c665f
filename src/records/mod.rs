mod character;
mod companion;
mod encounter;
mod weapon;

pub use character::CharacterRecord;
pub use companion::CompanionRecord;
pub use encounter::{EncounterEnemy, EncounterRecord, TransformError};
pub use weapon::WeaponRecord;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_with::skip_serializing_none;
use std::fmt;

/// Stable identifier assigned by the upstream source. Upstream payloads carry
/// it as either a JSON string or a JSON number; it is normalized to its
/// textual form here at the boundary and compared by exact string equality
/// everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ExternalId(String);

impl ExternalId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ExternalId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = ExternalId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or integer identifier")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                Ok(ExternalId(value.to_string()))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                Ok(ExternalId(value.to_string()))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                Ok(ExternalId(value.to_string()))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub en: String,
    pub ru: Option<String>,
}

/// Shape shared by every reconcilable record: a natural key, an internal
/// identifier owned by the persistence layer, and field-wise merging.
pub trait AssetRecord {
    /// Serialized name of the natural-key field.
    const KEY_FIELD: &'static str;

    type Key: PartialEq + Clone + fmt::Debug + fmt::Display + Serialize;

    fn natural_key(&self) -> &Self::Key;

    fn internal_id(&self) -> Option<&str>;

    fn set_internal_id(&mut self, id: String);

    /// Overwrites every field whose incoming value differs from the stored
    /// one and returns the number of fields written. The natural key and the
    /// internal identifier are never touched.
    fn merge_from(&mut self, incoming: &Self) -> u32;
}

pub(crate) fn merge_field<T: PartialEq + Clone>(stored: &mut T, incoming: &T) -> u32 {
    if stored == incoming {
        0
    } else {
        *stored = incoming.clone();
        1
    }
}

/// An incoming `None` means the field was absent from the batch record and
/// leaves the stored value untouched.
pub(crate) fn merge_optional_field<T: PartialEq + Clone>(
    stored: &mut Option<T>,
    incoming: &Option<T>,
) -> u32 {
    match incoming {
        Some(value) if stored.as_ref() != Some(value) => {
            *stored = Some(value.clone());
            1
        }
        _ => 0,
    }
}

pub(crate) fn merge_localized(stored: &mut LocalizedText, incoming: &LocalizedText) -> u32 {
    merge_field(&mut stored.en, &incoming.en) + merge_optional_field(&mut stored.ru, &incoming.ru)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_id_accepts_both_wire_shapes() {
        let from_string: ExternalId = serde_json::from_str(r#""1181""#).expect("string id");
        let from_number: ExternalId = serde_json::from_str("1181").expect("numeric id");
        assert_eq!(from_string, from_number);
        assert_eq!(from_string.as_str(), "1181");
    }

    #[test]
    fn external_id_serializes_as_string() {
        let id = ExternalId::new("42");
        assert_eq!(serde_json::to_string(&id).expect("serialize"), r#""42""#);
    }

    #[test]
    fn optional_merge_keeps_stored_value_on_absent_incoming() {
        let mut stored = Some("Старое имя".to_string());
        assert_eq!(merge_optional_field(&mut stored, &None), 0);
        assert_eq!(stored.as_deref(), Some("Старое имя"));
    }

    #[test]
    fn equal_fields_are_not_written() {
        let mut stored = "Anby".to_string();
        assert_eq!(merge_field(&mut stored, &"Anby".to_string()), 0);
        assert_eq!(merge_field(&mut stored, &"Anby Demara".to_string()), 1);
        assert_eq!(stored, "Anby Demara");
    }
}
