use crate::records::{
    AssetRecord, ExternalId, LocalizedText, merge_field, merge_localized,
};
use crate::upstream::CharacterEntry;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterRecord {
    #[serde(rename = "_id")]
    pub internal_id: Option<String>,
    pub enka_id: ExternalId,
    pub name: LocalizedText,
    pub rarity: u8,
    pub specialty: u32,
    pub attribute: u32,
    pub avatar_src: String,
    pub portrait_src: String,
}

impl CharacterRecord {
    pub fn from_upstream(
        enka_id: ExternalId,
        entry: &CharacterEntry,
        avatar_src: String,
        portrait_src: String,
    ) -> Self {
        Self {
            internal_id: None,
            enka_id,
            name: LocalizedText {
                en: entry.en.clone(),
                ru: entry.ru.clone(),
            },
            rarity: entry.rank,
            specialty: entry.specialty,
            attribute: entry.element,
            avatar_src,
            portrait_src,
        }
    }
}

impl AssetRecord for CharacterRecord {
    const KEY_FIELD: &'static str = "enkaId";

    type Key = ExternalId;

    fn natural_key(&self) -> &ExternalId {
        &self.enka_id
    }

    fn internal_id(&self) -> Option<&str> {
        self.internal_id.as_deref()
    }

    fn set_internal_id(&mut self, id: String) {
        self.internal_id = Some(id);
    }

    fn merge_from(&mut self, incoming: &Self) -> u32 {
        merge_localized(&mut self.name, &incoming.name)
            + merge_field(&mut self.rarity, &incoming.rarity)
            + merge_field(&mut self.specialty, &incoming.specialty)
            + merge_field(&mut self.attribute, &incoming.attribute)
            + merge_field(&mut self.avatar_src, &incoming.avatar_src)
            + merge_field(&mut self.portrait_src, &incoming.portrait_src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> CharacterEntry {
        serde_json::from_str(
            r#"{
                "code": "Anby",
                "rank": 3,
                "type": 1,
                "element": 203,
                "EN": "Anby Demara",
                "icon": "IconRole02"
            }"#,
        )
        .expect("entry")
    }

    #[test]
    fn wire_shape_uses_natural_key_and_internal_id_names() {
        let mut record = CharacterRecord::from_upstream(
            ExternalId::new("1011"),
            &sample_entry(),
            "https://assets.example/avatar.png".into(),
            "https://assets.example/portrait.png".into(),
        );
        record.set_internal_id("665f1a2b3c4d5e6f70112233".into());

        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["_id"], "665f1a2b3c4d5e6f70112233");
        assert_eq!(value["enkaId"], "1011");
        assert_eq!(value["name"]["en"], "Anby Demara");
        assert!(value["name"].get("ru").is_none());
        assert_eq!(value["avatarSrc"], "https://assets.example/avatar.png");
    }

    #[test]
    fn merge_counts_only_changed_fields() {
        let base = CharacterRecord::from_upstream(
            ExternalId::new("1011"),
            &sample_entry(),
            "avatar-a".into(),
            "portrait-a".into(),
        );
        let mut stored = base.clone();
        stored.set_internal_id("abc".into());

        let mut incoming = base;
        incoming.name.en = "Anby".into();
        incoming.portrait_src = "portrait-b".into();

        assert_eq!(stored.merge_from(&incoming), 2);
        assert_eq!(stored.name.en, "Anby");
        assert_eq!(stored.portrait_src, "portrait-b");
        assert_eq!(stored.avatar_src, "avatar-a");
        assert_eq!(stored.internal_id(), Some("abc"));
        assert_eq!(stored.merge_from(&stored.clone()), 0);
    }
}
