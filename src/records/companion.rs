use crate::records::{
    AssetRecord, ExternalId, LocalizedText, merge_field, merge_localized,
};
use crate::upstream::CompanionEntry;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanionRecord {
    #[serde(rename = "_id")]
    pub internal_id: Option<String>,
    pub enka_id: ExternalId,
    pub name: LocalizedText,
    pub rarity: u8,
    pub icon_src: String,
}

impl CompanionRecord {
    pub fn from_upstream(enka_id: ExternalId, entry: &CompanionEntry, icon_src: String) -> Self {
        Self {
            internal_id: None,
            enka_id,
            name: LocalizedText {
                en: entry.en.clone(),
                ru: entry.ru.clone(),
            },
            rarity: entry.rank,
            icon_src,
        }
    }
}

impl AssetRecord for CompanionRecord {
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
            + merge_field(&mut self.icon_src, &incoming.icon_src)
    }
}
