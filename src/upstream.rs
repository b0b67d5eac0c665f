use crate::http::build_client;
use crate::records::ExternalId;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use thiserror::Error;

/// Fixed by the upstream source; only the test suite points it elsewhere.
pub const UPSTREAM_BASE: &str = "https://api.hakush.in/zzz";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    Deserialize(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CharacterEntry {
    pub code: String,
    pub rank: u8,
    #[serde(rename = "type")]
    pub specialty: u32,
    pub element: u32,
    #[serde(rename = "EN")]
    pub en: String,
    #[serde(rename = "RU", default)]
    pub ru: Option<String>,
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeaponEntry {
    pub rank: u8,
    #[serde(rename = "type")]
    pub specialty: u32,
    #[serde(rename = "EN")]
    pub en: String,
    #[serde(rename = "RU", default)]
    pub ru: Option<String>,
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanionEntry {
    pub rank: u8,
    #[serde(rename = "EN")]
    pub en: String,
    #[serde(rename = "RU", default)]
    pub ru: Option<String>,
    pub icon: String,
}

/// One time-boxed encounter node: period bounds as transport strings plus the
/// enemy roster keyed by upstream id.
#[derive(Debug, Clone, Deserialize)]
pub struct EncounterPayload {
    pub begin: String,
    pub end: String,
    pub enemies: BTreeMap<ExternalId, EnemyEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnemyEntry {
    #[serde(rename = "EN")]
    pub en: String,
    pub icon: String,
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    base: String,
}

impl UpstreamClient {
    pub fn new() -> Self {
        Self::with_base(UPSTREAM_BASE)
    }

    pub fn with_base(base: &str) -> Self {
        Self {
            http: build_client(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub async fn character_index(
        &self,
    ) -> Result<BTreeMap<ExternalId, CharacterEntry>, UpstreamError> {
        self.index("data/character.json").await
    }

    pub async fn weapon_index(&self) -> Result<BTreeMap<ExternalId, WeaponEntry>, UpstreamError> {
        self.index("data/weapon.json").await
    }

    pub async fn companion_index(
        &self,
    ) -> Result<BTreeMap<ExternalId, CompanionEntry>, UpstreamError> {
        self.index("data/bangboo.json").await
    }

    pub async fn encounter_node(&self, node: u32) -> Result<EncounterPayload, UpstreamError> {
        self.get_json(&format!("data/encounter/{node}.json")).await
    }

    /// Raw source-format image bytes for an image-reference token.
    pub async fn image(&self, token: &str) -> Result<Vec<u8>, UpstreamError> {
        let response = self
            .http
            .get(self.image_url(token))
            .send()
            .await
            .map_err(|err| UpstreamError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(UpstreamError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| UpstreamError::Request(err.to_string()))?;
        Ok(bytes.to_vec())
    }

    pub fn image_url(&self, token: &str) -> String {
        format!("{}/UI/{token}.webp", self.base)
    }

    async fn index<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<BTreeMap<ExternalId, T>, UpstreamError> {
        self.get_json(path).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, UpstreamError> {
        let url = format!("{}/{path}", self.base);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| UpstreamError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(UpstreamError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|err| UpstreamError::Deserialize(err.to_string()))
    }
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_index_decodes_mixed_key_shapes() {
        let raw = r#"{
            "1181": {
                "code": "Grace",
                "rank": 4,
                "type": 1,
                "element": 203,
                "EN": "Grace Howard",
                "icon": "IconRole13"
            }
        }"#;
        let index: BTreeMap<ExternalId, CharacterEntry> =
            serde_json::from_str(raw).expect("decode index");
        let entry = index
            .get(&ExternalId::new("1181"))
            .expect("entry for 1181");
        assert_eq!(entry.code, "Grace");
        assert_eq!(entry.ru, None);
    }

    #[test]
    fn encounter_payload_keeps_transport_strings() {
        let raw = r#"{
            "begin": "2026-07-01 04:00:00",
            "end": "2026-07-15 03:59:59",
            "enemies": {
                "90021": { "EN": "Dead End Butcher", "icon": "IconMonster21" }
            }
        }"#;
        let payload: EncounterPayload = serde_json::from_str(raw).expect("decode payload");
        assert_eq!(payload.begin, "2026-07-01 04:00:00");
        assert_eq!(payload.enemies.len(), 1);
    }

    #[test]
    fn image_url_is_token_addressed() {
        let client = UpstreamClient::with_base("https://api.example.com/zzz/");
        assert_eq!(
            client.image_url("IconRole13"),
            "https://api.example.com/zzz/UI/IconRole13.webp"
        );
    }
}
