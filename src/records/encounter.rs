use crate::records::{AssetRecord, ExternalId, merge_field};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("invalid period bound `{0}`")]
    InvalidDate(String),
}

/// The single-record Collection variant: one document per encounter node,
/// keyed on the node identifier rather than an upstream asset id.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterRecord {
    #[serde(rename = "_id")]
    pub internal_id: Option<String>,
    pub node: u32,
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub enemies: Vec<EncounterEnemy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterEnemy {
    pub enka_id: ExternalId,
    pub name: String,
    pub icon_src: String,
}

impl EncounterRecord {
    pub fn new(
        node: u32,
        begin: &str,
        end: &str,
        enemies: Vec<EncounterEnemy>,
    ) -> Result<Self, TransformError> {
        Ok(Self {
            internal_id: None,
            node,
            begin: parse_period_bound(begin)?,
            end: parse_period_bound(end)?,
            enemies,
        })
    }
}

/// Transport bounds arrive either as `2026-07-01 04:00:00` (upstream local
/// convention, treated as UTC) or as RFC 3339.
fn parse_period_bound(raw: &str) -> Result<DateTime<Utc>, TransformError> {
    let trimmed = raw.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| TransformError::InvalidDate(trimmed.to_string()))
}

impl AssetRecord for EncounterRecord {
    const KEY_FIELD: &'static str = "node";

    type Key = u32;

    fn natural_key(&self) -> &u32 {
        &self.node
    }

    fn internal_id(&self) -> Option<&str> {
        self.internal_id.as_deref()
    }

    fn set_internal_id(&mut self, id: String) {
        self.internal_id = Some(id);
    }

    fn merge_from(&mut self, incoming: &Self) -> u32 {
        merge_field(&mut self.begin, &incoming.begin)
            + merge_field(&mut self.end, &incoming.end)
            + merge_field(&mut self.enemies, &incoming.enemies)
    }
}
