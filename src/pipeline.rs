use crate::config::SyncConfig;
use crate::images::webp_to_png;
use crate::publish::ArtifactPublisher;
use crate::reconcile::ReconcileSummary;
use crate::records::{
    CharacterRecord, CompanionRecord, EncounterEnemy, EncounterRecord, ExternalId, TransformError,
    WeaponRecord,
};
use crate::store::{JsonFileStore, StoreError};
use crate::upstream::{CharacterEntry, CompanionEntry, UpstreamClient, UpstreamError, WeaponEntry};
use thiserror::Error;
use tracing::{error, info, warn};

/// One per-item step failure. Items failing any step are skipped by the
/// orchestrator, never fatal to the category.
#[derive(Debug, Error)]
#[error("step `{stage}` failed: {message}")]
pub struct StepError {
    stage: &'static str,
    message: String,
}

impl StepError {
    fn new(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }
}

/// Failures that abandon a whole category.
#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("upstream fetch failed: {0}")]
    Fetch(#[from] UpstreamError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transform(#[from] TransformError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Characters,
    Weapons,
    Companions,
    Encounters,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Characters,
        Category::Weapons,
        Category::Companions,
        Category::Encounters,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Characters => "characters",
            Category::Weapons => "weapons",
            Category::Companions => "companions",
            Category::Encounters => "encounters",
        }
    }
}

#[derive(Debug)]
pub struct CategoryReport {
    pub category: &'static str,
    pub fetched: usize,
    pub published: usize,
    pub skipped: usize,
    pub reconcile: ReconcileSummary,
}

/// Sequences fetch → normalize → publish → reconcile per category, one item
/// at a time.
pub struct SyncPipeline {
    config: SyncConfig,
    upstream: UpstreamClient,
    publisher: ArtifactPublisher,
}

impl SyncPipeline {
    pub fn new(config: SyncConfig) -> Self {
        let publisher = ArtifactPublisher::new(config.publish.clone());
        Self {
            config,
            upstream: UpstreamClient::new(),
            publisher,
        }
    }

    /// Runs every category, isolating failures at the category boundary.
    pub async fn run(&self) -> Vec<CategoryReport> {
        let mut reports = Vec::new();
        for category in Category::ALL {
            match self.sync_category(category).await {
                Ok(report) => {
                    info!(
                        target = "sync.pipeline",
                        category = report.category,
                        fetched = report.fetched,
                        published = report.published,
                        skipped = report.skipped,
                        inserted = report.reconcile.inserted,
                        updated = report.reconcile.updated,
                        unchanged = report.reconcile.unchanged,
                        fields_written = report.reconcile.fields_written,
                        "category_completed"
                    );
                    reports.push(report);
                }
                Err(err) => {
                    error!(
                        target = "sync.pipeline",
                        category = category.name(),
                        error = %err,
                        "category_abandoned"
                    );
                }
            }
        }
        reports
    }

    async fn sync_category(&self, category: Category) -> Result<CategoryReport, CategoryError> {
        match category {
            Category::Characters => self.sync_characters().await,
            Category::Weapons => self.sync_weapons().await,
            Category::Companions => self.sync_companions().await,
            Category::Encounters => self.sync_encounter().await,
        }
    }

    pub async fn sync_characters(&self) -> Result<CategoryReport, CategoryError> {
        let index = self.upstream.character_index().await?;
        let fetched = index.len();
        let items: Vec<_> = index
            .iter()
            .filter(|(id, _)| !self.is_excluded(id))
            .collect();
        let (batch, skipped) = collect_with_skip("characters", items, async |(id, entry)| {
            self.build_character(id, entry).await
        })
        .await;
        let published = batch.len();
        let reconcile = self.file_store("characters.json").refresh(batch)?;
        Ok(CategoryReport {
            category: "characters",
            fetched,
            published,
            skipped,
            reconcile,
        })
    }

    pub async fn sync_weapons(&self) -> Result<CategoryReport, CategoryError> {
        let index = self.upstream.weapon_index().await?;
        let fetched = index.len();
        let items: Vec<_> = index.iter().collect();
        let (batch, skipped) = collect_with_skip("weapons", items, async |(id, entry)| {
            self.build_weapon(id, entry).await
        })
        .await;
        let published = batch.len();
        let reconcile = self.file_store("weapons.json").refresh(batch)?;
        Ok(CategoryReport {
            category: "weapons",
            fetched,
            published,
            skipped,
            reconcile,
        })
    }

    pub async fn sync_companions(&self) -> Result<CategoryReport, CategoryError> {
        let index = self.upstream.companion_index().await?;
        let fetched = index.len();
        let items: Vec<_> = index.iter().collect();
        let (batch, skipped) = collect_with_skip("companions", items, async |(id, entry)| {
            self.build_companion(id, entry).await
        })
        .await;
        let published = batch.len();
        let reconcile = self.file_store("companions.json").refresh(batch)?;
        Ok(CategoryReport {
            category: "companions",
            fetched,
            published,
            skipped,
            reconcile,
        })
    }

    /// The single-record category: one time-boxed node whose enemy icons are
    /// published individually. A failed icon keeps the upstream-hosted URL
    /// instead of dropping the enemy.
    pub async fn sync_encounter(&self) -> Result<CategoryReport, CategoryError> {
        let node = self.config.data.encounter_node;
        let payload = self.upstream.encounter_node(node).await?;
        let fetched = payload.enemies.len();
        let mut enemies = Vec::new();
        let mut skipped = 0;
        for (id, enemy) in &payload.enemies {
            let message = format!("Upload enemy icon for {}", enemy.en);
            let icon_src = match self.publish_image(&enemy.icon, &message).await {
                Ok(url) => url,
                Err(err) => {
                    warn!(
                        target = "sync.pipeline",
                        category = "encounters",
                        enemy = %id,
                        stage = err.stage(),
                        error = %err,
                        "enemy_icon_fallback"
                    );
                    skipped += 1;
                    self.upstream.image_url(&enemy.icon)
                }
            };
            enemies.push(EncounterEnemy {
                enka_id: id.clone(),
                name: enemy.en.clone(),
                icon_src,
            });
        }
        let published = fetched - skipped;
        let record = EncounterRecord::new(node, &payload.begin, &payload.end, enemies)?;
        let store = self.file_store(&format!("nodes/encounter_{node}.json"));
        let reconcile = store.refresh_single(record)?;
        Ok(CategoryReport {
            category: "encounters",
            fetched,
            published,
            skipped,
            reconcile,
        })
    }

    async fn build_character(
        &self,
        id: &ExternalId,
        entry: &CharacterEntry,
    ) -> Result<CharacterRecord, StepError> {
        let select_token = entry.icon.replace("IconRole", "IconRoleSelect");
        let portrait_src = self
            .publish_image(&entry.icon, &format!("Upload portrait for {}", entry.code))
            .await?;
        let avatar_src = self
            .publish_image(&select_token, &format!("Upload icon for {}", entry.code))
            .await?;
        Ok(CharacterRecord::from_upstream(
            id.clone(),
            entry,
            avatar_src,
            portrait_src,
        ))
    }

    async fn build_weapon(
        &self,
        id: &ExternalId,
        entry: &WeaponEntry,
    ) -> Result<WeaponRecord, StepError> {
        let icon_src = self
            .publish_image(&entry.icon, &format!("Upload weapon icon for {}", entry.en))
            .await?;
        Ok(WeaponRecord::from_upstream(
            id.clone(),
            entry,
            icon_src,
            hoyo_equip_icon(id),
        ))
    }

    async fn build_companion(
        &self,
        id: &ExternalId,
        entry: &CompanionEntry,
    ) -> Result<CompanionRecord, StepError> {
        let icon_src = self
            .publish_image(
                &entry.icon,
                &format!("Upload companion icon for {}", entry.en),
            )
            .await?;
        Ok(CompanionRecord::from_upstream(id.clone(), entry, icon_src))
    }

    /// fetch → normalize → publish for one image token; returns the durable
    /// reference URL.
    async fn publish_image(&self, token: &str, message: &str) -> Result<String, StepError> {
        let webp = self
            .upstream
            .image(token)
            .await
            .map_err(|err| StepError::new("fetch_image", err.to_string()))?;
        let png = webp_to_png(&webp, None)
            .map_err(|err| StepError::new("normalize_image", err.to_string()))?;
        self.publisher
            .put_file(&format!("images/{token}.png"), &png, message)
            .await
            .map_err(|err| StepError::new("publish_image", err.to_string()))
    }

    fn file_store(&self, name: &str) -> JsonFileStore {
        JsonFileStore::new(self.config.data.data_dir.join(name))
    }

    fn is_excluded(&self, id: &ExternalId) -> bool {
        self.config
            .excluded_characters
            .iter()
            .any(|excluded| excluded.as_str() == id.as_str())
    }
}

/// Runs `step` over every item in order; failures skip the item with a
/// diagnostic and the loop continues. The skip policy lives here, not in the
/// steps.
async fn collect_with_skip<T, R, F>(
    category: &'static str,
    items: Vec<T>,
    mut step: F,
) -> (Vec<R>, usize)
where
    F: AsyncFnMut(T) -> Result<R, StepError>,
{
    let mut batch = Vec::new();
    let mut skipped = 0;
    for item in items {
        match step(item).await {
            Ok(record) => batch.push(record),
            Err(err) => {
                warn!(
                    target = "sync.pipeline",
                    category,
                    stage = err.stage(),
                    error = %err,
                    "item_skipped"
                );
                skipped += 1;
            }
        }
    }
    (batch, skipped)
}

fn hoyo_equip_icon(id: &ExternalId) -> String {
    format!("https://act-webstatic.hoyoverse.com/game_record/zzzv2/equip/equip_{id}.png")
}
