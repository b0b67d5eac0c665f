mod config;
mod docstore;
mod http;
mod images;
mod pipeline;
mod publish;
mod reconcile;
mod records;
mod store;
mod upstream;

use config::{DataConfig, DocStoreConfig, SyncConfig};
use docstore::{DocStoreClient, refresh_collection, refresh_single};
use pipeline::SyncPipeline;
use records::{AssetRecord, CharacterRecord, CompanionRecord, EncounterRecord, WeaponRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use store::JsonFileStore;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "sync.main", "run failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let mode = std::env::args().nth(1).unwrap_or_else(|| "sync".to_string());
    match mode.as_str() {
        "sync" => run_sync().await,
        "refresh-db" => run_refresh().await,
        other => Err(format!("unknown mode `{other}` (expected `sync` or `refresh-db`)").into()),
    }
}

/// Full pipeline run against the file-backed collections.
async fn run_sync() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = SyncConfig::from_env()?;
    info!(
        target = "sync.main",
        data_dir = %config.data.data_dir.display(),
        repo = %config.publish.repo,
        branch = %config.publish.branch,
        "sync_started"
    );
    let pipeline = SyncPipeline::new(config);
    let reports = pipeline.run().await;
    info!(
        target = "sync.main",
        categories = reports.len(),
        "sync_finished"
    );
    Ok(())
}

/// Reconciles the previously written collection files into the document
/// store, then writes each file back so it reflects the assigned ids.
async fn run_refresh() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let data = DataConfig::from_env()?;
    let store = DocStoreClient::new(DocStoreConfig::from_env()?);
    info!(target = "sync.main", "refresh_started");

    refresh_file::<CharacterRecord>(&store, "characters", data.data_dir.join("characters.json"))
        .await?;
    refresh_file::<WeaponRecord>(&store, "weapons", data.data_dir.join("weapons.json")).await?;
    refresh_file::<CompanionRecord>(&store, "companions", data.data_dir.join("companions.json"))
        .await?;
    refresh_encounter_file(
        &store,
        data.data_dir
            .join("nodes")
            .join(format!("encounter_{}.json", data.encounter_node)),
    )
    .await?;

    info!(target = "sync.main", "refresh_finished");
    Ok(())
}

async fn refresh_file<R>(
    store: &DocStoreClient,
    collection: &'static str,
    path: PathBuf,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    R: AssetRecord + Serialize + DeserializeOwned,
{
    let file = JsonFileStore::new(path);
    let mut records: Vec<R> = file.load()?;
    let summary = refresh_collection(store, collection, &mut records).await?;
    file.save(&records)?;
    info!(
        target = "sync.docstore",
        collection,
        upserted = summary.upserted,
        ids_assigned = summary.ids_assigned,
        "collection_refreshed"
    );
    Ok(())
}

async fn refresh_encounter_file(
    store: &DocStoreClient,
    path: PathBuf,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let file = JsonFileStore::new(path);
    let Some(mut record) = file.load_single::<EncounterRecord>()? else {
        warn!(
            target = "sync.docstore",
            path = %file.path().display(),
            "encounter_file_missing"
        );
        return Ok(());
    };
    let summary = refresh_single(store, "encounters", &mut record).await?;
    file.save_single(&record)?;
    info!(
        target = "sync.docstore",
        node = record.node,
        ids_assigned = summary.ids_assigned,
        "encounter_refreshed"
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
