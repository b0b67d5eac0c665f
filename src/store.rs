use crate::reconcile::{ReconcileSummary, reconcile};
use crate::records::AssetRecord;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io failure for {path}: {message}")]
    Io { path: String, message: String },
    #[error("invalid collection in {path}: {message}")]
    Decode { path: String, message: String },
}

/// File-backed Collection: a JSON array (or single document) read in full at
/// the start of a pass and replaced in full at the end. The store assigns
/// internal identifiers to records that still lack one at save time.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load<R: DeserializeOwned>(&self) -> Result<Vec<R>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| self.decode_error(err)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(self.io_error(err)),
        }
    }

    pub fn save<R: Serialize>(&self, records: &[R]) -> Result<(), StoreError> {
        let payload =
            serde_json::to_vec_pretty(records).map_err(|err| self.decode_error(err))?;
        self.write_bytes(&payload)
    }

    /// One reconciliation pass against the file: full load, merge, full
    /// overwrite.
    pub fn refresh<R>(&self, batch: Vec<R>) -> Result<ReconcileSummary, StoreError>
    where
        R: AssetRecord + Serialize + DeserializeOwned,
    {
        let mut collection = self.load::<R>()?;
        let summary = reconcile(&mut collection, batch);
        assign_missing_ids(&mut collection);
        self.save(&collection)?;
        Ok(summary)
    }

    pub fn load_single<R: DeserializeOwned>(&self) -> Result<Option<R>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|err| self.decode_error(err)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error(err)),
        }
    }

    pub fn save_single<R: Serialize>(&self, record: &R) -> Result<(), StoreError> {
        let payload = serde_json::to_vec_pretty(record).map_err(|err| self.decode_error(err))?;
        self.write_bytes(&payload)
    }

    /// The single-record variant: the file holds exactly one logical record,
    /// merged through the same routine.
    pub fn refresh_single<R>(&self, incoming: R) -> Result<ReconcileSummary, StoreError>
    where
        R: AssetRecord + Serialize + DeserializeOwned,
    {
        let mut collection: Vec<R> = self.load_single()?.into_iter().collect();
        let summary = reconcile(&mut collection, vec![incoming]);
        assign_missing_ids(&mut collection);
        // The file is addressed per natural key; a key change replaces the
        // stored record with the freshly merged one.
        if let Some(record) = collection.last() {
            self.save_single(record)?;
        }
        Ok(summary)
    }

    fn write_bytes(&self, payload: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        fs::write(&self.path, payload).map_err(|err| self.io_error(err))
    }

    fn io_error(&self, err: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            message: err.to_string(),
        }
    }

    fn decode_error(&self, err: impl std::fmt::Display) -> StoreError {
        StoreError::Decode {
            path: self.path.display().to_string(),
            message: err.to_string(),
        }
    }
}

fn assign_missing_ids<R: AssetRecord>(collection: &mut [R]) {
    for record in collection {
        if record.internal_id().is_none() {
            record.set_internal_id(Uuid::new_v4().to_string());
        }
    }
}
