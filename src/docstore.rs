use crate::config::DocStoreConfig;
use crate::http::build_client;
use crate::records::AssetRecord;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DocStoreError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    Deserialize(String),
    #[error("record could not be serialized: {0}")]
    Encode(String),
    #[error("no document for key `{0}` after upsert")]
    MissingDocument(String),
}

/// The two data-API round trips the refresh routines need. Implemented by the
/// HTTP client below and by an in-memory double in tests.
#[allow(async_fn_in_trait)]
pub trait DocumentUpsert {
    /// Upsert by natural key, returning the post-update document when the
    /// API supplies one.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Value,
        set: Value,
    ) -> Result<Option<Value>, DocStoreError>;

    async fn find_one(
        &self,
        collection: &str,
        filter: Value,
    ) -> Result<Option<Value>, DocStoreError>;
}

/// Client for the document-database HTTP data API.
#[derive(Debug, Clone)]
pub struct DocStoreClient {
    http: Client,
    config: DocStoreConfig,
}

impl DocStoreClient {
    pub fn new(config: DocStoreConfig) -> Self {
        Self {
            http: build_client(),
            config,
        }
    }

    async fn action(&self, action: &str, body: Value) -> Result<Value, DocStoreError> {
        let url = format!("{}/action/{action}", self.config.url);
        let response = self
            .http
            .post(url)
            .header("apiKey", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| DocStoreError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(DocStoreError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|err| DocStoreError::Deserialize(err.to_string()))
    }
}

impl DocumentUpsert for DocStoreClient {
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Value,
        set: Value,
    ) -> Result<Option<Value>, DocStoreError> {
        let payload = self
            .action(
                "findOneAndUpdate",
                json!({
                    "collection": collection,
                    "filter": filter,
                    "update": { "$set": set },
                    "upsert": true,
                    "returnNewDocument": true,
                }),
            )
            .await?;
        Ok(document_of(payload))
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Value,
    ) -> Result<Option<Value>, DocStoreError> {
        let payload = self
            .action(
                "findOne",
                json!({
                    "collection": collection,
                    "filter": filter,
                }),
            )
            .await?;
        Ok(document_of(payload))
    }
}

fn document_of(payload: Value) -> Option<Value> {
    match payload.get("document") {
        Some(Value::Null) | None => None,
        Some(document) => Some(document.clone()),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub upserted: usize,
    pub ids_assigned: usize,
}

/// One atomic upsert round trip per record, in input order, keyed on the
/// record's natural key. The store-assigned internal identifier is copied
/// back onto the in-memory record so the source file reflects it on the next
/// save. A failed round trip aborts the remainder of the batch; records
/// already committed stay committed.
pub async fn refresh_collection<R, S>(
    store: &S,
    collection: &str,
    records: &mut [R],
) -> Result<RefreshSummary, DocStoreError>
where
    R: AssetRecord + Serialize,
    S: DocumentUpsert,
{
    info!(
        target = "sync.docstore",
        collection,
        count = records.len(),
        "refresh_started"
    );
    let mut summary = RefreshSummary::default();
    for record in records.iter_mut() {
        let filter = json!({ (R::KEY_FIELD): record.natural_key() });
        let document = match store
            .find_one_and_update(collection, filter.clone(), upsert_body(record)?)
            .await?
        {
            Some(document) => document,
            // Some API tiers omit the document from the upsert response.
            None => store
                .find_one(collection, filter)
                .await?
                .ok_or_else(|| {
                    DocStoreError::MissingDocument(record.natural_key().to_string())
                })?,
        };
        summary.upserted += 1;

        let assigned = internal_id_of(&document).ok_or_else(|| {
            DocStoreError::Deserialize(format!(
                "document for key `{}` carries no usable _id",
                record.natural_key()
            ))
        })?;
        if record.internal_id() != Some(assigned.as_str()) {
            record.set_internal_id(assigned);
            summary.ids_assigned += 1;
        }
    }
    Ok(summary)
}

/// Single-record Collection variant, for record types keyed on something
/// other than an upstream asset id.
pub async fn refresh_single<R, S>(
    store: &S,
    collection: &str,
    record: &mut R,
) -> Result<RefreshSummary, DocStoreError>
where
    R: AssetRecord + Serialize,
    S: DocumentUpsert,
{
    refresh_collection(store, collection, std::slice::from_mut(record)).await
}

/// The store owns the internal identifier, so it never travels in `$set`.
fn upsert_body<R: Serialize>(record: &R) -> Result<Value, DocStoreError> {
    let mut body =
        serde_json::to_value(record).map_err(|err| DocStoreError::Encode(err.to_string()))?;
    if let Some(map) = body.as_object_mut() {
        map.remove("_id");
    }
    Ok(body)
}

/// Accepts both a plain string `_id` and the EJSON `{"$oid": …}` form.
fn internal_id_of(document: &Value) -> Option<String> {
    match document.get("_id")? {
        Value::String(id) => Some(id.clone()),
        Value::Object(wrapped) => wrapped
            .get("$oid")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CompanionRecord, ExternalId, LocalizedText};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct ScriptedStore {
        calls: RefCell<Vec<(String, Value, Value)>>,
        upsert_responses: RefCell<VecDeque<Result<Option<Value>, DocStoreError>>>,
        find_one_responses: RefCell<VecDeque<Option<Value>>>,
    }

    impl ScriptedStore {
        fn new(upserts: Vec<Result<Option<Value>, DocStoreError>>) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                upsert_responses: RefCell::new(upserts.into()),
                find_one_responses: RefCell::new(VecDeque::new()),
            }
        }

        fn with_find_one(self, responses: Vec<Option<Value>>) -> Self {
            *self.find_one_responses.borrow_mut() = responses.into();
            self
        }
    }

    impl DocumentUpsert for ScriptedStore {
        async fn find_one_and_update(
            &self,
            collection: &str,
            filter: Value,
            set: Value,
        ) -> Result<Option<Value>, DocStoreError> {
            self.calls
                .borrow_mut()
                .push((collection.to_string(), filter, set));
            self.upsert_responses
                .borrow_mut()
                .pop_front()
                .expect("unexpected upsert call")
        }

        async fn find_one(
            &self,
            _collection: &str,
            _filter: Value,
        ) -> Result<Option<Value>, DocStoreError> {
            Ok(self
                .find_one_responses
                .borrow_mut()
                .pop_front()
                .expect("unexpected findOne call"))
        }
    }

    fn companion(id: &str, internal: Option<&str>) -> CompanionRecord {
        CompanionRecord {
            internal_id: internal.map(str::to_string),
            enka_id: ExternalId::new(id),
            name: LocalizedText {
                en: "Amillion".into(),
                ru: None,
            },
            rarity: 3,
            icon_src: "https://assets.example/IconBangboo08.png".into(),
        }
    }

    #[tokio::test]
    async fn upsert_copies_assigned_id_back() {
        let store = ScriptedStore::new(vec![Ok(Some(json!({
            "_id": "665f1a2b3c4d5e6f70112233",
            "enkaId": "53004",
        })))]);
        let mut records = [companion("53004", None)];

        let summary = refresh_collection(&store, "companions", &mut records)
            .await
            .expect("refresh");
        assert_eq!(summary.upserted, 1);
        assert_eq!(summary.ids_assigned, 1);
        assert_eq!(
            records[0].internal_id.as_deref(),
            Some("665f1a2b3c4d5e6f70112233")
        );

        let calls = store.calls.borrow();
        assert_eq!(calls[0].0, "companions");
        assert_eq!(calls[0].1, json!({ "enkaId": "53004" }));
        assert!(calls[0].2.get("_id").is_none());
    }

    #[tokio::test]
    async fn ejson_object_ids_are_unwrapped() {
        let store = ScriptedStore::new(vec![Ok(Some(json!({
            "_id": { "$oid": "0102030405060708090a0b0c" },
        })))]);
        let mut records = [companion("53004", None)];

        refresh_collection(&store, "companions", &mut records)
            .await
            .expect("refresh");
        assert_eq!(
            records[0].internal_id.as_deref(),
            Some("0102030405060708090a0b0c")
        );
    }

    #[tokio::test]
    async fn missing_upsert_document_falls_back_to_find_one() {
        let store = ScriptedStore::new(vec![Ok(None)])
            .with_find_one(vec![Some(json!({ "_id": "from-find-one" }))]);
        let mut records = [companion("53004", None)];

        let summary = refresh_collection(&store, "companions", &mut records)
            .await
            .expect("refresh");
        assert_eq!(summary.upserted, 1);
        assert_eq!(records[0].internal_id.as_deref(), Some("from-find-one"));
    }

    #[tokio::test]
    async fn matching_id_is_not_rewritten() {
        let store = ScriptedStore::new(vec![Ok(Some(json!({ "_id": "stable" })))]);
        let mut records = [companion("53004", Some("stable"))];

        let summary = refresh_collection(&store, "companions", &mut records)
            .await
            .expect("refresh");
        assert_eq!(summary.ids_assigned, 0);
    }

    #[tokio::test]
    async fn round_trip_failure_aborts_the_remainder() {
        let store = ScriptedStore::new(vec![
            Ok(Some(json!({ "_id": "first" }))),
            Err(DocStoreError::Request("HTTP 503".into())),
        ]);
        let mut records = [companion("1", None), companion("2", None), companion("3", None)];

        let err = refresh_collection(&store, "companions", &mut records)
            .await
            .expect_err("should abort");
        assert!(matches!(err, DocStoreError::Request(_)));
        // The first record stays committed, the third is never attempted.
        assert_eq!(records[0].internal_id.as_deref(), Some("first"));
        assert_eq!(records[2].internal_id, None);
        assert_eq!(store.calls.borrow().len(), 2);
    }

    #[tokio::test]
    async fn single_record_variant_filters_on_its_own_key() {
        use crate::records::EncounterRecord;

        let store = ScriptedStore::new(vec![Ok(Some(json!({ "_id": "node-doc" })))]);
        let mut record =
            EncounterRecord::new(62022, "2026-07-01 04:00:00", "2026-07-15 03:59:59", vec![])
                .expect("record");

        refresh_single(&store, "encounters", &mut record)
            .await
            .expect("refresh");
        assert_eq!(record.internal_id.as_deref(), Some("node-doc"));
        assert_eq!(store.calls.borrow()[0].1, json!({ "node": 62022 }));
    }
}
