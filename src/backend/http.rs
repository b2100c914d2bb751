//! PocketBase REST client.
//!
//! Consumes a running PocketBase instance through `/api/collections` and
//! `/api/collections/{collection}/records`.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use super::{Backend, Collection, NewCollection, Record, RecordQuery};
use crate::error::{BackendError, BackendResult};

/// Page size used when walking through every page of a listing.
const FULL_LIST_PAGE_SIZE: usize = 500;

/// Largest `perPage` PocketBase honours; bigger requests are clamped.
const MAX_PER_PAGE: usize = 1000;

/// Record keys PocketBase adds to every record, not part of the field map.
const SYSTEM_KEYS: &[&str] = &["id", "collectionId", "collectionName"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Backend that talks to PocketBase over HTTP.
#[derive(Debug, Clone)]
pub struct PocketBaseClient {
    http: reqwest::Client,
    base_url: String,
    admin_token: Option<String>,
}

impl PocketBaseClient {
    /// Create a client for the PocketBase instance at `base_url`.
    pub fn new(base_url: &str, admin_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_token,
        }
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `<base>/api/<segments...>`, each segment percent-encoded on its own.
    ///
    /// Empty, `.` and `..` segments never name a collection or record, so
    /// they are reported as not found rather than sent.
    fn endpoint(&self, segments: &[&str]) -> BackendResult<Url> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(BackendError::NotFound(bad.to_string()));
        }

        let invalid_base =
            || BackendError::Unavailable(format!("invalid base URL '{}'", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid_base())?;
        url.path_segments_mut()
            .map_err(|_| invalid_base())?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> BackendResult<RequestBuilder> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "PocketBase request");
        let builder = self.http.request(method, url);
        Ok(match &self.admin_token {
            Some(token) => builder.header(reqwest::header::AUTHORIZATION, token),
            None => builder,
        })
    }

    async fn send(&self, builder: RequestBuilder) -> BackendResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .map(|b| b.message)
            .unwrap_or_default();
        let message = if message.is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            message
        };

        Err(match status {
            StatusCode::NOT_FOUND => BackendError::NotFound(message),
            StatusCode::BAD_REQUEST => BackendError::Validation(message),
            _ => BackendError::Response {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> BackendResult<T> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| BackendError::Response {
                status: StatusCode::OK.as_u16(),
                message: format!("malformed response: {}", e),
            })
    }

    async fn list_collections(&self, filter: &str) -> BackendResult<Vec<Collection>> {
        let mut collections = Vec::new();
        for page in 1.. {
            let builder = self.request(Method::GET, &["collections"])?.query(&[
                ("page", page.to_string()),
                ("perPage", FULL_LIST_PAGE_SIZE.to_string()),
                ("skipTotal", "1".to_string()),
                ("filter", filter.to_string()),
            ]);
            let batch = self.send_json::<ListPage<Collection>>(builder).await?.items;
            let done = batch.len() < FULL_LIST_PAGE_SIZE;
            collections.extend(batch);
            if done {
                break;
            }
        }
        Ok(collections)
    }
}

fn record_from_json(collection_fallback: &str, body: Map<String, JsonValue>) -> Record {
    let text = |key: &str| {
        body.get(key)
            .and_then(JsonValue::as_str)
            .map(str::to_string)
    };
    let id = text("id").unwrap_or_default();
    let collection_id = text("collectionId").unwrap_or_default();
    let collection_name = text("collectionName").unwrap_or_else(|| collection_fallback.to_string());
    let fields = body
        .into_iter()
        .filter(|(k, _)| !SYSTEM_KEYS.contains(&k.as_str()))
        .collect();

    Record {
        id,
        collection_id,
        collection_name,
        fields,
    }
}

fn escape_filter_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl Backend for PocketBaseClient {
    async fn find_all_collections(&self, kind: Option<&str>) -> BackendResult<Vec<Collection>> {
        let filter = kind
            .map(|k| format!("type = '{}'", escape_filter_literal(k)))
            .unwrap_or_default();
        self.list_collections(&filter).await
    }

    async fn find_collection_by_name_or_id(&self, name_or_id: &str) -> BackendResult<Collection> {
        let builder = self.request(Method::GET, &["collections", name_or_id])?;
        self.send_json(builder).await
    }

    async fn create_collection(&self, collection: NewCollection) -> BackendResult<Collection> {
        let builder = self.request(Method::POST, &["collections"])?.json(&collection);
        self.send_json(builder).await
    }

    async fn find_records_by_filter(
        &self,
        collection: &str,
        query: &RecordQuery,
    ) -> BackendResult<Vec<Record>> {
        let per_page = if query.limit == 0 {
            FULL_LIST_PAGE_SIZE
        } else {
            query.limit.min(MAX_PER_PAGE)
        };

        // PocketBase pages from 1; an offset is honoured by dropping the
        // leading records of the first page it falls in.
        let mut page = query.offset / per_page + 1;
        let mut skip = query.offset % per_page;
        let mut records = Vec::new();

        loop {
            let mut params = vec![
                ("page", page.to_string()),
                ("perPage", per_page.to_string()),
                ("skipTotal", "1".to_string()),
            ];
            if !query.filter.is_empty() {
                params.push(("filter", query.filter.clone()));
            }
            if !query.sort.is_empty() {
                params.push(("sort", query.sort.clone()));
            }

            let builder = self
                .request(Method::GET, &["collections", collection, "records"])?
                .query(&params);
            let batch = self
                .send_json::<ListPage<Map<String, JsonValue>>>(builder)
                .await?
                .items;
            let exhausted = batch.len() < per_page;
            records.extend(
                batch
                    .into_iter()
                    .skip(skip)
                    .map(|body| record_from_json(collection, body)),
            );
            skip = 0;

            if query.limit != 0 && records.len() >= query.limit {
                records.truncate(query.limit);
                break;
            }
            if exhausted {
                break;
            }
            page += 1;
        }

        Ok(records)
    }

    async fn find_record_by_id(&self, collection: &Collection, id: &str) -> BackendResult<Record> {
        let builder = self.request(
            Method::GET,
            &["collections", collection.id.as_str(), "records", id],
        )?;
        let body = self.send_json::<Map<String, JsonValue>>(builder).await?;
        Ok(record_from_json(&collection.name, body))
    }

    async fn save(&self, record: Record) -> BackendResult<Record> {
        let collection = if record.collection_id.is_empty() {
            &record.collection_name
        } else {
            &record.collection_id
        };
        let builder = if record.is_new() {
            self.request(Method::POST, &["collections", collection.as_str(), "records"])?
        } else {
            self.request(
                Method::PATCH,
                &["collections", collection.as_str(), "records", record.id.as_str()],
            )?
        };
        let body = self
            .send_json::<Map<String, JsonValue>>(builder.json(&record.fields))
            .await?;
        Ok(record_from_json(&record.collection_name, body))
    }

    async fn delete(&self, record: &Record) -> BackendResult<()> {
        let builder = self.request(
            Method::DELETE,
            &["collections", record.collection_id.as_str(), "records", record.id.as_str()],
        )?;
        self.send(builder).await.map(|_| ())
    }
}
