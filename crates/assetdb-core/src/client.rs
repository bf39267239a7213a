//! Client for the asset service HTTP API.
//!
//! The import pipeline only needs [`AssetService`]; [`HttpAssetService`]
//! implements it over HTTP and also exposes the read/delete endpoints.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDateTime;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ServiceConfig;

pub const MAX_SEARCH_LIMIT: u32 = 1000;
pub const DEFAULT_SEARCH_LIMIT: u32 = 100;

/// Longest error body kept in a [`ClientError::Status`] detail.
const MAX_DETAIL_CHARS: usize = 300;

/// Categorical tags attached to an asset. `None` means "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetMetadata {
    pub angle_1: Option<String>,
    pub angle_2: Option<String>,
    pub action_1: Option<String>,
    pub action_2: Option<String>,
    pub action_3: Option<String>,
    pub prompt: Option<String>,
}

impl AssetMetadata {
    /// Query parameters for the set fields, in a fixed order. Unset fields are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("angle_1", &self.angle_1),
            ("angle_2", &self.angle_2),
            ("action_1", &self.action_1),
            ("action_2", &self.action_2),
            ("action_3", &self.action_3),
            ("prompt", &self.prompt),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|value| (name, value)))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: i64,
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub deleted_at: Option<NaiveDateTime>,
    #[serde(flatten)]
    pub metadata: AssetMetadata,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub s3_url: Option<String>,
    #[serde(default)]
    pub local_file_path: Option<String>,
}

impl AssetRecord {
    /// Where the payload lives: the object-storage URL if there is one, else the local path.
    pub fn storage_location(&self) -> Option<&str> {
        self.s3_url.as_deref().or(self.local_file_path.as_deref())
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// One create-asset call: the binary payload plus its metadata.
#[derive(Clone, PartialEq, Eq)]
pub struct AssetUpload {
    pub file_name: String,
    pub contents: Vec<u8>,
    pub metadata: AssetMetadata,
}

impl fmt::Debug for AssetUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetUpload")
            .field("file_name", &self.file_name)
            .field("bytes", &self.contents.len())
            .field("metadata", &self.metadata)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    /// Kept untyped so a record the client cannot fully decode still yields its id.
    #[serde(default)]
    pub asset: Option<serde_json::Value>,
    #[serde(default)]
    pub s3_url: Option<String>,
}

/// A record the service has stored. Only `id` is guaranteed; `record` is
/// `None` when the returned asset did not match [`AssetRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedAsset {
    pub id: i64,
    pub storage_location: Option<String>,
    pub record: Option<AssetRecord>,
}

impl From<AssetRecord> for CreatedAsset {
    fn from(record: AssetRecord) -> Self {
        Self {
            id: record.id,
            storage_location: record.storage_location().map(str::to_string),
            record: Some(record),
        }
    }
}

impl TryFrom<UploadResponse> for CreatedAsset {
    type Error = ClientError;

    fn try_from(body: UploadResponse) -> Result<Self, Self::Error> {
        let asset = body.asset.ok_or(ClientError::MissingAssetId)?;
        let id = asset
            .get("id")
            .and_then(serde_json::Value::as_i64)
            .ok_or(ClientError::MissingAssetId)?;

        let record = match serde_json::from_value::<AssetRecord>(asset) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(asset_id = id, error = %err, "stored asset returned an unexpected shape");
                None
            }
        };
        let storage_location = record
            .as_ref()
            .and_then(|record| record.storage_location().map(str::to_string))
            .or(body.s3_url);

        Ok(Self {
            id,
            storage_location,
            record,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub filters: AssetMetadata,
    pub include_deleted: bool,
    pub limit: u32,
    pub offset: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            filters: AssetMetadata::default(),
            include_deleted: false,
            limit: DEFAULT_SEARCH_LIMIT,
            offset: 0,
        }
    }
}

impl SearchQuery {
    fn validate(&self) -> Result<(), ClientError> {
        if self.limit == 0 || self.limit > MAX_SEARCH_LIMIT {
            return Err(ClientError::InvalidRequest(format!(
                "search limit must be between 1 and {MAX_SEARCH_LIMIT}, got {}",
                self.limit
            )));
        }
        Ok(())
    }

    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs: Vec<(&'static str, String)> = self
            .filters
            .query_pairs()
            .into_iter()
            .map(|(name, value)| (name, value.to_string()))
            .collect();
        pairs.push(("include_deleted", self.include_deleted.to_string()));
        pairs.push(("limit", self.limit.to_string()));
        pairs.push(("offset", self.offset.to_string()));
        pairs
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub total: u64,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(rename = "results", alias = "items", default)]
    pub items: Vec<AssetRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Stamp `deleted_at`; the record and payload stay.
    #[default]
    Soft,
    /// Remove the record and its payload.
    Hard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub deleted_asset: Option<AssetRecord>,
}

#[derive(Debug, Deserialize)]
struct ActionList {
    actions: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("server returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("asset {0} not found")]
    NotFound(i64),

    #[error("asset {0} has been deleted")]
    Gone(i64),

    #[error("response did not include an asset id")]
    MissingAssetId,

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else if err.is_connect() {
            Self::Connect(err)
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err)
        }
    }
}

/// The operations the import pipeline needs from an asset service.
#[async_trait]
pub trait AssetService: Send + Sync {
    async fn health(&self) -> Result<HealthStatus, ClientError>;

    /// Creates exactly one record on success. Nothing is written on failure.
    async fn create_asset(&self, upload: AssetUpload) -> Result<CreatedAsset, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpAssetService {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpAssetService {
    pub fn new(config: &ServiceConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ClientError::Transport)?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub async fn search_assets(&self, query: &SearchQuery) -> Result<SearchPage, ClientError> {
        query.validate()?;
        let response = self
            .client
            .get(self.config.endpoint("api/search"))
            .query(&query.query_pairs())
            .send()
            .await
            .map_err(ClientError::from_transport)?;
        decode(ensure_success(response).await?).await
    }

    pub async fn get_asset(&self, id: i64) -> Result<AssetRecord, ClientError> {
        let response = self
            .client
            .get(self.config.endpoint(&format!("api/assets/{id}")))
            .send()
            .await
            .map_err(ClientError::from_transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(id));
        }
        decode(ensure_success(response).await?).await
    }

    /// Fetches the payload bytes. Redirects to object storage are followed.
    pub async fn download_asset(&self, id: i64) -> Result<Bytes, ClientError> {
        let response = self
            .client
            .get(self.config.endpoint(&format!("api/download/{id}")))
            .send()
            .await
            .map_err(ClientError::from_transport)?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(ClientError::NotFound(id)),
            StatusCode::GONE => return Err(ClientError::Gone(id)),
            _ => {}
        }
        ensure_success(response)
            .await?
            .bytes()
            .await
            .map_err(ClientError::from_transport)
    }

    pub async fn delete_asset(&self, id: i64, mode: DeleteMode) -> Result<DeleteOutcome, ClientError> {
        let response = self
            .client
            .delete(self.config.endpoint(&format!("api/assets/{id}")))
            .query(&[("hard_delete", mode == DeleteMode::Hard)])
            .send()
            .await
            .map_err(ClientError::from_transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(id));
        }
        decode(ensure_success(response).await?).await
    }

    /// Distinct primary action tags known to the service, sorted.
    pub async fn list_actions(&self) -> Result<Vec<String>, ClientError> {
        let response = self
            .client
            .get(self.config.endpoint("api/metadata/actions"))
            .send()
            .await
            .map_err(ClientError::from_transport)?;
        let list: ActionList = decode(ensure_success(response).await?).await?;
        Ok(list.actions)
    }
}

#[async_trait]
impl AssetService for HttpAssetService {
    async fn health(&self) -> Result<HealthStatus, ClientError> {
        let response = self
            .client
            .get(self.config.endpoint("api/health"))
            .timeout(self.config.health_timeout)
            .send()
            .await
            .map_err(ClientError::from_transport)?;
        decode(ensure_success(response).await?).await
    }

    async fn create_asset(&self, upload: AssetUpload) -> Result<CreatedAsset, ClientError> {
        let AssetUpload {
            file_name,
            contents,
            metadata,
        } = upload;

        let mime = mime_guess::from_path(&file_name).first_or_octet_stream();
        let part = Part::bytes(contents)
            .file_name(file_name.clone())
            .mime_str(mime.essence_str())
            .map_err(|err| ClientError::InvalidRequest(err.to_string()))?;
        let form = Form::new().part("file", part);

        debug!(file = %file_name, content_type = %mime, "uploading asset");

        let response = self
            .client
            .post(self.config.endpoint("api/upload"))
            .query(&metadata.query_pairs())
            .multipart(form)
            .send()
            .await
            .map_err(ClientError::from_transport)?;

        let body: UploadResponse = decode(ensure_success(response).await?).await?;
        CreatedAsset::try_from(body)
    }
}

async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        detail: error_detail(&body),
    })
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let bytes = response.bytes().await.map_err(ClientError::from_transport)?;
    serde_json::from_slice(&bytes).map_err(|err| ClientError::Decode(err.to_string()))
}

/// Pulls `detail` out of a JSON error body, falling back to the raw text.
fn error_detail(body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        match map.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            Some(other) => return other.to_string(),
            None => {}
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    if trimmed.chars().count() > MAX_DETAIL_CHARS {
        let cut: String = trimmed.chars().take(MAX_DETAIL_CHARS).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}
