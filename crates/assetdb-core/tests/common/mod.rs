#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetdb_core::client::{
    AssetMetadata, AssetRecord, AssetService, AssetUpload, ClientError, CreatedAsset,
    HealthStatus,
};
use async_trait::async_trait;
use axum::extract::{Multipart, Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::json;
use tempfile::TempDir;

pub const HEADER: &str = "reference_image_name,reference_image_path,angle_direction_1,angle_direction_2,action_direction_1,action_direction_2,action_direction_3,prompt";

pub fn created_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("valid timestamp")
}

/// A manifest plus an image directory in a scratch location.
pub struct Workspace {
    pub dir: TempDir,
    pub manifest: PathBuf,
    pub images: PathBuf,
}

impl Workspace {
    pub fn new(rows: &[&str], images: &[&str]) -> Self {
        let dir = tempfile::tempdir().expect("create workspace");
        let manifest = dir.path().join("manifest.csv");
        let mut contents = String::from(HEADER);
        contents.push('\n');
        for row in rows {
            contents.push_str(row);
            contents.push('\n');
        }
        std::fs::write(&manifest, contents).expect("write manifest");

        let image_dir = dir.path().join("images");
        std::fs::create_dir(&image_dir).expect("create image dir");
        for name in images {
            std::fs::write(image_dir.join(name), format!("bytes of {name}")).expect("write image");
        }

        Self {
            dir,
            manifest,
            images: image_dir,
        }
    }

    pub fn source(&self) -> assetdb_core::ManifestSource {
        assetdb_core::ManifestSource::new(&self.manifest, &self.images)
    }
}

/// In-process stand-in for the asset service. Records every create call and
/// persists records across runs like the real store.
#[derive(Default)]
pub struct MemoryAssetService {
    pub fail_files: HashSet<String>,
    pub unhealthy: bool,
    calls: Mutex<Vec<AssetUpload>>,
    records: Mutex<Vec<AssetRecord>>,
}

impl MemoryAssetService {
    pub fn failing_on(files: &[&str]) -> Self {
        Self {
            fail_files: files.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            unhealthy: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<AssetUpload> {
        self.calls.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<AssetRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetService for MemoryAssetService {
    async fn health(&self) -> Result<HealthStatus, ClientError> {
        if self.unhealthy {
            return Err(ClientError::Status {
                status: 503,
                detail: "maintenance".into(),
            });
        }
        Ok(HealthStatus {
            status: "healthy".into(),
            service: Some("memory".into()),
            version: None,
        })
    }

    async fn create_asset(&self, upload: AssetUpload) -> Result<CreatedAsset, ClientError> {
        self.calls.lock().unwrap().push(upload.clone());
        if self.fail_files.contains(&upload.file_name) {
            return Err(ClientError::Status {
                status: 500,
                detail: "Upload failed: simulated".into(),
            });
        }

        let mut records = self.records.lock().unwrap();
        let record = AssetRecord {
            id: records.len() as i64 + 1,
            created_at: created_at(),
            deleted_at: None,
            metadata: upload.metadata,
            original_filename: Some(upload.file_name.clone()),
            s3_url: None,
            local_file_path: Some(format!("uploads/images/{}", upload.file_name)),
        };
        records.push(record.clone());
        Ok(record.into())
    }
}

/// What the fake HTTP server saw for one upload request.
#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub query: HashMap<String, String>,
    pub field_names: Vec<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
pub struct ServerState {
    pub fail_files: HashSet<String>,
    pub slow_files: HashSet<String>,
    /// Answer uploads with `created_at` carrying a UTC offset.
    pub zoned_timestamps: bool,
    pub uploads: Mutex<Vec<ReceivedUpload>>,
    pub records: Mutex<Vec<(AssetRecord, Vec<u8>)>>,
}

pub struct FakeServer {
    pub addr: SocketAddr,
    pub state: Arc<ServerState>,
}

impl FakeServer {
    pub async fn start(fail_files: &[&str], slow_files: &[&str]) -> Self {
        Self::start_with(ServerState {
            fail_files: fail_files.iter().map(|f| f.to_string()).collect(),
            slow_files: slow_files.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        })
        .await
    }

    pub async fn start_with(state: ServerState) -> Self {
        let state = Arc::new(state);

        let router = Router::new()
            .route("/api/health", get(health))
            .route("/api/upload", axum::routing::post(upload))
            .route("/api/search", get(search))
            .route("/api/assets/{id}", get(get_asset).delete(delete_asset))
            .route("/api/download/{id}", get(download))
            .route("/api/metadata/actions", get(actions))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("fake server");
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn uploads(&self) -> Vec<ReceivedUpload> {
        self.state.uploads.lock().unwrap().clone()
    }

    pub fn record_count(&self) -> usize {
        self.state.records.lock().unwrap().len()
    }

    pub fn insert_record(&self, metadata: AssetMetadata, file_name: &str, bytes: &[u8]) -> i64 {
        let mut records = self.state.records.lock().unwrap();
        let id = records.len() as i64 + 1;
        records.push((
            AssetRecord {
                id,
                created_at: created_at(),
                deleted_at: None,
                metadata,
                original_filename: Some(file_name.to_string()),
                s3_url: None,
                local_file_path: Some(format!("uploads/images/{file_name}")),
            },
            bytes.to_vec(),
        ));
        id
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "Image Asset Manager",
        "version": "1.0.0"
    }))
}

async fn upload(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Response {
    let mut field_names = Vec::new();
    let mut file_name = None;
    let mut content_type = None;
    let mut bytes = Vec::new();

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            file_name = field.file_name().map(str::to_string);
            content_type = field.content_type().map(str::to_string);
            bytes = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        }
        field_names.push(name);
    }

    let name = file_name.clone().unwrap_or_default();
    state.uploads.lock().unwrap().push(ReceivedUpload {
        query: query.clone(),
        field_names,
        file_name: file_name.clone(),
        content_type,
        bytes: bytes.clone(),
    });

    if state.slow_files.contains(&name) {
        tokio::time::sleep(Duration::from_secs(3)).await;
    }
    if state.fail_files.contains(&name) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "Upload failed: simulated storage error" })),
        )
            .into_response();
    }

    let metadata = AssetMetadata {
        angle_1: query.get("angle_1").cloned(),
        angle_2: query.get("angle_2").cloned(),
        action_1: query.get("action_1").cloned(),
        action_2: query.get("action_2").cloned(),
        action_3: query.get("action_3").cloned(),
        prompt: query.get("prompt").cloned(),
    };

    let record = {
        let mut records = state.records.lock().unwrap();
        let record = AssetRecord {
            id: records.len() as i64 + 1,
            created_at: created_at(),
            deleted_at: None,
            metadata,
            original_filename: file_name,
            s3_url: None,
            local_file_path: Some(format!("uploads/images/{name}")),
        };
        records.push((record.clone(), bytes));
        record
    };

    let mut asset = serde_json::to_value(&record).expect("record serializes");
    if state.zoned_timestamps {
        asset["created_at"] = json!("2024-06-01T12:00:00Z");
    }

    Json(json!({
        "success": true,
        "message": "Image uploaded successfully",
        "asset": asset,
        "s3_url": record.local_file_path,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    angle_1: Option<String>,
    action_1: Option<String>,
    #[serde(default)]
    include_deleted: bool,
    limit: u32,
    offset: u32,
}

async fn search(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<SearchParams>,
) -> Json<serde_json::Value> {
    let records = state.records.lock().unwrap();
    let matching: Vec<AssetRecord> = records
        .iter()
        .map(|(record, _)| record)
        .filter(|r| params.include_deleted || r.deleted_at.is_none())
        .filter(|r| params.angle_1.is_none() || r.metadata.angle_1 == params.angle_1)
        .filter(|r| params.action_1.is_none() || r.metadata.action_1 == params.action_1)
        .cloned()
        .collect();
    let page: Vec<AssetRecord> = matching
        .iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .cloned()
        .collect();

    Json(json!({
        "total": matching.len(),
        "limit": params.limit,
        "offset": params.offset,
        "results": page,
    }))
}

fn not_found(id: i64) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": format!("Asset with ID {id} not found") })),
    )
        .into_response()
}

async fn get_asset(State(state): State<Arc<ServerState>>, UrlPath(id): UrlPath<i64>) -> Response {
    let records = state.records.lock().unwrap();
    match records.iter().find(|(record, _)| record.id == id) {
        Some((record, _)) => Json(record.clone()).into_response(),
        None => not_found(id),
    }
}

async fn download(State(state): State<Arc<ServerState>>, UrlPath(id): UrlPath<i64>) -> Response {
    let records = state.records.lock().unwrap();
    match records.iter().find(|(record, _)| record.id == id) {
        Some((record, _)) if record.deleted_at.is_some() => (
            StatusCode::GONE,
            Json(json!({ "detail": format!("Asset with ID {id} has been deleted") })),
        )
            .into_response(),
        Some((_, bytes)) => bytes.clone().into_response(),
        None => not_found(id),
    }
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    #[serde(default)]
    hard_delete: bool,
}

async fn delete_asset(
    State(state): State<Arc<ServerState>>,
    UrlPath(id): UrlPath<i64>,
    Query(params): Query<DeleteParams>,
) -> Response {
    let mut records = state.records.lock().unwrap();
    let Some(position) = records.iter().position(|(record, _)| record.id == id) else {
        return not_found(id);
    };

    if params.hard_delete {
        records.remove(position);
        return Json(json!({
            "success": true,
            "message": format!("Asset {id} permanently deleted"),
            "deleted_asset": null,
        }))
        .into_response();
    }

    let record = &mut records[position].0;
    record.deleted_at = Some(created_at() + chrono::Duration::hours(1));
    Json(json!({
        "success": true,
        "message": format!("Asset {id} soft deleted"),
        "deleted_asset": record.clone(),
    }))
    .into_response()
}

async fn actions(State(state): State<Arc<ServerState>>) -> Json<serde_json::Value> {
    let records = state.records.lock().unwrap();
    let mut actions: Vec<String> = records
        .iter()
        .filter_map(|(record, _)| record.metadata.action_1.clone())
        .filter(|action| !action.is_empty())
        .collect();
    actions.sort();
    actions.dedup();
    Json(json!({ "count": actions.len(), "actions": actions }))
}

pub fn image_bytes(dir: &Path, name: &str) -> Vec<u8> {
    std::fs::read(dir.join(name)).expect("read image fixture")
}
