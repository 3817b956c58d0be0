//! In-memory mock of the annotation backend for integration tests.
//!
//! Serves the `/api/v1` dataset, annotation and model routes from a shared
//! [`MockState`] on an ephemeral port. Tests seed the state, point a
//! [`BackendClient`] at the returned URL and inspect the state afterwards.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use labelforge_client::api::BackendClient;
use labelforge_core::annotation::{PersistedAnnotation, SaveAnnotationsRequest};
use labelforge_core::sequence::SAVE_SEQUENCE_HEADER;

pub const DATASET_ID: &str = "1";

/// A save request as received by the mock.
#[derive(Debug, Clone)]
pub struct RecordedSave {
    pub image_id: String,
    pub sequence: Option<u64>,
    pub annotations: Vec<PersistedAnnotation>,
}

/// A model import as received by the mock.
#[derive(Debug, Clone, Default)]
pub struct RecordedImport {
    pub fields: HashMap<String, String>,
    pub file_name: Option<String>,
    pub file_len: usize,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub datasets: Vec<Value>,
    /// Image JSON per dataset id.
    pub images: HashMap<String, Vec<Value>>,
    /// Stored annotations per image id.
    pub annotations: HashMap<String, Vec<PersistedAnnotation>>,
    pub models: Vec<Value>,
    pub model_types: Vec<String>,
    /// Answer annotation loads with this status instead of data.
    pub fail_loads: Option<StatusCode>,
    /// Answer annotation saves with this status instead of storing.
    pub fail_saves: Option<StatusCode>,
    /// Delay applied to the save carrying a given sequence number.
    pub save_delays: HashMap<u64, Duration>,
    pub saves: Vec<RecordedSave>,
    pub imports: Vec<RecordedImport>,
    pub deleted_models: Vec<String>,
    pub deleted_datasets: Vec<String>,
}

pub type SharedState = Arc<Mutex<MockState>>;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Dataset `1` with three images: `10` holds one box, `11` one polygon and
/// `12` nothing. Image ids are numeric on the wire.
pub fn seeded_state() -> MockState {
    let mut state = MockState {
        datasets: vec![json!({
            "id": 1,
            "name": "Street scenes",
            "description": "Dashcam frames",
            "image_count": 3,
            "created_at": "2024-05-01T12:00:00Z"
        })],
        model_types: vec!["yolov5".into(), "yolov8".into()],
        models: vec![
            json!({
                "id": "yolov8n",
                "name": "YOLOv8 Nano",
                "type": "yolov8",
                "classes": ["person", "car"],
                "confidence_threshold": 0.5,
                "iou_threshold": 0.45,
                "is_custom": false
            }),
            json!({
                "id": "custom-1",
                "name": "Parking lot",
                "type": "yolov8",
                "format": "pt",
                "confidence_threshold": 0.9,
                "is_custom": true
            }),
        ],
        ..MockState::default()
    };

    state.images.insert(
        DATASET_ID.to_string(),
        vec![
            image_json(10, "frame_010.jpg", true),
            image_json(11, "frame_011.jpg", true),
            image_json(12, "frame_012.jpg", false),
        ],
    );
    state.annotations.insert(
        "10".to_string(),
        vec![PersistedAnnotation {
            id: Some("a-1".to_string()),
            class_name: "Car".to_string(),
            class_id: 1,
            confidence: 1.0,
            bbox: [10.0, 20.0, 110.0, 70.0],
            segmentation: None,
        }],
    );
    state.annotations.insert(
        "11".to_string(),
        vec![PersistedAnnotation {
            id: Some("a-2".to_string()),
            class_name: "Person".to_string(),
            class_id: 0,
            confidence: 0.8,
            bbox: [0.0, 0.0, 10.0, 10.0],
            segmentation: Some(vec![0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0]),
        }],
    );
    state
}

pub fn image_json(id: i64, filename: &str, is_labeled: bool) -> Value {
    json!({
        "id": id,
        "original_filename": filename,
        "url": format!("/uploads/{filename}"),
        "width": 640,
        "height": 480,
        "is_labeled": is_labeled
    })
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Start the mock backend and return its base URL and state handle.
pub async fn spawn_backend(state: MockState) -> (String, SharedState) {
    let shared = Arc::new(Mutex::new(state));
    let app = build_mock_app(Arc::clone(&shared));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), shared)
}

/// A client pointed at `base_url`.
pub fn client_for(base_url: &str) -> Arc<BackendClient> {
    Arc::new(BackendClient::with_client(reqwest::Client::new(), base_url))
}

pub fn build_mock_app(state: SharedState) -> Router {
    let api = Router::new()
        .route("/datasets/", get(list_datasets))
        .route(
            "/datasets/{id}",
            get(get_dataset).put(update_dataset).delete(delete_dataset),
        )
        .route("/datasets/{id}/images", get(list_images))
        .route(
            "/annotations/{image_id}/annotations",
            get(get_annotations).post(save_annotations),
        )
        .route("/models/", get(list_models))
        .route("/models/types", get(model_types))
        .route("/models/import", post(import_model))
        .route("/models/{id}", get(get_model).delete(delete_model));

    Router::new().nest("/api/v1", api).with_state(state)
}

fn not_found(what: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": format!("{what} not found") }))).into_response()
}

fn id_matches(value: &Value, id: &str) -> bool {
    match &value["id"] {
        Value::String(s) => s == id,
        Value::Number(n) => n.to_string() == id,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn list_datasets(State(state): State<SharedState>) -> Json<Value> {
    Json(Value::Array(state.lock().await.datasets.clone()))
}

async fn get_dataset(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    let state = state.lock().await;
    match state.datasets.iter().find(|d| id_matches(d, &id)) {
        Some(d) => Json(d.clone()).into_response(),
        None => not_found("Dataset"),
    }
}

async fn update_dataset(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().await;
    let Some(dataset) = state.datasets.iter_mut().find(|d| id_matches(d, &id)) else {
        return not_found("Dataset");
    };
    dataset["name"] = body["name"].clone();
    dataset["description"] = body["description"].clone();
    Json(dataset.clone()).into_response()
}

async fn delete_dataset(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    let mut state = state.lock().await;
    let Some(pos) = state.datasets.iter().position(|d| id_matches(d, &id)) else {
        return not_found("Dataset");
    };
    state.datasets.remove(pos);
    state.images.remove(&id);
    state.deleted_datasets.push(id);
    (StatusCode::OK, Json(json!({ "message": "Dataset deleted" }))).into_response()
}

async fn list_images(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    let state = state.lock().await;
    match state.images.get(&id) {
        Some(images) => Json(json!({ "images": images })).into_response(),
        None => not_found("Dataset"),
    }
}

async fn get_annotations(
    State(state): State<SharedState>,
    Path(image_id): Path<String>,
) -> Response {
    let state = state.lock().await;
    if let Some(status) = state.fail_loads {
        return (status, "annotation store unavailable").into_response();
    }
    let annotations = state.annotations.get(&image_id).cloned().unwrap_or_default();
    Json(json!({ "annotations": annotations })).into_response()
}

async fn save_annotations(
    State(state): State<SharedState>,
    Path(image_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SaveAnnotationsRequest>,
) -> Response {
    let sequence = headers
        .get(SAVE_SEQUENCE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let delay = match sequence {
        Some(s) => state.lock().await.save_delays.get(&s).copied(),
        None => None,
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut state = state.lock().await;
    state.saves.push(RecordedSave {
        image_id: image_id.clone(),
        sequence,
        annotations: body.annotations.clone(),
    });
    if let Some(status) = state.fail_saves {
        return (status, "failed to persist annotations").into_response();
    }

    let stored: Vec<PersistedAnnotation> = body
        .annotations
        .into_iter()
        .map(|mut a| {
            a.id = Some(uuid::Uuid::new_v4().to_string());
            a
        })
        .collect();
    let count = stored.len();
    state.annotations.insert(image_id.clone(), stored);

    Json(json!({
        "message": "Annotations saved",
        "image_id": image_id.parse::<i64>().map(Value::from).unwrap_or(Value::String(image_id)),
        "count": count
    }))
    .into_response()
}

async fn list_models(State(state): State<SharedState>) -> Json<Value> {
    Json(Value::Array(state.lock().await.models.clone()))
}

async fn model_types(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({ "model_types": state.lock().await.model_types }))
}

async fn get_model(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    let state = state.lock().await;
    match state.models.iter().find(|m| id_matches(m, &id)) {
        Some(m) => Json(m.clone()).into_response(),
        None => not_found("Model"),
    }
}

async fn import_model(State(state): State<SharedState>, mut multipart: Multipart) -> Response {
    let mut import = RecordedImport::default();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            import.file_name = field.file_name().map(str::to_string);
            import.file_len = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        } else {
            let text = field.text().await.unwrap_or_default();
            import.fields.insert(name, text);
        }
    }

    let model = json!({
        "id": format!("custom-{}", uuid::Uuid::new_v4()),
        "name": import.fields.get("name").cloned().unwrap_or_default(),
        "type": import.fields.get("type").cloned().unwrap_or_default(),
        "is_custom": true
    });

    let mut state = state.lock().await;
    state.imports.push(import);
    state.models.push(model.clone());
    (StatusCode::CREATED, Json(model)).into_response()
}

async fn delete_model(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    let mut state = state.lock().await;
    let Some(pos) = state.models.iter().position(|m| id_matches(m, &id)) else {
        return not_found("Model");
    };
    state.models.remove(pos);
    state.deleted_models.push(id);
    StatusCode::NO_CONTENT.into_response()
}
