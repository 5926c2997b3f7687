//! HTTP API endpoints for question management.
//!
//! These endpoints are used by the admin panel and are routed behind Basic
//! auth in `main`.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::state::{AppState, QuestionPage, DEFAULT_PAGE_LIMIT};
use crate::storage::{extract_object_path, object_path, StorageError, GAME_ASSETS};
use crate::types::{Question, QuestionDraft, QuestionId, QuestionKind};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Errors surfaced by the admin API
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Storage backend failed: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Map a state-layer error message onto the right status.
    fn from_state(err: String) -> Self {
        if err.contains("not found") {
            ApiError::NotFound(err)
        } else {
            ApiError::BadRequest(err)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Storage(StorageError::InvalidPath(path)) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid object path: {}", path),
            ),
            ApiError::Storage(err) => {
                tracing::error!("Storage backend failed: {}", err);
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuestionsQuery {
    pub kind: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// List questions, newest first.
///
/// GET /api/admin/questions?kind=movie&page=1&limit=50
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuestionsQuery>,
) -> Result<Json<QuestionPage>, ApiError> {
    if let Some(kind) = &query.kind {
        if !QuestionKind::TAGS.contains(&kind.as_str()) {
            return Err(ApiError::BadRequest(format!(
                "Unknown question kind: {}",
                kind
            )));
        }
    }
    let page = state
        .list_questions(
            query.kind.as_deref(),
            query.page.unwrap_or(1),
            query.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        )
        .await;
    Ok(Json(page))
}

/// Fetch a single question.
///
/// GET /api/admin/questions/{id}
pub async fn get_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<QuestionId>,
) -> Result<Json<Question>, ApiError> {
    let question = state
        .get_question(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Question not found: {}", id)))?;
    Ok(Json(question))
}

/// Create a question.
///
/// POST /api/admin/questions
pub async fn create_question(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<QuestionDraft>,
) -> Result<(StatusCode, Json<Question>), ApiError> {
    let question = state
        .create_question(draft)
        .await
        .map_err(ApiError::from_state)?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// Replace a question's content.
///
/// PUT /api/admin/questions/{id}
pub async fn update_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<QuestionId>,
    Json(draft): Json<QuestionDraft>,
) -> Result<Json<Question>, ApiError> {
    let question = state
        .update_question(&id, draft)
        .await
        .map_err(ApiError::from_state)?;
    Ok(Json(question))
}

/// Delete a question and clean up its stored images.
///
/// DELETE /api/admin/questions/{id}
///
/// Image cleanup is best-effort: a failing delete is logged per image and
/// never aborts the question removal.
pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<QuestionId>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .delete_question(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Question not found: {}", id)))?;

    for url in removed.image_urls() {
        let Some(path) = extract_object_path(url) else {
            tracing::debug!("Skipping image cleanup for external URL: {}", url);
            continue;
        };
        if let Err(e) = state.storage.delete(GAME_ASSETS, path).await {
            tracing::warn!("Failed to delete image {} for question {}: {}", path, id, e);
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub kind: String,
    pub ext: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub path: String,
    pub url: String,
}

/// Upload a question image and get its public URL back.
///
/// POST /api/admin/images?kind=movie&ext=png (raw image body)
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    if !QuestionKind::TAGS.contains(&query.kind.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Unknown question kind: {}",
            query.kind
        )));
    }
    let ext = query.ext.to_lowercase();
    if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported image extension: {}",
            query.ext
        )));
    }
    if body.is_empty() {
        return Err(ApiError::BadRequest("Image body is empty".to_string()));
    }
    if body.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::BadRequest(format!(
            "Image exceeds the {} MB limit",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }

    let path = object_path(&query.kind, &ext, &body);
    state
        .storage
        .upload(GAME_ASSETS, &path, body.to_vec(), content_type_for(&ext))
        .await?;
    let url = state.storage.public_url(GAME_ASSETS, &path);

    tracing::info!("Uploaded {} image to {}", query.kind, path);
    Ok((StatusCode::CREATED, Json(UploadResponse { path, url })))
}

#[derive(Debug, Deserialize)]
pub struct ListUploadsQuery {
    #[serde(default)]
    pub prefix: String,
}

/// List uploaded image names under a folder, for orphan inspection.
///
/// GET /api/admin/uploads?prefix=quizzes/movie
pub async fn list_uploads(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListUploadsQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let names = state.storage.list(GAME_ASSETS, &query.prefix).await?;
    Ok(Json(names))
}

fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
