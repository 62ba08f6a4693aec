use std::sync::Arc;

use axum::extract::State;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::{AppState, SharedState};
use crate::storage::{object_key, ObjectStore};
use crate::validation::{not_blank, ValidJson, ValidQuery};

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UploadUrlQuery {
    pub path: String,
    pub ext: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct KeyRequest {
    #[validate(custom(function = "not_blank"))]
    pub key: String,
}

fn store(state: &AppState) -> Result<Arc<dyn ObjectStore>, AppError> {
    state
        .storage
        .clone()
        .ok_or_else(|| AppError::Unavailable("Object storage is not configured".to_string()))
}

pub async fn upload_url(
    _auth: AuthUser,
    State(state): State<SharedState>,
    ValidQuery(query): ValidQuery<UploadUrlQuery>,
) -> Result<ApiResponse, AppError> {
    let store = store(&state)?;

    let key = object_key(&query.path, &query.ext);
    let url = store.upload_url(&key).await.map_err(AppError::Internal)?;

    Ok(ApiResponse::ok("Upload URL generated").with_docs(json!({ "url": url, "key": key })))
}

pub async fn signed_url(
    _auth: AuthUser,
    State(state): State<SharedState>,
    ValidQuery(query): ValidQuery<KeyRequest>,
) -> Result<ApiResponse, AppError> {
    let store = store(&state)?;

    let key = query.key.trim();
    let url = store.download_url(key).await.map_err(AppError::Internal)?;

    Ok(ApiResponse::ok("Signed URL fetched").with_docs(json!({ "url": url, "key": key })))
}

pub async fn delete_file(
    auth: AuthUser,
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<KeyRequest>,
) -> Result<ApiResponse, AppError> {
    let store = store(&state)?;

    let key = req.key.trim();
    store.delete(key).await.map_err(AppError::Internal)?;

    tracing::info!(user = %auth.user_id, key, "Object deleted");

    Ok(ApiResponse::ok("File deleted successfully"))
}
