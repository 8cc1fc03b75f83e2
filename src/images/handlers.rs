use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::services::sanitize_text;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::ImageRecord;

const DEFAULT_GALLERY_LIMIT: i64 = 50;
const MAX_GALLERY_LIMIT: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/images/:user_id", get(user_gallery))
        .route("/share/:shareable_id", get(shared_image))
}

#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    pub limit: Option<i64>,
}

#[instrument(skip(state))]
pub async fn user_gallery(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<GalleryQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_GALLERY_LIMIT);
    if !(1..=MAX_GALLERY_LIMIT).contains(&limit) {
        return Err(ApiError::Validation(vec![format!(
            "limit must be between 1 and {MAX_GALLERY_LIMIT}"
        )]));
    }

    if state.store.find_user_by_id(user_id).await?.is_none() {
        return Err(ApiError::NotFound("User not found".into()));
    }

    let images = state.store.user_images(user_id, limit).await?;
    Ok(Json(json!({
        "images": images,
        "total": images.len(),
        "userId": user_id,
        "limit": limit,
    })))
}

/// Anonymous read-only retrieval by shareable identifier.
#[instrument(skip(state))]
pub async fn shared_image(
    State(state): State<AppState>,
    Path(shareable_id): Path<String>,
) -> Result<Json<ImageRecord>, ApiError> {
    let shareable_id = sanitize_text(&shareable_id);
    if shareable_id.is_empty() || shareable_id.len() > 50 {
        return Err(ApiError::Validation(vec!["Invalid shareable ID".into()]));
    }

    let image = state
        .store
        .image_by_shareable_id(&shareable_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found".into()))?;
    Ok(Json(image))
}
