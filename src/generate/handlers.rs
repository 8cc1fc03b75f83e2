use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use crate::error::ApiError;
use crate::generate::dto::{GenerateRequest, GenerateResponse};
use crate::generate::services;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/generate", post(generate))
}

/// The caller identifies itself in the body; the user id must resolve to an
/// existing record before any admission work happens.
#[instrument(skip(state, payload))]
pub async fn generate(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let user_id = payload
        .user_id
        .ok_or_else(|| ApiError::Authentication("User ID is required".into()))?;
    let user = state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let response = services::admit(&state, &user, payload).await?;
    Ok(Json(response))
}
