use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::extractors::AdminUser;
use crate::credits::DEFAULT_DAILY_LIMIT;
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/credits/:user_id",
        get(get_credits).post(admin_reset_credits),
    )
}

#[instrument(skip(state))]
pub async fn get_credits(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let status = state.ledger.check(user_id).await?;
    Ok(Json(json!({
        "remaining": status.remaining,
        "total": status.daily_limit,
        "used": status.used,
        "hasCredits": status.has_credits,
        "resetTime": "Daily at midnight",
        "userId": user_id,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetCreditsRequest {
    pub new_credits: Option<i32>,
}

#[instrument(skip(state, admin))]
pub async fn admin_reset_credits(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<ResetCreditsRequest>,
) -> Result<Json<Value>, ApiError> {
    let new_limit = payload.new_credits.unwrap_or(DEFAULT_DAILY_LIMIT);
    if !(0..=1000).contains(&new_limit) {
        return Err(ApiError::Validation(vec![
            "newCredits must be between 0 and 1000".into(),
        ]));
    }

    if state.store.find_user_by_id(user_id).await?.is_none() {
        return Err(ApiError::NotFound("User not found".into()));
    }

    if !state.auth.reset_user_credits(user_id, new_limit).await {
        return Err(ApiError::Internal(anyhow::anyhow!(
            "failed to reset credits"
        )));
    }

    info!(admin = %admin.0.email, %user_id, new_limit, "admin reset credits");
    let status = state.ledger.check(user_id).await?;
    Ok(Json(json!({
        "message": "Credits reset successfully",
        "remaining": status.remaining,
        "total": status.daily_limit,
    })))
}
