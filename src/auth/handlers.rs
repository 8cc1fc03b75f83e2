use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use crate::auth::dto::{AuthResponse, LoginRequest, RegisterRequest};
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (user, token) = state.auth.register(&payload.email, &payload.password).await?;
    Ok(Json(AuthResponse { user, token }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (user, token) = state.auth.login(&payload.email, &payload.password).await?;
    Ok(Json(AuthResponse { user, token }))
}
