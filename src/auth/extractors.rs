use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use crate::auth::token::TokenClaims;
use crate::error::ApiError;
use crate::state::AppState;

/// Extracts and verifies the bearer token, then requires the admin role.
/// Missing or bad credential is 401; a valid token for a non-admin is 403.
#[derive(Debug)]
pub struct AdminUser(pub TokenClaims);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Authentication("Authorization required".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::Authentication("Invalid Authorization header".into()))?;

        let claims = state.auth.verify_token(token).map_err(|e| {
            warn!(error = %e, "admin token rejected");
            ApiError::Authentication("Invalid or expired token".into())
        })?;

        if !state.auth.is_admin(claims.user_id).await? {
            return Err(ApiError::Forbidden("Admin access required".into()));
        }

        Ok(AdminUser(claims))
    }
}
