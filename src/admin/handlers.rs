use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::extractors::AdminUser;
use crate::credits::DEFAULT_DAILY_LIMIT;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{ImageRecord, User};

const PROMPT_PREVIEW_LEN: usize = 50;
const ACTIVE_WINDOW_DAYS: i64 = 7;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/stats", get(stats))
        .route("/admin/users", get(list_users))
        .route("/admin/activity", get(recent_activity))
        .route("/admin/users/:user_id/reset-credits", post(reset_credits))
}

fn is_active(user: &User, now: OffsetDateTime) -> bool {
    let last_seen = user.last_login.unwrap_or(user.created_at);
    last_seen >= now - Duration::days(ACTIVE_WINDOW_DAYS)
}

#[instrument(skip(state, _admin))]
pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Value>, ApiError> {
    let stats = state.store.admin_stats().await?;
    let users = state.store.all_users().await?;
    let now = OffsetDateTime::now_utc();

    let active_users = users.iter().filter(|u| is_active(u, now)).count();
    let new_users_today = users
        .iter()
        .filter(|u| u.created_at.date() == now.date())
        .count();
    let average_images_per_user = if stats.total_users > 0 {
        (stats.total_images as f64 / stats.total_users as f64).round() as i64
    } else {
        0
    };

    Ok(Json(json!({
        "totalUsers": stats.total_users,
        "totalImages": stats.total_images,
        "dailyCreditsUsed": stats.daily_credits_used,
        "activeUsers": active_users,
        "newUsersToday": new_users_today,
        "averageImagesPerUser": average_images_per_user,
    })))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminUserRow {
    #[serde(flatten)]
    user: User,
    credits_remaining: i32,
    is_active: bool,
    joined_days_ago: i64,
}

#[instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let users = state.store.all_users().await?;
    let total = users.len();
    let total_pages = total.div_ceil(limit);
    let now = OffsetDateTime::now_utc();

    let start = (page - 1).saturating_mul(limit);
    let rows: Vec<AdminUserRow> = users
        .into_iter()
        .skip(start)
        .take(limit)
        .map(|user| AdminUserRow {
            credits_remaining: user.remaining_credits(),
            is_active: is_active(&user, now),
            joined_days_ago: (now - user.created_at).whole_days(),
            user,
        })
        .collect();

    Ok(Json(json!({
        "users": rows,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "totalPages": total_pages,
            "hasNext": start.saturating_add(limit) < total,
            "hasPrev": page > 1,
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivityItem {
    id: Uuid,
    user_email: String,
    user_id: Uuid,
    prompt: String,
    full_prompt: String,
    model: String,
    width: i32,
    height: i32,
    image_url: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    shareable_id: String,
}

fn preview(prompt: &str) -> String {
    if prompt.chars().count() > PROMPT_PREVIEW_LEN {
        let truncated: String = prompt.chars().take(PROMPT_PREVIEW_LEN).collect();
        format!("{truncated}...")
    } else {
        prompt.to_string()
    }
}

fn activity_item(image: ImageRecord, users: &HashMap<Uuid, String>) -> ActivityItem {
    ActivityItem {
        id: image.id,
        user_email: users
            .get(&image.user_id)
            .cloned()
            .unwrap_or_else(|| "Unknown User".into()),
        user_id: image.user_id,
        prompt: preview(&image.prompt),
        full_prompt: image.prompt,
        model: image.model,
        width: image.width,
        height: image.height,
        image_url: image.image_url,
        created_at: image.created_at,
        shareable_id: image.shareable_id,
    }
}

#[instrument(skip(state, _admin))]
pub async fn recent_activity(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let images = state.store.recent_images(limit).await?;
    let users: HashMap<Uuid, String> = state
        .store
        .all_users()
        .await?
        .into_iter()
        .map(|u| (u.id, u.email))
        .collect();

    let activities: Vec<ActivityItem> = images
        .into_iter()
        .map(|image| activity_item(image, &users))
        .collect();

    Ok(Json(json!({
        "activities": activities,
        "total": activities.len(),
        "limit": limit,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetCreditsBody {
    pub new_credits: Option<i32>,
}

#[instrument(skip(state, admin))]
pub async fn reset_credits(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<ResetCreditsBody>,
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
        "userId": user_id,
        "newDailyLimit": new_limit,
        "remaining": status.remaining,
        "resetBy": admin.0.email,
        "resetAt": OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .map_err(|e| ApiError::Internal(e.into()))?,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_prompts() {
        let long = "x".repeat(60);
        assert_eq!(preview(&long), format!("{}...", "x".repeat(50)));
        assert_eq!(preview("short prompt"), "short prompt");
    }

    #[test]
    fn activity_item_falls_back_for_unknown_owner() {
        let image = ImageRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            prompt: "a fox".into(),
            negative_prompt: String::new(),
            width: 512,
            height: 512,
            model: "flash".into(),
            image_url: "/placeholder.svg".into(),
            shareable_id: "abc123defg".into(),
            is_public: false,
            created_at: OffsetDateTime::now_utc(),
        };
        let item = activity_item(image, &HashMap::new());
        assert_eq!(item.user_email, "Unknown User");
    }

    #[tokio::test]
    async fn list_users_survives_huge_page_numbers() {
        let state = AppState::fake();
        let admin = state.seed_admin("admin@example.com").await;
        let claims = state.auth.verify_token(&state.issue_token(&admin)).unwrap();

        let response = list_users(
            State(state),
            AdminUser(claims),
            Query(PageQuery {
                page: Some(usize::MAX),
                limit: Some(100),
            }),
        )
        .await
        .unwrap();

        let body = response.0;
        assert_eq!(body["users"].as_array().unwrap().len(), 0);
        assert_eq!(body["pagination"]["hasNext"], false);
        assert_eq!(body["pagination"]["hasPrev"], true);
    }
}
