use axum::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::types::{AdminStats, ImageRecord, NewImage, NewUser, User};
use super::Store;

/// sqlx-backed store. Credit updates go through single `UPDATE` statements
/// so the increments are atomic at the database.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLS: &str =
    "id, email, password_hash, role, daily_credits, used_credits, created_at, last_login";
const IMAGE_COLS: &str = "id, user_id, prompt, negative_prompt, width, height, model, \
                          image_url, shareable_id, is_public, created_at";

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, new: NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, role, daily_credits, used_credits)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLS}
            "#,
        ))
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.role)
        .bind(new.daily_credits)
        .bind(new.used_credits)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLS} FROM users WHERE email = $1"#,
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!(r#"SELECT {USER_COLS} FROM users WHERE id = $1"#))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn all_users(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLS} FROM users ORDER BY created_at DESC"#,
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn set_last_login(&self, id: Uuid, at: OffsetDateTime) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE users SET last_login = $2 WHERE id = $1"#)
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reset_daily_usage(&self, id: Uuid, watermark: OffsetDateTime) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE users SET used_credits = 0, last_login = $2 WHERE id = $1"#)
            .bind(id)
            .bind(watermark)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn consume_credits(&self, id: Uuid, amount: i32) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET used_credits = used_credits + $2
            WHERE id = $1 AND daily_credits - used_credits >= $2
            "#,
        )
        .bind(id)
        .bind(amount)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn reset_credits(&self, id: Uuid, new_limit: i32) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE users SET used_credits = 0, daily_credits = $2 WHERE id = $1"#)
            .bind(id)
            .bind(new_limit)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save_image(&self, new: NewImage) -> anyhow::Result<ImageRecord> {
        let image = sqlx::query_as::<_, ImageRecord>(&format!(
            r#"
            INSERT INTO images
                (user_id, prompt, negative_prompt, width, height, model,
                 image_url, shareable_id, is_public)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {IMAGE_COLS}
            "#,
        ))
        .bind(new.user_id)
        .bind(&new.prompt)
        .bind(&new.negative_prompt)
        .bind(new.width)
        .bind(new.height)
        .bind(&new.model)
        .bind(&new.image_url)
        .bind(&new.shareable_id)
        .bind(new.is_public)
        .fetch_one(&self.pool)
        .await?;
        Ok(image)
    }

    async fn delete_image(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn user_images(&self, user_id: Uuid, limit: i64) -> anyhow::Result<Vec<ImageRecord>> {
        let images = sqlx::query_as::<_, ImageRecord>(&format!(
            r#"
            SELECT {IMAGE_COLS} FROM images
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(images)
    }

    async fn image_by_shareable_id(
        &self,
        shareable_id: &str,
    ) -> anyhow::Result<Option<ImageRecord>> {
        let image = sqlx::query_as::<_, ImageRecord>(&format!(
            r#"SELECT {IMAGE_COLS} FROM images WHERE shareable_id = $1"#,
        ))
        .bind(shareable_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(image)
    }

    async fn track_usage(&self, user_id: Uuid, credits: i64) -> anyhow::Result<()> {
        let today = OffsetDateTime::now_utc().date();
        sqlx::query(
            r#"
            INSERT INTO usage_days (user_id, day, credits_used, images_generated)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (user_id, day) DO UPDATE
            SET credits_used = usage_days.credits_used + EXCLUDED.credits_used,
                images_generated = usage_days.images_generated + 1
            "#,
        )
        .bind(user_id)
        .bind(today)
        .bind(credits)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn admin_stats(&self) -> anyhow::Result<AdminStats> {
        let total_users: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM users"#)
            .fetch_one(&self.pool)
            .await?;
        let total_images: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM images"#)
            .fetch_one(&self.pool)
            .await?;
        let daily_credits_used: i64 = sqlx::query_scalar(
            r#"SELECT COALESCE(SUM(credits_used), 0)::BIGINT FROM usage_days WHERE day = $1"#,
        )
        .bind(OffsetDateTime::now_utc().date())
        .fetch_one(&self.pool)
        .await?;
        Ok(AdminStats {
            total_users,
            total_images,
            daily_credits_used,
        })
    }

    async fn recent_images(&self, limit: i64) -> anyhow::Result<Vec<ImageRecord>> {
        let images = sqlx::query_as::<_, ImageRecord>(&format!(
            r#"SELECT {IMAGE_COLS} FROM images ORDER BY created_at DESC LIMIT $1"#,
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(images)
    }
}
