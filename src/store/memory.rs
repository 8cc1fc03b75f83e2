use axum::async_trait;
use time::{Date, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::{AdminStats, ImageRecord, NewImage, NewUser, User};
use super::Store;

#[derive(Debug, Clone)]
struct UsageRow {
    user_id: Uuid,
    day: Date,
    credits_used: i64,
    images_generated: i64,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    images: Vec<ImageRecord>,
    usage: Vec<UsageRow>,
}

/// Ephemeral store used when no `DATABASE_URL` is configured, and as the
/// backend for unit tests. Every mutation happens under one write lock, so
/// the conditional debit is as atomic as the SQL version.
#[derive(Default)]
pub struct MemStore {
    inner: RwLock<Tables>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn insert_user_raw(&self, user: User) {
        self.inner.write().await.users.push(user);
    }
}

#[async_trait]
impl Store for MemStore {
    async fn create_user(&self, new: NewUser) -> anyhow::Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            daily_credits: new.daily_credits,
            used_credits: new.used_credits,
            created_at: OffsetDateTime::now_utc(),
            last_login: None,
        };
        self.inner.write().await.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let tables = self.inner.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let tables = self.inner.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn all_users(&self) -> anyhow::Result<Vec<User>> {
        let mut users = self.inner.read().await.users.clone();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn set_last_login(&self, id: Uuid, at: OffsetDateTime) -> anyhow::Result<()> {
        let mut tables = self.inner.write().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn reset_daily_usage(&self, id: Uuid, watermark: OffsetDateTime) -> anyhow::Result<()> {
        let mut tables = self.inner.write().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            user.used_credits = 0;
            user.last_login = Some(watermark);
        }
        Ok(())
    }

    async fn consume_credits(&self, id: Uuid, amount: i32) -> anyhow::Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.users.iter_mut().find(|u| u.id == id) {
            Some(user) if user.daily_credits - user.used_credits >= amount => {
                user.used_credits += amount;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reset_credits(&self, id: Uuid, new_limit: i32) -> anyhow::Result<()> {
        let mut tables = self.inner.write().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            user.used_credits = 0;
            user.daily_credits = new_limit;
        }
        Ok(())
    }

    async fn save_image(&self, new: NewImage) -> anyhow::Result<ImageRecord> {
        let image = ImageRecord {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            prompt: new.prompt,
            negative_prompt: new.negative_prompt,
            width: new.width,
            height: new.height,
            model: new.model,
            image_url: new.image_url,
            shareable_id: new.shareable_id,
            is_public: new.is_public,
            created_at: OffsetDateTime::now_utc(),
        };
        self.inner.write().await.images.push(image.clone());
        Ok(image)
    }

    async fn delete_image(&self, id: Uuid) -> anyhow::Result<()> {
        let mut tables = self.inner.write().await;
        tables.images.retain(|i| i.id != id);
        Ok(())
    }

    async fn user_images(&self, user_id: Uuid, limit: i64) -> anyhow::Result<Vec<ImageRecord>> {
        let tables = self.inner.read().await;
        let mut images: Vec<ImageRecord> = tables
            .images
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        images.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        images.truncate(limit as usize);
        Ok(images)
    }

    async fn image_by_shareable_id(
        &self,
        shareable_id: &str,
    ) -> anyhow::Result<Option<ImageRecord>> {
        let tables = self.inner.read().await;
        Ok(tables
            .images
            .iter()
            .find(|i| i.shareable_id == shareable_id)
            .cloned())
    }

    async fn track_usage(&self, user_id: Uuid, credits: i64) -> anyhow::Result<()> {
        let today = OffsetDateTime::now_utc().date();
        let mut tables = self.inner.write().await;
        match tables
            .usage
            .iter_mut()
            .find(|row| row.user_id == user_id && row.day == today)
        {
            Some(row) => {
                row.credits_used += credits;
                row.images_generated += 1;
            }
            None => tables.usage.push(UsageRow {
                user_id,
                day: today,
                credits_used: credits,
                images_generated: 1,
            }),
        }
        Ok(())
    }

    async fn admin_stats(&self) -> anyhow::Result<AdminStats> {
        let today = OffsetDateTime::now_utc().date();
        let tables = self.inner.read().await;
        Ok(AdminStats {
            total_users: tables.users.len() as i64,
            total_images: tables.images.len() as i64,
            daily_credits_used: tables
                .usage
                .iter()
                .filter(|row| row.day == today)
                .map(|row| row.credits_used)
                .sum(),
        })
    }

    async fn recent_images(&self, limit: i64) -> anyhow::Result<Vec<ImageRecord>> {
        let mut images = self.inner.read().await.images.clone();
        images.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        images.truncate(limit as usize);
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: "digest".into(),
            role: "user".into(),
            daily_credits: 10,
            used_credits: 0,
        }
    }

    #[tokio::test]
    async fn create_and_find_user() {
        let store = MemStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        let by_email = store
            .find_user_by_email("a@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(store
            .find_user_by_email("missing@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn consume_credits_is_conditional() {
        let store = MemStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();

        for _ in 0..10 {
            assert!(store.consume_credits(user.id, 1).await.unwrap());
        }
        assert!(!store.consume_credits(user.id, 1).await.unwrap());

        let user = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.used_credits, 10);
    }

    #[tokio::test]
    async fn reset_credits_sets_limit_and_zeroes_usage() {
        let store = MemStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        store.consume_credits(user.id, 4).await.unwrap();

        store.reset_credits(user.id, 25).await.unwrap();
        let user = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.daily_credits, 25);
        assert_eq!(user.used_credits, 0);
    }

    #[tokio::test]
    async fn track_usage_upserts_per_day() {
        let store = MemStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        store.track_usage(user.id, 1).await.unwrap();
        store.track_usage(user.id, 1).await.unwrap();

        let stats = store.admin_stats().await.unwrap();
        assert_eq!(stats.daily_credits_used, 2);
        assert_eq!(stats.total_users, 1);
    }
}
