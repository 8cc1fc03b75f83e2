use axum::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

pub mod memory;
pub mod postgres;
mod types;

pub use memory::MemStore;
pub use postgres::PgStore;
pub use types::{AdminStats, ImageRecord, NewImage, NewUser, User};

/// Persistence port. One implementation is picked at startup and handed
/// around as `Arc<dyn Store>`; nothing in the app reaches for a global.
///
/// Credit mutations are expressed as atomic set/increment operations here
/// rather than read-modify-write in the services, so concurrent requests
/// from one user cannot lose updates.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, new: NewUser) -> anyhow::Result<User>;
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn all_users(&self) -> anyhow::Result<Vec<User>>;

    async fn set_last_login(&self, id: Uuid, at: OffsetDateTime) -> anyhow::Result<()>;

    /// New-day reset: zero `used_credits` and advance the watermark in one
    /// write, so a second read the same day does not reset again.
    async fn reset_daily_usage(&self, id: Uuid, watermark: OffsetDateTime) -> anyhow::Result<()>;

    /// Conditional debit: increments `used_credits` by `amount` only while
    /// `daily_credits - used_credits >= amount`. Returns whether the debit
    /// was applied.
    async fn consume_credits(&self, id: Uuid, amount: i32) -> anyhow::Result<bool>;

    /// Administrative reset: `used_credits = 0`, `daily_credits = new_limit`.
    async fn reset_credits(&self, id: Uuid, new_limit: i32) -> anyhow::Result<()>;

    async fn save_image(&self, new: NewImage) -> anyhow::Result<ImageRecord>;
    /// Removes a persisted artifact. Used to roll back an admission that
    /// lost the credit race after its image was already written.
    async fn delete_image(&self, id: Uuid) -> anyhow::Result<()>;
    async fn user_images(&self, user_id: Uuid, limit: i64) -> anyhow::Result<Vec<ImageRecord>>;
    async fn image_by_shareable_id(&self, shareable_id: &str)
        -> anyhow::Result<Option<ImageRecord>>;

    /// Upsert today's usage row for the user: add `credits` and count one
    /// generated image.
    async fn track_usage(&self, user_id: Uuid, credits: i64) -> anyhow::Result<()>;
    async fn admin_stats(&self) -> anyhow::Result<AdminStats>;
    async fn recent_images(&self, limit: i64) -> anyhow::Result<Vec<ImageRecord>>;
}
