use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::store::Store;

pub const DEFAULT_DAILY_LIMIT: i32 = 10;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditStatus {
    pub has_credits: bool,
    pub remaining: i32,
    pub daily_limit: i32,
    pub used: i32,
}

/// Per-user daily quota accounting. There is no scheduled job: the reset is
/// lazy, performed on the first read of a new calendar day relative to the
/// watermark (`last_login`, or `created_at` for never-logged-in users).
#[derive(Clone)]
pub struct CreditLedger {
    store: Arc<dyn Store>,
}

impl CreditLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn check(&self, user_id: Uuid) -> Result<CreditStatus, ApiError> {
        let mut user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

        let now = OffsetDateTime::now_utc();
        let watermark = user.last_login.unwrap_or(user.created_at);
        if now.date() > watermark.date() {
            // New day: zero the counter and advance the watermark in one
            // store write, so a second check today is a no-op.
            self.store.reset_daily_usage(user_id, now).await?;
            user.used_credits = 0;
        }

        let remaining = user.remaining_credits();
        Ok(CreditStatus {
            has_credits: remaining > 0,
            remaining,
            daily_limit: user.daily_credits,
            used: user.used_credits,
        })
    }

    /// Conditional debit at the store layer; false means the quota ran out
    /// (possibly to a concurrent request).
    pub async fn consume(&self, user_id: Uuid, amount: i32) -> anyhow::Result<bool> {
        self.store.consume_credits(user_id, amount).await
    }

    pub async fn reset_to(&self, user_id: Uuid, new_limit: i32) -> anyhow::Result<()> {
        self.store.reset_credits(user_id, new_limit).await?;
        info!(%user_id, new_limit, "credits reset");
        Ok(())
    }
}
