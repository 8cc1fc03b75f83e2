use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::auth::services::AuthService;
use crate::config::AppConfig;
use crate::credits::CreditLedger;
use crate::generate::provider::{DisabledGenerator, GeminiGenerator, ImageGenerator};
use crate::ratelimit::RateLimiter;
use crate::store::{MemStore, PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub generator: Arc<dyn ImageGenerator>,
    pub auth: AuthService,
    pub ledger: CreditLedger,
    pub limiter: RateLimiter,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
                    warn!(error = %e, "migration failed; continuing");
                }
                Arc::new(PgStore::new(pool))
            }
            None => {
                warn!("DATABASE_URL not set, using in-memory store; data is ephemeral");
                Arc::new(MemStore::new())
            }
        };

        let generator: Arc<dyn ImageGenerator> = match &config.provider.gemini_api_key {
            Some(key) => Arc::new(GeminiGenerator::new(key.clone())),
            None => {
                info!("GEMINI_API_KEY not set, generation falls back to placeholder output");
                Arc::new(DisabledGenerator)
            }
        };

        Ok(Self::from_parts(config, store, generator))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn Store>,
        generator: Arc<dyn ImageGenerator>,
    ) -> Self {
        let auth = AuthService::new(store.clone(), &config.auth);
        let ledger = CreditLedger::new(store.clone());
        let limiter = RateLimiter::new(&config.rate_limit);
        Self {
            config,
            store,
            generator,
            auth,
            ledger,
            limiter,
        }
    }

    #[cfg(test)]
    pub(crate) fn fake() -> Self {
        Self::fake_with(Arc::new(MemStore::new()), Arc::new(DisabledGenerator))
    }

    #[cfg(test)]
    pub(crate) fn fake_with(
        store: Arc<dyn Store>,
        generator: Arc<dyn ImageGenerator>,
    ) -> Self {
        use crate::config::{AuthConfig, ProviderConfig, RateLimitConfig};

        let config = Arc::new(AppConfig {
            database_url: None,
            auth: AuthConfig {
                password_secret: "test-password-secret".into(),
                token_secret: "test-token-secret".into(),
                token_ttl_secs: 24 * 60 * 60,
            },
            provider: ProviderConfig {
                gemini_api_key: None,
                timeout_secs: 5,
            },
            rate_limit: RateLimitConfig {
                max_requests: 30,
                window_secs: 60,
            },
        });
        Self::from_parts(config, store, generator)
    }

    #[cfg(test)]
    pub(crate) async fn seed_admin(&self, email: &str) -> crate::store::User {
        self.store
            .create_user(crate::store::NewUser {
                email: email.into(),
                password_hash: "digest".into(),
                role: "admin".into(),
                daily_credits: 10,
                used_credits: 0,
            })
            .await
            .expect("seed admin")
    }

    #[cfg(test)]
    pub(crate) fn issue_token(&self, user: &crate::store::User) -> String {
        self.auth.issue_token_for(user)
    }
}
