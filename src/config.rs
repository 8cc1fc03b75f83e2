use serde::Deserialize;
use tracing::warn;

/// Secrets and token lifetime. Password hashing and token signing are keyed
/// independently; both fall back to `AUTH_SECRET` so tokens issued by an
/// existing deployment keep verifying during a migration window.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub password_secret: String,
    pub token_secret: String,
    pub token_ttl_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub gemini_api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub auth: AuthConfig,
    pub provider: ProviderConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let auth_secret = match std::env::var("AUTH_SECRET") {
            Ok(s) => s,
            Err(_) => {
                warn!("AUTH_SECRET not set, using built-in default; do not do this in production");
                "default-salt".to_string()
            }
        };
        let auth = AuthConfig {
            password_secret: std::env::var("PASSWORD_SECRET")
                .unwrap_or_else(|_| auth_secret.clone()),
            token_secret: std::env::var("TOKEN_SECRET").unwrap_or_else(|_| auth_secret.clone()),
            token_ttl_secs: std::env::var("TOKEN_TTL_SECS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(24 * 60 * 60),
        };
        let provider = ProviderConfig {
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            timeout_secs: std::env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        };
        let rate_limit = RateLimitConfig {
            max_requests: std::env::var("RATE_LIMIT_MAX")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(30),
            window_secs: std::env::var("RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60),
        };
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            auth,
            provider,
            rate_limit,
        })
    }
}
