use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::RateLimitConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Per-client sliding-window counter. Timestamps older than the window are
/// pruned on every check; in-process only, so limits apply per instance.
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    hits: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
            hits: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn allow(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().await;
        let timestamps = hits.entry(client.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);
        if timestamps.len() >= self.max_requests {
            return false;
        }
        timestamps.push(now);
        true
    }
}

fn client_key(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            return first.trim().to_string();
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);
    if !state.limiter.allow(&client).await {
        warn!(%client, "rate limit exceeded");
        return ApiError::RateLimited.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: usize, window_secs: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_requests,
            window_secs,
        })
    }

    #[tokio::test]
    async fn allows_up_to_the_limit_then_blocks() {
        let limiter = limiter(3, 60);
        assert!(limiter.allow("1.2.3.4").await);
        assert!(limiter.allow("1.2.3.4").await);
        assert!(limiter.allow("1.2.3.4").await);
        assert!(!limiter.allow("1.2.3.4").await);
    }

    #[tokio::test]
    async fn clients_are_tracked_independently() {
        let limiter = limiter(1, 60);
        assert!(limiter.allow("1.2.3.4").await);
        assert!(limiter.allow("5.6.7.8").await);
        assert!(!limiter.allow("1.2.3.4").await);
    }

    #[tokio::test]
    async fn window_expiry_frees_the_budget() {
        let limiter = limiter(1, 0);
        assert!(limiter.allow("1.2.3.4").await);
        // Zero-length window: the previous hit is already outside it.
        assert!(limiter.allow("1.2.3.4").await);
    }
}
