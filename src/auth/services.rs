use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::SecretHasher;
use crate::auth::token::{TokenClaims, TokenCodec, TokenError};
use crate::config::AuthConfig;
use crate::credits::DEFAULT_DAILY_LIMIT;
use crate::error::ApiError;
use crate::store::{NewUser, Store, User};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trims and strips script blocks from client-supplied text.
pub fn sanitize_text(input: &str) -> String {
    lazy_static! {
        static ref SCRIPT_RE: Regex = Regex::new(r"(?is)<script\b.*?</script>").unwrap();
    }
    SCRIPT_RE.replace_all(input, "").trim().to_string()
}

/// Registration, login, token verification and admin checks, composed from
/// the hashing primitive, the token codec and the store port. Password
/// hashing and token signing are independently keyed.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    passwords: SecretHasher,
    tokens: TokenCodec,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, config: &AuthConfig) -> Self {
        Self {
            store,
            passwords: SecretHasher::new(config.password_secret.clone()),
            tokens: TokenCodec::new(config.token_secret.clone(), config.token_ttl_secs),
        }
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<(User, String), ApiError> {
        let email = sanitize_text(email).to_lowercase();
        let password = sanitize_text(password);

        let mut errors = Vec::new();
        if !is_valid_email(&email) {
            errors.push("email must be a valid email address".to_string());
        }
        if password.len() < 6 {
            errors.push("password must be at least 6 characters".to_string());
        }
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        if self.store.find_user_by_email(&email).await?.is_some() {
            warn!(%email, "registration for existing email");
            return Err(ApiError::Conflict("User already exists".into()));
        }

        let user = self
            .store
            .create_user(NewUser {
                email,
                password_hash: self.passwords.hash(&password),
                role: "user".into(),
                daily_credits: DEFAULT_DAILY_LIMIT,
                used_credits: 0,
            })
            .await?;
        let token = self.tokens.issue(&user)?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok((user, token))
    }

    /// Unknown email and wrong password produce the identical error so the
    /// endpoint cannot be used to enumerate accounts.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String), ApiError> {
        let email = sanitize_text(email).to_lowercase();
        let password = sanitize_text(password);

        let mut user = match self.store.find_user_by_email(&email).await? {
            Some(u) => u,
            None => {
                warn!(%email, "login for unknown email");
                return Err(ApiError::Authentication("Invalid credentials".into()));
            }
        };

        if !self.passwords.verify(&password, &user.password_hash) {
            warn!(user_id = %user.id, "login with invalid password");
            return Err(ApiError::Authentication("Invalid credentials".into()));
        }

        let now = OffsetDateTime::now_utc();
        self.store.set_last_login(user.id, now).await?;
        user.last_login = Some(now);

        let token = self.tokens.issue(&user)?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok((user, token))
    }

    pub fn verify_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.tokens.verify(token)
    }

    pub async fn is_admin(&self, user_id: Uuid) -> anyhow::Result<bool> {
        Ok(self
            .store
            .find_user_by_id(user_id)
            .await?
            .map(|u| u.is_admin())
            .unwrap_or(false))
    }

    #[cfg(test)]
    pub(crate) fn issue_token_for(&self, user: &User) -> String {
        self.tokens.issue(user).expect("issue token")
    }

    /// Admin action. Returns false instead of erroring when the store write
    /// fails, which keeps the admin surface usable during outages.
    pub async fn reset_user_credits(&self, user_id: Uuid, new_limit: i32) -> bool {
        match self.store.reset_credits(user_id, new_limit).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, %user_id, "reset_user_credits failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn service() -> AuthService {
        let config = AuthConfig {
            password_secret: "password-secret".into(),
            token_secret: "token-secret".into(),
            token_ttl_secs: 24 * 60 * 60,
        };
        AuthService::new(Arc::new(MemStore::new()), &config)
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("spa ced@example.com"));
    }

    #[test]
    fn sanitize_strips_script_blocks() {
        assert_eq!(sanitize_text("  hello  "), "hello");
        assert_eq!(
            sanitize_text("a<script>alert('x')</script>b"),
            "ab"
        );
        assert_eq!(
            sanitize_text("a<SCRIPT type=\"t\">x</SCRIPT>b"),
            "ab"
        );
    }

    #[tokio::test]
    async fn register_then_login_roundtrips_token() {
        let auth = service();
        let (user, _) = auth
            .register("User@Example.com", "hunter22")
            .await
            .expect("register");
        assert_eq!(user.email, "user@example.com");
        assert_eq!(user.daily_credits, 10);
        assert_eq!(user.used_credits, 0);
        assert_eq!(user.role, "user");

        let (logged_in, token) = auth
            .login("user@example.com", "hunter22")
            .await
            .expect("login");
        assert!(logged_in.last_login.is_some());

        let claims = auth.verify_token(&token).expect("verify");
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.role, "user");
    }

    #[tokio::test]
    async fn login_sanitizes_password_the_same_way_register_does() {
        let auth = service();
        auth.register("user@example.com", "  hunter22  ")
            .await
            .expect("register");

        // Both the padded and the trimmed form reach the same stored digest.
        auth.login("user@example.com", "  hunter22  ")
            .await
            .expect("login with padded password");
        auth.login("user@example.com", "hunter22")
            .await
            .expect("login with trimmed password");
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let auth = service();
        auth.register("user@example.com", "hunter22").await.unwrap();
        let err = auth
            .register("user@example.com", "other-password")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_validates_shape() {
        let auth = service();
        let err = auth.register("bad-email", "short").await.unwrap_err();
        match err {
            ApiError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn login_uses_uniform_error_for_unknown_user_and_bad_password() {
        let auth = service();
        auth.register("user@example.com", "hunter22").await.unwrap();

        let unknown = auth
            .login("nobody@example.com", "hunter22")
            .await
            .unwrap_err();
        let wrong = auth
            .login("user@example.com", "not-the-password")
            .await
            .unwrap_err();
        assert_eq!(unknown.to_string(), "Invalid credentials");
        assert_eq!(wrong.to_string(), "Invalid credentials");
    }

    #[tokio::test]
    async fn is_admin_reflects_role() {
        let store = Arc::new(MemStore::new());
        let config = AuthConfig {
            password_secret: "p".into(),
            token_secret: "t".into(),
            token_ttl_secs: 3600,
        };
        let auth = AuthService::new(store.clone(), &config);

        let user = store
            .create_user(NewUser {
                email: "admin@example.com".into(),
                password_hash: "digest".into(),
                role: "admin".into(),
                daily_credits: 10,
                used_credits: 0,
            })
            .await
            .unwrap();
        assert!(auth.is_admin(user.id).await.unwrap());
        assert!(!auth.is_admin(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn reset_user_credits_applies_new_limit() {
        let store = Arc::new(MemStore::new());
        let config = AuthConfig {
            password_secret: "p".into(),
            token_secret: "t".into(),
            token_ttl_secs: 3600,
        };
        let auth = AuthService::new(store.clone(), &config);
        let (user, _) = auth.register("user@example.com", "hunter22").await.unwrap();
        store.consume_credits(user.id, 9).await.unwrap();

        assert!(auth.reset_user_credits(user.id, 25).await);
        let user = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.daily_credits, 25);
        assert_eq!(user.used_credits, 0);
    }
}
