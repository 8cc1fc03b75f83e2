use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::auth::password::SecretHasher;
use crate::store::User;

/// Fixed header text. The signature covers the literal encoded text, so this
/// must stay byte-identical to what existing deployments emit.
const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Signed token payload. Field order matters: the serialized form is what
/// gets signed, and tokens must stay interchangeable with the previous
/// deployment during a migration window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

/// Minimal bearer-token codec: `base64(header).base64(payload).signature`,
/// where the signature is the keyed hex digest of the first two segments.
/// Not a standards-compliant JWT; validity is purely signature plus expiry,
/// so tokens cannot be revoked before they expire.
#[derive(Clone)]
pub struct TokenCodec {
    signer: SecretHasher,
    ttl_secs: i64,
}

impl TokenCodec {
    pub fn new(secret: impl Into<String>, ttl_secs: i64) -> Self {
        Self {
            signer: SecretHasher::new(secret),
            ttl_secs,
        }
    }

    pub fn issue(&self, user: &User) -> anyhow::Result<String> {
        self.issue_at(user, OffsetDateTime::now_utc().unix_timestamp())
    }

    pub fn issue_at(&self, user: &User, now: i64) -> anyhow::Result<String> {
        let claims = TokenClaims {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        let header = Base64::encode_string(HEADER_JSON.as_bytes());
        let payload = Base64::encode_string(&serde_json::to_vec(&claims)?);
        let signature = self.signer.hash(&format!("{header}.{payload}"));
        debug!(user_id = %user.id, "token issued");
        Ok(format!("{header}.{payload}.{signature}"))
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut parts = token.split('.');
        let (header, payload, signature) = match (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => return Err(TokenError::Malformed),
        };

        let expected = self.signer.hash(&format!("{header}.{payload}"));
        if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            return Err(TokenError::InvalidSignature);
        }

        let raw = Base64::decode_vec(payload).map_err(|_| TokenError::Malformed)?;
        let claims: TokenClaims =
            serde_json::from_slice(&raw).map_err(|_| TokenError::Malformed)?;

        if claims.exp < OffsetDateTime::now_utc().unix_timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "user@example.com".into(),
            password_hash: "digest".into(),
            role: "user".into(),
            daily_credits: 10,
            used_credits: 0,
            created_at: OffsetDateTime::now_utc(),
            last_login: None,
        }
    }

    fn codec() -> TokenCodec {
        TokenCodec::new("token-secret", 24 * 60 * 60)
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let codec = codec();
        let user = test_user();
        let token = codec.issue(&user).expect("issue");
        let claims = codec.verify(&token).expect("verify");
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, "user");
        assert_eq!(claims.exp, claims.iat + 24 * 60 * 60);
    }

    #[test]
    fn rejects_token_with_wrong_part_count() {
        let codec = codec();
        assert_eq!(codec.verify("only.two"), Err(TokenError::Malformed));
        assert_eq!(codec.verify("a.b.c.d"), Err(TokenError::Malformed));
    }

    #[test]
    fn rejects_tampered_payload() {
        let codec = codec();
        let token = codec.issue(&test_user()).expect("issue");
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        let flipped = if parts[1].starts_with('A') { "B" } else { "A" };
        parts[1].replace_range(0..1, flipped);
        assert_eq!(
            codec.verify(&parts.join(".")),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let token = TokenCodec::new("other-secret", 3600)
            .issue(&test_user())
            .expect("issue");
        assert_eq!(codec().verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn rejects_expired_token() {
        let codec = codec();
        let past = OffsetDateTime::now_utc().unix_timestamp() - 2 * 24 * 60 * 60;
        let token = codec.issue_at(&test_user(), past).expect("issue");
        assert_eq!(codec.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn correctly_signed_garbage_payload_is_malformed() {
        let codec = codec();
        let header = Base64::encode_string(HEADER_JSON.as_bytes());
        let payload = Base64::encode_string(b"not json");
        let signature = SecretHasher::new("token-secret").hash(&format!("{header}.{payload}"));
        assert_eq!(
            codec.verify(&format!("{header}.{payload}.{signature}")),
            Err(TokenError::Malformed)
        );
    }
}
