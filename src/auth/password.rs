use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// One-way digest of a text plus a fixed process secret, rendered as
/// lowercase hex. The same primitive backs password storage and token
/// signing, each with its own secret; the output format is shared with the
/// previous deployment, so digests stay interchangeable during migration.
#[derive(Clone)]
pub struct SecretHasher {
    secret: String,
}

impl SecretHasher {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn hash(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(self.secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn verify(&self, candidate: &str, digest: &str) -> bool {
        let computed = self.hash(candidate);
        computed.as_bytes().ct_eq(digest.as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_hex() {
        let hasher = SecretHasher::new("secret");
        let digest = hasher.hash("hunter22");
        assert_eq!(digest, hasher.hash("hunter22"));
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = SecretHasher::new("secret");
        let digest = hasher.hash("Secur3P@ssw0rd!");
        assert!(hasher.verify("Secur3P@ssw0rd!", &digest));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hasher = SecretHasher::new("secret");
        let digest = hasher.hash("correct-horse-battery-staple");
        assert!(!hasher.verify("wrong-password", &digest));
    }

    #[test]
    fn different_secrets_produce_different_digests() {
        let passwords = SecretHasher::new("password-secret");
        let tokens = SecretHasher::new("token-secret");
        assert_ne!(passwords.hash("same input"), tokens.hash("same input"));
    }
}
