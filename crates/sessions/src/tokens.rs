//! Token signing and fingerprinting.

use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use gurukul_identity::JwtClaims;

/// Process-wide token configuration, fixed at startup.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    /// Default lifetimes: day-long access tokens, two-week refresh tokens.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl: Duration::hours(24),
            refresh_ttl: Duration::days(14),
        }
    }

    pub fn with_ttls(secret: impl Into<String>, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            access_ttl,
            refresh_ttl,
        }
    }
}

/// One-way fingerprint of a raw token. Safe to store and log; the raw value
/// cannot be recovered from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(raw_token: &str) -> Self {
        Self(hex::encode(Sha256::digest(raw_token.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// HS256 signer/verifier over [`JwtClaims`].
///
/// Expiry is deliberately not checked at decode time; the registry's validity
/// rule owns all timing decisions so they stay testable with an injected
/// clock.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn encode(&self, claims: &JwtClaims) -> Result<String, jsonwebtoken::errors::Error> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
    }

    /// Decode and verify the signature. Any failure (shape, signature,
    /// algorithm) collapses to an error; callers treat the token as opaque
    /// garbage and never learn which part failed.
    pub fn decode(&self, token: &str) -> Result<JwtClaims, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gurukul_core::PrincipalId;
    use gurukul_identity::{Role, TokenKind};
    use uuid::Uuid;

    fn sample_claims() -> JwtClaims {
        let now = Utc::now();
        JwtClaims {
            sub: PrincipalId::new(),
            role: Role::Guru,
            kind: TokenKind::Access,
            jti: Uuid::now_v7(),
            issued_at: now,
            expires_at: now + Duration::hours(1),
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let signer = TokenSigner::new("test-secret");
        let claims = sample_claims();
        let token = signer.encode(&claims).unwrap();
        let decoded = signer.decode(&token).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn wrong_secret_fails_signature() {
        let signer = TokenSigner::new("test-secret");
        let other = TokenSigner::new("other-secret");
        let token = signer.encode(&sample_claims()).unwrap();
        assert!(other.decode(&token).is_err());
    }

    #[test]
    fn tampered_token_fails() {
        let signer = TokenSigner::new("test-secret");
        let mut token = signer.encode(&sample_claims()).unwrap();
        // Flip a character in the payload segment.
        let mid = token.len() / 2;
        let replacement = if token.as_bytes()[mid] == b'A' { 'B' } else { 'A' };
        token.replace_range(mid..mid + 1, &replacement.to_string());
        assert!(signer.decode(&token).is_err());
    }

    #[test]
    fn fingerprints_differ_per_token() {
        let signer = TokenSigner::new("test-secret");
        let a = signer.encode(&sample_claims()).unwrap();
        let b = signer.encode(&sample_claims()).unwrap();
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&a));
    }
}
