//! Credential vault primitives: password hashing and one-time tokens.
//!
//! Raw passwords and raw token values never leave this module's call stack;
//! only Argon2id hash strings and sha256 digests are stored or logged.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Consecutive failures before the account locks.
pub const MAX_FAILED_LOGINS: u32 = 5;

/// How long a lockout lasts once triggered.
pub const LOCKOUT_MINUTES: i64 = 15;

/// Reset tokens are short-lived.
pub const RESET_TOKEN_MINUTES: i64 = 10;

/// Email-verification tokens get a day.
pub const VERIFICATION_TOKEN_HOURS: i64 = 24;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordVaultError {
    /// The candidate password did not match the stored hash.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The stored hash string could not be parsed (corrupt record).
    #[error("malformed password hash")]
    MalformedHash,

    /// Hashing itself failed (salt generation / parameter error).
    #[error("password hashing failed")]
    HashingFailed,
}

/// Hash a raw password with Argon2id and a fresh OS-random salt.
///
/// CPU-bound; callers on an async runtime should wrap this in
/// `spawn_blocking`.
pub fn hash_password(raw: &str) -> Result<String, PasswordVaultError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map_err(|_| PasswordVaultError::HashingFailed)?;
    Ok(hash.to_string())
}

/// Verify a candidate password against a stored hash.
///
/// The comparison inside the Argon2 verifier is constant-time; callers get a
/// plain invalid-credentials error with no detail about which part failed.
pub fn verify_password(raw: &str, stored_hash: &str) -> Result<(), PasswordVaultError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| PasswordVaultError::MalformedHash)?;
    Argon2::default()
        .verify_password(raw.as_bytes(), &parsed)
        .map_err(|_| PasswordVaultError::InvalidCredentials)
}

/// Stored half of a one-time token: the sha256 digest and its expiry.
///
/// The raw value is returned once at issuance and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDigest {
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenDigest {
    pub fn matches(&self, presented_digest: &str) -> bool {
        self.digest == presented_digest
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A freshly issued one-time token: raw value for the caller, digest for the
/// record.
#[derive(Debug, Clone)]
pub struct OneTimeToken {
    pub raw: String,
    pub stored: TokenDigest,
}

impl OneTimeToken {
    fn generate(now: DateTime<Utc>, ttl: Duration) -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let raw = hex::encode(bytes);
        Self {
            stored: TokenDigest {
                digest: digest_of(&raw),
                expires_at: now + ttl,
            },
            raw,
        }
    }

    /// Password-reset token: 10-minute validity.
    pub fn reset(now: DateTime<Utc>) -> Self {
        Self::generate(now, Duration::minutes(RESET_TOKEN_MINUTES))
    }

    /// Email-verification token: 24-hour validity.
    pub fn verification(now: DateTime<Utc>) -> Self {
        Self::generate(now, Duration::hours(VERIFICATION_TOKEN_HOURS))
    }
}

/// One-way digest of a raw token value.
pub fn digest_of(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash).is_ok());
        assert_eq!(
            verify_password("wrong password", &hash),
            Err(PasswordVaultError::InvalidCredentials)
        );
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same input").unwrap();
        let b = hash_password("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_hash_is_malformed_not_a_mismatch() {
        assert_eq!(
            verify_password("anything", "not-a-phc-string"),
            Err(PasswordVaultError::MalformedHash)
        );
    }

    #[test]
    fn reset_token_digest_matches_raw() {
        let now = Utc::now();
        let token = OneTimeToken::reset(now);
        assert!(token.stored.matches(&digest_of(&token.raw)));
        assert!(!token.stored.is_expired(now));
        assert!(token
            .stored
            .is_expired(now + Duration::minutes(RESET_TOKEN_MINUTES)));
    }

    #[test]
    fn verification_token_outlives_reset_token() {
        let now = Utc::now();
        let reset = OneTimeToken::reset(now);
        let verification = OneTimeToken::verification(now);
        assert!(verification.stored.expires_at > reset.stored.expires_at);
    }

    #[test]
    fn raw_tokens_are_unique() {
        let now = Utc::now();
        let a = OneTimeToken::reset(now);
        let b = OneTimeToken::reset(now);
        assert_ne!(a.raw, b.raw);
    }
}
