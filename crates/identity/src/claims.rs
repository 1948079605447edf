use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use gurukul_core::PrincipalId;

use crate::roles::Role;

/// Which half of a token pair a claim set belongs to.
///
/// Refresh tokens never authenticate requests and access tokens never mint
/// new pairs; the kind is baked into the signature so neither can stand in
/// for the other.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Signed token claims (transport-agnostic).
///
/// This is the minimal set of claims the authority expects once a token has
/// been decoded/verified by the signing layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    /// Role at issuance time. Authorization re-resolves the live record; this
    /// is a hint for logging and coarse routing, not the source of truth.
    pub role: Role,

    /// Access or refresh.
    pub kind: TokenKind,

    /// Unique token id; two tokens minted in the same instant still differ.
    pub jti: Uuid,

    /// Issued-at timestamp. Compared against the principal's
    /// `password_changed_at` by the validity rule.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("wrong token kind for this operation")]
    WrongKind,
}

/// Deterministically validate claim timing.
///
/// Note: this validates the *claims* only. Signature verification / decoding
/// is intentionally outside this crate.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

impl JwtClaims {
    pub fn expect_kind(&self, kind: TokenKind) -> Result<(), TokenValidationError> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(TokenValidationError::WrongKind)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            sub: PrincipalId::new(),
            role: Role::Student,
            kind: TokenKind::Access,
            jti: Uuid::now_v7(),
            issued_at,
            expires_at,
        }
    }

    #[test]
    fn valid_window_passes() {
        let now = Utc::now();
        let c = claims(now - Duration::minutes(1), now + Duration::minutes(10));
        assert!(validate_claims(&c, now).is_ok());
    }

    #[test]
    fn expired_token_fails() {
        let now = Utc::now();
        let c = claims(now - Duration::hours(2), now - Duration::hours(1));
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::Expired));
    }

    #[test]
    fn future_issued_at_fails() {
        let now = Utc::now();
        let c = claims(now + Duration::minutes(5), now + Duration::hours(1));
        assert_eq!(
            validate_claims(&c, now),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn inverted_window_fails() {
        let now = Utc::now();
        let c = claims(now, now - Duration::minutes(1));
        assert_eq!(
            validate_claims(&c, now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let now = Utc::now();
        let c = claims(now, now + Duration::minutes(5));
        assert!(c.expect_kind(TokenKind::Access).is_ok());
        assert_eq!(
            c.expect_kind(TokenKind::Refresh),
            Err(TokenValidationError::WrongKind)
        );
    }
}
