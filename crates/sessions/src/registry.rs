//! Session registry: token issuance, rotation, revocation, and the validity
//! rule the authorization guard consults.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use gurukul_core::PrincipalId;
use gurukul_identity::{validate_claims, JwtClaims, Role, TokenKind, TokenValidationError};

use crate::store::{SessionEntry, SessionStore, SessionStoreError};
use crate::tokens::{Fingerprint, TokenConfig, TokenSigner};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Malformed, mis-signed, or wrong-kind token.
    #[error("invalid token")]
    InvalidToken,

    /// Token is past its expiry.
    #[error("token has expired")]
    Expired,

    /// Refresh token is unknown, superseded by rotation, or lost a rotation
    /// race.
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// Access token was explicitly revoked before natural expiry.
    #[error("token has been revoked")]
    Revoked,

    /// Token was issued before the principal's last password change.
    #[error("token predates the last password change")]
    PasswordChanged,

    /// Backing store failure (lock poisoning and the like).
    #[error("session store failure: {0}")]
    Store(SessionStoreError),
}

impl From<SessionStoreError> for RegistryError {
    fn from(value: SessionStoreError) -> Self {
        match value {
            // Both mismatch and missing-session mean the presented refresh
            // token no longer names the live session.
            SessionStoreError::FingerprintMismatch | SessionStoreError::NoSession => {
                RegistryError::InvalidRefreshToken
            }
            other => RegistryError::Store(other),
        }
    }
}

/// The pair handed to a client at login/refresh. Raw token strings; neither
/// is ever persisted or logged by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and validates tokens against a swappable [`SessionStore`].
pub struct SessionRegistry<S> {
    signer: TokenSigner,
    config: TokenConfig,
    store: S,
}

impl<S: SessionStore> SessionRegistry<S> {
    pub fn new(config: TokenConfig, store: S) -> Self {
        Self {
            signer: TokenSigner::new(&config.secret),
            config,
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Signature-only decode: who does this token claim to be?
    ///
    /// Used to resolve the live principal before the full validity rule runs
    /// (rule (d) needs the principal's `password_changed_at`).
    pub fn peek(&self, raw: &str) -> Result<JwtClaims, RegistryError> {
        self.signer.decode(raw).map_err(|_| RegistryError::InvalidToken)
    }

    fn mint(&self, principal: PrincipalId, role: Role, kind: TokenKind, now: DateTime<Utc>)
        -> Result<String, RegistryError> {
        let ttl = match kind {
            TokenKind::Access => self.config.access_ttl,
            TokenKind::Refresh => self.config.refresh_ttl,
        };
        let claims = JwtClaims {
            sub: principal,
            role,
            kind,
            jti: Uuid::now_v7(),
            issued_at: now,
            expires_at: now + ttl,
        };
        self.signer
            .encode(&claims)
            .map_err(|_| RegistryError::InvalidToken)
    }

    /// Issue a fresh token pair, superseding any live session for the
    /// principal (single active session semantics).
    pub fn issue_session(
        &self,
        principal: PrincipalId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, RegistryError> {
        let access_token = self.mint(principal, role, TokenKind::Access, now)?;
        let refresh_token = self.mint(principal, role, TokenKind::Refresh, now)?;

        self.store.install_refresh(SessionEntry {
            principal_id: principal,
            refresh_fingerprint: Fingerprint::of(&refresh_token),
            issued_at: now,
            expires_at: now + self.config.refresh_ttl,
        })?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Rotate: trade a live refresh token for a new pair.
    ///
    /// The compare-and-swap against the stored fingerprint is what closes the
    /// replay window: of two concurrent calls presenting the same stale
    /// token, exactly one installs its replacement; the other observes the
    /// mismatch and fails.
    pub fn refresh(
        &self,
        raw_refresh: &str,
        now: DateTime<Utc>,
    ) -> Result<(PrincipalId, TokenPair), RegistryError> {
        let claims = self
            .signer
            .decode(raw_refresh)
            .map_err(|_| RegistryError::InvalidRefreshToken)?;
        claims
            .expect_kind(TokenKind::Refresh)
            .map_err(|_| RegistryError::InvalidRefreshToken)?;
        validate_claims(&claims, now).map_err(|e| match e {
            TokenValidationError::Expired => RegistryError::Expired,
            _ => RegistryError::InvalidRefreshToken,
        })?;

        let presented = Fingerprint::of(raw_refresh);
        let access_token = self.mint(claims.sub, claims.role, TokenKind::Access, now)?;
        let refresh_token = self.mint(claims.sub, claims.role, TokenKind::Refresh, now)?;

        self.store.swap_refresh(
            claims.sub,
            &presented,
            SessionEntry {
                principal_id: claims.sub,
                refresh_fingerprint: Fingerprint::of(&refresh_token),
                issued_at: now,
                expires_at: now + self.config.refresh_ttl,
            },
        )?;

        Ok((
            claims.sub,
            TokenPair {
                access_token,
                refresh_token,
            },
        ))
    }

    /// Blacklist an access token for the remainder of its lifetime.
    ///
    /// An already-expired token is inert; there is nothing to revoke.
    pub fn revoke_access(&self, raw_access: &str, now: DateTime<Utc>) -> Result<(), RegistryError> {
        let claims = self
            .signer
            .decode(raw_access)
            .map_err(|_| RegistryError::InvalidToken)?;
        claims
            .expect_kind(TokenKind::Access)
            .map_err(|_| RegistryError::InvalidToken)?;

        if claims.expires_at <= now {
            return Ok(());
        }

        self.store
            .revoke(Fingerprint::of(raw_access), claims.expires_at)?;
        Ok(())
    }

    /// Drop the principal's session entry; the next refresh attempt fails.
    pub fn revoke_session(&self, principal: PrincipalId) -> Result<(), RegistryError> {
        self.store.remove_session(principal)?;
        Ok(())
    }

    /// The token-validity rule: a token is valid iff (a) its signature
    /// verifies, (b) it is unexpired, (c) its fingerprint is not in the
    /// revocation set, and (d) it was not issued before the principal's last
    /// password change. (d) makes password rotation an implicit mass
    /// revocation without enumerating outstanding tokens.
    pub fn check_access(
        &self,
        raw_access: &str,
        password_changed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<JwtClaims, RegistryError> {
        let claims = self
            .signer
            .decode(raw_access)
            .map_err(|_| RegistryError::InvalidToken)?;
        claims
            .expect_kind(TokenKind::Access)
            .map_err(|_| RegistryError::InvalidToken)?;
        validate_claims(&claims, now).map_err(|e| match e {
            TokenValidationError::Expired => RegistryError::Expired,
            _ => RegistryError::InvalidToken,
        })?;

        if self.store.is_revoked(&Fingerprint::of(raw_access), now)? {
            return Err(RegistryError::Revoked);
        }

        if claims.issued_at < password_changed_at {
            return Err(RegistryError::PasswordChanged);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemorySessionStore;
    use chrono::Duration;
    use proptest::prelude::*;
    use std::sync::Arc;

    const EPOCH_OK: DateTime<Utc> = DateTime::UNIX_EPOCH;

    fn registry() -> SessionRegistry<InMemorySessionStore> {
        SessionRegistry::new(TokenConfig::new("test-secret"), InMemorySessionStore::new())
    }

    #[test]
    fn issued_access_token_passes_the_validity_rule() {
        let reg = registry();
        let principal = PrincipalId::new();
        let now = Utc::now();

        let pair = reg.issue_session(principal, Role::Student, now).unwrap();
        let claims = reg.check_access(&pair.access_token, EPOCH_OK, now).unwrap();
        assert_eq!(claims.sub, principal);
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn refresh_token_cannot_authenticate_requests() {
        let reg = registry();
        let now = Utc::now();
        let pair = reg
            .issue_session(PrincipalId::new(), Role::Student, now)
            .unwrap();

        assert_eq!(
            reg.check_access(&pair.refresh_token, EPOCH_OK, now),
            Err(RegistryError::InvalidToken)
        );
    }

    #[test]
    fn access_token_cannot_mint_new_pairs() {
        let reg = registry();
        let now = Utc::now();
        let pair = reg
            .issue_session(PrincipalId::new(), Role::Student, now)
            .unwrap();

        assert_eq!(
            reg.refresh(&pair.access_token, now).unwrap_err(),
            RegistryError::InvalidRefreshToken
        );
    }

    #[test]
    fn expired_access_token_is_rejected() {
        let reg = registry();
        let now = Utc::now();
        let pair = reg
            .issue_session(PrincipalId::new(), Role::Student, now)
            .unwrap();

        let later = now + Duration::hours(25);
        assert_eq!(
            reg.check_access(&pair.access_token, EPOCH_OK, later),
            Err(RegistryError::Expired)
        );
    }

    #[test]
    fn revoked_access_token_is_rejected_until_expiry() {
        let reg = registry();
        let now = Utc::now();
        let pair = reg
            .issue_session(PrincipalId::new(), Role::Student, now)
            .unwrap();

        reg.revoke_access(&pair.access_token, now).unwrap();
        assert_eq!(
            reg.check_access(&pair.access_token, EPOCH_OK, now),
            Err(RegistryError::Revoked)
        );
    }

    #[test]
    fn password_rotation_invalidates_earlier_tokens() {
        let reg = registry();
        let now = Utc::now();
        let pair = reg
            .issue_session(PrincipalId::new(), Role::Student, now)
            .unwrap();

        let changed_at = now + Duration::seconds(1);
        assert_eq!(
            reg.check_access(&pair.access_token, changed_at, now + Duration::seconds(2)),
            Err(RegistryError::PasswordChanged)
        );
    }

    #[test]
    fn token_issued_at_rotation_instant_survives() {
        let reg = registry();
        let now = Utc::now();
        let pair = reg
            .issue_session(PrincipalId::new(), Role::Student, now)
            .unwrap();

        // "not earlier than" is inclusive.
        assert!(reg.check_access(&pair.access_token, now, now).is_ok());
    }

    #[test]
    fn rotation_supersedes_the_previous_refresh_token() {
        let reg = registry();
        let principal = PrincipalId::new();
        let now = Utc::now();

        let first = reg.issue_session(principal, Role::Guru, now).unwrap();
        let (refreshed_principal, second) = reg.refresh(&first.refresh_token, now).unwrap();
        assert_eq!(refreshed_principal, principal);

        // The rotated-away token is dead.
        assert_eq!(
            reg.refresh(&first.refresh_token, now).unwrap_err(),
            RegistryError::InvalidRefreshToken
        );
        // The replacement still works.
        assert!(reg.refresh(&second.refresh_token, now).is_ok());
    }

    #[test]
    fn fresh_login_supersedes_the_old_session() {
        let reg = registry();
        let principal = PrincipalId::new();
        let now = Utc::now();

        let first = reg.issue_session(principal, Role::Student, now).unwrap();
        let _second = reg.issue_session(principal, Role::Student, now).unwrap();

        assert_eq!(
            reg.refresh(&first.refresh_token, now).unwrap_err(),
            RegistryError::InvalidRefreshToken
        );
    }

    #[test]
    fn logout_forces_the_next_refresh_to_fail() {
        let reg = registry();
        let principal = PrincipalId::new();
        let now = Utc::now();

        let pair = reg.issue_session(principal, Role::Student, now).unwrap();
        reg.revoke_session(principal).unwrap();

        assert_eq!(
            reg.refresh(&pair.refresh_token, now).unwrap_err(),
            RegistryError::InvalidRefreshToken
        );
    }

    #[test]
    fn concurrent_refresh_with_the_same_token_has_exactly_one_winner() {
        let reg = Arc::new(SessionRegistry::new(
            TokenConfig::new("race-secret"),
            InMemorySessionStore::new(),
        ));
        let principal = PrincipalId::new();
        let now = Utc::now();
        let pair = reg.issue_session(principal, Role::Guru, now).unwrap();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let reg = Arc::clone(&reg);
            let token = pair.refresh_token.clone();
            handles.push(std::thread::spawn(move || reg.refresh(&token, now)));
        }

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        let losses = outcomes
            .iter()
            .filter(|r| matches!(r, Err(RegistryError::InvalidRefreshToken)))
            .count();

        assert_eq!(wins, 1, "exactly one rotation must win");
        assert_eq!(losses, 1, "the loser must see InvalidRefreshToken");
    }

    proptest! {
        /// Rotating the password at any instant after issuance kills every
        /// access token issued before that instant, with no enumeration.
        #[test]
        fn any_later_password_change_invalidates_earlier_tokens(delta_secs in 1i64..86_400) {
            let reg = registry();
            let now = Utc::now();
            let pair = reg
                .issue_session(PrincipalId::new(), Role::Student, now)
                .unwrap();

            let changed_at = now + Duration::seconds(delta_secs);
            let check_at = changed_at + Duration::seconds(1);
            // Stay inside the token's natural lifetime so the failure is
            // attributable to the rotation alone.
            prop_assume!(check_at < now + Duration::hours(24));

            prop_assert_eq!(
                reg.check_access(&pair.access_token, changed_at, check_at),
                Err(RegistryError::PasswordChanged)
            );
        }
    }
}
