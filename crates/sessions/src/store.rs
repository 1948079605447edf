//! Session store abstraction and the in-process implementation.
//!
//! Per-principal refresh state and the revocation set are the only mutable
//! structures in the authority. Both demand per-key atomic updates: two
//! concurrent refreshes racing on the same stale fingerprint must see exactly
//! one winner. Losing this data is tolerable (it forces a re-login); losing
//! the atomicity is not.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use thiserror::Error;

use gurukul_core::PrincipalId;

use crate::tokens::Fingerprint;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    /// The stored fingerprint did not match the expected one; the caller
    /// lost a rotation race or presented a superseded token.
    #[error("refresh fingerprint mismatch")]
    FingerprintMismatch,

    /// No session entry exists for the principal.
    #[error("no session for principal")]
    NoSession,

    /// The store's lock was poisoned by a panicking writer.
    #[error("session store unavailable")]
    Unavailable,
}

/// One live session per principal: the current refresh-token fingerprint and
/// its validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub principal_id: PrincipalId,
    pub refresh_fingerprint: Fingerprint,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Backing store for session and revocation state.
///
/// Implementations must make `swap_refresh` atomic per principal
/// (compare-and-swap or row-level locking); everything else follows from
/// that. An external cache or database can implement this without the
/// registry or guard changing.
pub trait SessionStore: Send + Sync {
    /// Unconditionally install a fresh session entry, superseding any prior
    /// one (login-time rotation).
    fn install_refresh(&self, entry: SessionEntry) -> Result<(), SessionStoreError>;

    /// Replace the entry for `principal` only if the stored fingerprint is
    /// exactly `expected`. This is the rotation CAS.
    fn swap_refresh(
        &self,
        principal: PrincipalId,
        expected: &Fingerprint,
        replacement: SessionEntry,
    ) -> Result<(), SessionStoreError>;

    fn current_refresh(&self, principal: PrincipalId)
        -> Result<Option<SessionEntry>, SessionStoreError>;

    /// Drop the session entry; the next refresh attempt fails.
    fn remove_session(&self, principal: PrincipalId) -> Result<(), SessionStoreError>;

    /// Add an access-token fingerprint to the revocation set until
    /// `expires_at`, the token's natural expiry; after that the entry is
    /// dead weight and may be pruned.
    fn revoke(&self, fingerprint: Fingerprint, expires_at: DateTime<Utc>)
        -> Result<(), SessionStoreError>;

    fn is_revoked(&self, fingerprint: &Fingerprint, now: DateTime<Utc>)
        -> Result<bool, SessionStoreError>;
}

impl<S> SessionStore for Arc<S>
where
    S: SessionStore + ?Sized,
{
    fn install_refresh(&self, entry: SessionEntry) -> Result<(), SessionStoreError> {
        (**self).install_refresh(entry)
    }

    fn swap_refresh(
        &self,
        principal: PrincipalId,
        expected: &Fingerprint,
        replacement: SessionEntry,
    ) -> Result<(), SessionStoreError> {
        (**self).swap_refresh(principal, expected, replacement)
    }

    fn current_refresh(
        &self,
        principal: PrincipalId,
    ) -> Result<Option<SessionEntry>, SessionStoreError> {
        (**self).current_refresh(principal)
    }

    fn remove_session(&self, principal: PrincipalId) -> Result<(), SessionStoreError> {
        (**self).remove_session(principal)
    }

    fn revoke(
        &self,
        fingerprint: Fingerprint,
        expires_at: DateTime<Utc>,
    ) -> Result<(), SessionStoreError> {
        (**self).revoke(fingerprint, expires_at)
    }

    fn is_revoked(
        &self,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<bool, SessionStoreError> {
        (**self).is_revoked(fingerprint, now)
    }
}

/// In-process session store.
///
/// One mutex per map; the session CAS holds the lock across read-and-replace,
/// which is what makes concurrent rotation single-winner.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<PrincipalId, SessionEntry>>,
    revoked: Mutex<HashMap<Fingerprint, DateTime<Utc>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries whose token has expired anyway carry no information; drop
    /// them so the set never grows without bound under sustained load.
    fn prune_revoked(revoked: &mut HashMap<Fingerprint, DateTime<Utc>>, now: DateTime<Utc>) {
        revoked.retain(|_, expires_at| *expires_at > now);
    }
}

impl SessionStore for InMemorySessionStore {
    fn install_refresh(&self, entry: SessionEntry) -> Result<(), SessionStoreError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| SessionStoreError::Unavailable)?;
        sessions.insert(entry.principal_id, entry);
        Ok(())
    }

    fn swap_refresh(
        &self,
        principal: PrincipalId,
        expected: &Fingerprint,
        replacement: SessionEntry,
    ) -> Result<(), SessionStoreError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| SessionStoreError::Unavailable)?;

        let current = sessions.get(&principal).ok_or(SessionStoreError::NoSession)?;
        if &current.refresh_fingerprint != expected {
            return Err(SessionStoreError::FingerprintMismatch);
        }

        sessions.insert(principal, replacement);
        Ok(())
    }

    fn current_refresh(
        &self,
        principal: PrincipalId,
    ) -> Result<Option<SessionEntry>, SessionStoreError> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| SessionStoreError::Unavailable)?;
        Ok(sessions.get(&principal).cloned())
    }

    fn remove_session(&self, principal: PrincipalId) -> Result<(), SessionStoreError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| SessionStoreError::Unavailable)?;
        sessions.remove(&principal);
        Ok(())
    }

    fn revoke(
        &self,
        fingerprint: Fingerprint,
        expires_at: DateTime<Utc>,
    ) -> Result<(), SessionStoreError> {
        let mut revoked = self
            .revoked
            .lock()
            .map_err(|_| SessionStoreError::Unavailable)?;
        Self::prune_revoked(&mut revoked, Utc::now());
        revoked.insert(fingerprint, expires_at);
        Ok(())
    }

    fn is_revoked(
        &self,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<bool, SessionStoreError> {
        let revoked = self
            .revoked
            .lock()
            .map_err(|_| SessionStoreError::Unavailable)?;
        Ok(revoked
            .get(fingerprint)
            .map(|expires_at| *expires_at > now)
            .unwrap_or(false))
    }
}
