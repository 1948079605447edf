//! Principal directory: the authoritative store for principal records.
//!
//! One record per principal (identity + credentials + application together).
//! Writes go through a per-record compare-and-swap on the aggregate version;
//! two concurrent governance actions on the same record produce exactly one
//! committed write, the other fails stale.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use gurukul_core::{ExpectedVersion, PrincipalId};
use gurukul_identity::{ApplicationStatus, Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Email (case-insensitive) or username already registered.
    #[error("duplicate identity: {0}")]
    Duplicate(String),

    /// The record's persisted version did not match the expectation; the
    /// caller lost an optimistic-concurrency race.
    #[error("stale write: {0}")]
    Stale(String),

    #[error("principal not found")]
    NotFound,

    /// The store's lock was poisoned by a panicking writer.
    #[error("directory unavailable")]
    Unavailable,
}

/// Authoritative store for principal records.
///
/// `update` must be atomic per record (compare-and-swap or row-level locking
/// in a real backend); the lifecycle state machine's commit-time precondition
/// check rides on it.
pub trait PrincipalDirectory: Send + Sync {
    /// Insert a new record, enforcing unique email (case-insensitive) and
    /// unique username.
    fn insert(&self, principal: &Principal) -> Result<(), DirectoryError>;

    fn load(&self, id: PrincipalId) -> Result<Principal, DirectoryError>;

    /// Replace the record only if its stored version matches `expected`.
    fn update(&self, expected: ExpectedVersion, principal: &Principal)
        -> Result<(), DirectoryError>;

    fn find_by_email(&self, email: &str) -> Result<Option<Principal>, DirectoryError>;

    fn find_by_username(&self, username: &str) -> Result<Option<Principal>, DirectoryError>;

    /// Login identifier: email if it looks like one, username otherwise.
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<Principal>, DirectoryError> {
        if identifier.contains('@') {
            self.find_by_email(identifier)
        } else {
            self.find_by_username(identifier)
        }
    }

    /// Locate the principal holding a pending reset-token digest.
    fn find_by_reset_digest(&self, digest: &str) -> Result<Option<Principal>, DirectoryError>;

    /// Locate the principal holding a pending verification-token digest.
    fn find_by_verification_digest(&self, digest: &str)
        -> Result<Option<Principal>, DirectoryError>;

    fn list_gurus(&self) -> Result<Vec<Principal>, DirectoryError>;

    /// Gurus awaiting a decision, oldest submission first.
    fn list_pending(&self) -> Result<Vec<Principal>, DirectoryError> {
        let mut pending: Vec<Principal> = self
            .list_gurus()?
            .into_iter()
            .filter(|p| {
                p.application
                    .as_ref()
                    .map(|app| {
                        matches!(
                            app.status,
                            ApplicationStatus::Submitted | ApplicationStatus::UnderReview
                        )
                    })
                    .unwrap_or(false)
            })
            .collect();
        pending.sort_by_key(|p| p.application.as_ref().and_then(|app| app.submitted_at));
        Ok(pending)
    }
}

impl<D> PrincipalDirectory for Arc<D>
where
    D: PrincipalDirectory + ?Sized,
{
    fn insert(&self, principal: &Principal) -> Result<(), DirectoryError> {
        (**self).insert(principal)
    }

    fn load(&self, id: PrincipalId) -> Result<Principal, DirectoryError> {
        (**self).load(id)
    }

    fn update(
        &self,
        expected: ExpectedVersion,
        principal: &Principal,
    ) -> Result<(), DirectoryError> {
        (**self).update(expected, principal)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<Principal>, DirectoryError> {
        (**self).find_by_email(email)
    }

    fn find_by_username(&self, username: &str) -> Result<Option<Principal>, DirectoryError> {
        (**self).find_by_username(username)
    }

    fn find_by_reset_digest(&self, digest: &str) -> Result<Option<Principal>, DirectoryError> {
        (**self).find_by_reset_digest(digest)
    }

    fn find_by_verification_digest(
        &self,
        digest: &str,
    ) -> Result<Option<Principal>, DirectoryError> {
        (**self).find_by_verification_digest(digest)
    }

    fn list_gurus(&self) -> Result<Vec<Principal>, DirectoryError> {
        (**self).list_gurus()
    }
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<PrincipalId, Principal>,
    email_index: HashMap<String, PrincipalId>,
    username_index: HashMap<String, PrincipalId>,
}

/// In-memory directory. Single lock over records plus uniqueness indexes so
/// insert-uniqueness and update-CAS are each one atomic step.
#[derive(Debug, Default)]
pub struct InMemoryPrincipalDirectory {
    inner: RwLock<Inner>,
}

impl InMemoryPrincipalDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrincipalDirectory for InMemoryPrincipalDirectory {
    fn insert(&self, principal: &Principal) -> Result<(), DirectoryError> {
        let mut inner = self.inner.write().map_err(|_| DirectoryError::Unavailable)?;

        let email_key = principal.email.to_lowercase();
        if inner.email_index.contains_key(&email_key) {
            return Err(DirectoryError::Duplicate(format!(
                "email '{}' is already registered",
                principal.email
            )));
        }
        if inner.username_index.contains_key(&principal.username) {
            return Err(DirectoryError::Duplicate(format!(
                "username '{}' is already taken",
                principal.username
            )));
        }

        inner.email_index.insert(email_key, principal.id);
        inner
            .username_index
            .insert(principal.username.clone(), principal.id);
        inner.records.insert(principal.id, principal.clone());
        Ok(())
    }

    fn load(&self, id: PrincipalId) -> Result<Principal, DirectoryError> {
        let inner = self.inner.read().map_err(|_| DirectoryError::Unavailable)?;
        inner.records.get(&id).cloned().ok_or(DirectoryError::NotFound)
    }

    fn update(
        &self,
        expected: ExpectedVersion,
        principal: &Principal,
    ) -> Result<(), DirectoryError> {
        let mut inner = self.inner.write().map_err(|_| DirectoryError::Unavailable)?;

        let stored = inner
            .records
            .get(&principal.id)
            .ok_or(DirectoryError::NotFound)?;

        if !expected.matches(stored.version) {
            return Err(DirectoryError::Stale(format!(
                "expected {expected:?}, found {}",
                stored.version
            )));
        }

        inner.records.insert(principal.id, principal.clone());
        Ok(())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<Principal>, DirectoryError> {
        let inner = self.inner.read().map_err(|_| DirectoryError::Unavailable)?;
        Ok(inner
            .email_index
            .get(&email.to_lowercase())
            .and_then(|id| inner.records.get(id))
            .cloned())
    }

    fn find_by_username(&self, username: &str) -> Result<Option<Principal>, DirectoryError> {
        let inner = self.inner.read().map_err(|_| DirectoryError::Unavailable)?;
        Ok(inner
            .username_index
            .get(username)
            .and_then(|id| inner.records.get(id))
            .cloned())
    }

    fn find_by_reset_digest(&self, digest: &str) -> Result<Option<Principal>, DirectoryError> {
        let inner = self.inner.read().map_err(|_| DirectoryError::Unavailable)?;
        Ok(inner
            .records
            .values()
            .find(|p| {
                p.credentials
                    .reset_token
                    .as_ref()
                    .map(|t| t.digest == digest)
                    .unwrap_or(false)
            })
            .cloned())
    }

    fn find_by_verification_digest(
        &self,
        digest: &str,
    ) -> Result<Option<Principal>, DirectoryError> {
        let inner = self.inner.read().map_err(|_| DirectoryError::Unavailable)?;
        Ok(inner
            .records
            .values()
            .find(|p| {
                p.credentials
                    .verification_token
                    .as_ref()
                    .map(|t| t.digest == digest)
                    .unwrap_or(false)
            })
            .cloned())
    }

    fn list_gurus(&self) -> Result<Vec<Principal>, DirectoryError> {
        let inner = self.inner.read().map_err(|_| DirectoryError::Unavailable)?;
        Ok(inner
            .records
            .values()
            .filter(|p| p.role == Role::Guru)
            .cloned()
            .collect())
    }
}
