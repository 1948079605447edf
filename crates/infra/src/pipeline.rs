//! Command execution pipeline for principal records.
//!
//! Orchestrates the load → decide → evolve → commit cycle against the
//! directory. The commit is a compare-and-swap on the version observed at
//! load time, so a transition whose precondition no longer holds at write
//! time fails with `StaleState` instead of silently clobbering a concurrent
//! decision. No IO here beyond the injected directory.

use thiserror::Error;

use gurukul_core::{Aggregate, DomainError, ExpectedVersion, PrincipalId};
use gurukul_identity::{Principal, PrincipalCommand, PrincipalEvent, RegisterPrincipal};

use crate::directory::{DirectoryError, PrincipalDirectory};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Lost an optimistic-concurrency race; re-fetch and retry.
    #[error("stale state: {0}")]
    StaleState(String),

    #[error("duplicate identity: {0}")]
    DuplicateIdentity(String),

    #[error("invalid token")]
    InvalidToken,

    #[error("expired token")]
    ExpiredToken,

    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    /// Backing-store failure; the only class surfaced as fatal.
    #[error("directory unavailable")]
    StoreUnavailable,
}

impl From<DomainError> for PipelineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => PipelineError::Validation(msg),
            DomainError::InvalidTransition(msg) => PipelineError::InvalidTransition(msg),
            DomainError::StaleState(msg) => PipelineError::StaleState(msg),
            DomainError::DuplicateIdentity(msg) => PipelineError::DuplicateIdentity(msg),
            DomainError::InvalidId(msg) => PipelineError::Validation(msg),
            DomainError::InvalidToken => PipelineError::InvalidToken,
            DomainError::ExpiredToken => PipelineError::ExpiredToken,
            DomainError::NotFound => PipelineError::NotFound,
            DomainError::Unauthorized => PipelineError::Unauthorized,
        }
    }
}

impl From<DirectoryError> for PipelineError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::Duplicate(msg) => PipelineError::DuplicateIdentity(msg),
            DirectoryError::Stale(msg) => PipelineError::StaleState(msg),
            DirectoryError::NotFound => PipelineError::NotFound,
            DirectoryError::Unavailable => PipelineError::StoreUnavailable,
        }
    }
}

/// Reusable command execution engine for principal records.
#[derive(Debug)]
pub struct CommandPipeline<D> {
    directory: D,
}

impl<D> CommandPipeline<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }
}

impl<D: PrincipalDirectory> CommandPipeline<D> {
    /// Create a principal. Uniqueness is enforced by the directory insert;
    /// there is no partially-created state to roll back.
    pub fn register(&self, cmd: RegisterPrincipal) -> Result<Principal, PipelineError> {
        let blank = Principal::empty(cmd.principal_id);
        let events = blank.handle(&PrincipalCommand::Register(cmd))?;

        let mut principal = blank;
        for event in &events {
            principal.apply(event);
        }

        self.directory.insert(&principal)?;
        Ok(principal)
    }

    /// Execute a command against the current record and commit atomically.
    ///
    /// Returns the committed state and the events that produced it.
    pub fn execute(
        &self,
        id: PrincipalId,
        command: PrincipalCommand,
    ) -> Result<(Principal, Vec<PrincipalEvent>), PipelineError> {
        let current = self.directory.load(id)?;
        let observed_version = current.version;

        let events = current.handle(&command)?;

        let mut next = current;
        for event in &events {
            next.apply(event);
        }

        self.directory
            .update(ExpectedVersion::Exact(observed_version), &next)?;

        Ok((next, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryPrincipalDirectory;
    use chrono::Utc;
    use gurukul_identity::{
        ApplicationStatus, ApproveApplication, EducationCredential, GuruProfile,
        RejectApplication, Role, SubmitApplication, VerificationLevel,
    };
    use std::sync::Arc;

    fn complete_profile() -> GuruProfile {
        GuruProfile {
            education: vec![EducationCredential {
                degree: "PhD Chemistry".to_string(),
                institution: "Institute".to_string(),
                year: Some(2012),
            }],
            experience_years: Some(6),
            subjects: vec!["chemistry".to_string()],
            verification_level: VerificationLevel::Unverified,
        }
    }

    fn submitted_guru(pipeline: &CommandPipeline<Arc<InMemoryPrincipalDirectory>>) -> PrincipalId {
        let id = PrincipalId::new();
        pipeline
            .register(RegisterPrincipal {
                principal_id: id,
                email: format!("{id}@example.com"),
                username: id.to_string(),
                display_name: "Applicant".to_string(),
                role: Role::Guru,
                password_hash: "$argon2id$fake".to_string(),
                guru_profile: Some(complete_profile()),
                occurred_at: Utc::now(),
            })
            .unwrap();
        pipeline
            .execute(
                id,
                PrincipalCommand::SubmitApplication(SubmitApplication {
                    occurred_at: Utc::now(),
                }),
            )
            .unwrap();
        id
    }

    #[test]
    fn duplicate_registration_fails_cleanly() {
        let directory = Arc::new(InMemoryPrincipalDirectory::new());
        let pipeline = CommandPipeline::new(directory);

        let register = |id: PrincipalId| RegisterPrincipal {
            principal_id: id,
            email: "same@example.com".to_string(),
            username: format!("user-{id}"),
            display_name: "User".to_string(),
            role: Role::Student,
            password_hash: "$argon2id$fake".to_string(),
            guru_profile: None,
            occurred_at: Utc::now(),
        };

        pipeline.register(register(PrincipalId::new())).unwrap();
        let result = pipeline.register(register(PrincipalId::new()));
        assert!(matches!(result, Err(PipelineError::DuplicateIdentity(_))));
    }

    #[test]
    fn sequential_second_decision_hits_the_transition_guard() {
        let directory = Arc::new(InMemoryPrincipalDirectory::new());
        let pipeline = CommandPipeline::new(Arc::clone(&directory));
        let id = submitted_guru(&pipeline);
        let admin = PrincipalId::new();

        pipeline
            .execute(
                id,
                PrincipalCommand::Approve(ApproveApplication {
                    reviewer: admin,
                    notes: None,
                    occurred_at: Utc::now(),
                }),
            )
            .unwrap();

        let result = pipeline.execute(
            id,
            PrincipalCommand::Reject(RejectApplication {
                reviewer: admin,
                reason: "changed my mind".to_string(),
                occurred_at: Utc::now(),
            }),
        );
        assert!(matches!(result, Err(PipelineError::InvalidTransition(_))));
    }

    #[test]
    fn stale_write_loses_to_the_committed_decision() {
        let directory = Arc::new(InMemoryPrincipalDirectory::new());
        let pipeline = CommandPipeline::new(Arc::clone(&directory));
        let id = submitted_guru(&pipeline);
        let admin = PrincipalId::new();

        // Both admins observe the submitted record at the same version.
        let observed_a = directory.load(id).unwrap();
        let observed_b = directory.load(id).unwrap();
        assert_eq!(observed_a.version, observed_b.version);

        // Admin A approves and commits.
        let events = observed_a
            .handle(&PrincipalCommand::Approve(ApproveApplication {
                reviewer: admin,
                notes: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        let mut committed = observed_a.clone();
        for e in &events {
            committed.apply(e);
        }
        directory
            .update(ExpectedVersion::Exact(observed_a.version), &committed)
            .unwrap();

        // Admin B's reject passed its own precondition check against the
        // stale read, but the commit-time CAS rejects it.
        let events = observed_b
            .handle(&PrincipalCommand::Reject(RejectApplication {
                reviewer: admin,
                reason: "insufficient profile".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        let mut stale = observed_b.clone();
        for e in &events {
            stale.apply(e);
        }
        let result = directory.update(ExpectedVersion::Exact(observed_b.version), &stale);
        assert!(matches!(result, Err(DirectoryError::Stale(_))));

        // The committed decision stands.
        let persisted = directory.load(id).unwrap();
        assert_eq!(
            persisted.application.as_ref().unwrap().status,
            ApplicationStatus::Approved
        );
    }

    #[test]
    fn racing_decisions_produce_exactly_one_winner() {
        let directory = Arc::new(InMemoryPrincipalDirectory::new());
        let pipeline = Arc::new(CommandPipeline::new(Arc::clone(&directory)));
        let id = submitted_guru(&pipeline);

        let approve = {
            let pipeline = Arc::clone(&pipeline);
            std::thread::spawn(move || {
                pipeline.execute(
                    id,
                    PrincipalCommand::Approve(ApproveApplication {
                        reviewer: PrincipalId::new(),
                        notes: None,
                        occurred_at: Utc::now(),
                    }),
                )
            })
        };
        let reject = {
            let pipeline = Arc::clone(&pipeline);
            std::thread::spawn(move || {
                pipeline.execute(
                    id,
                    PrincipalCommand::Reject(RejectApplication {
                        reviewer: PrincipalId::new(),
                        reason: "no".to_string(),
                        occurred_at: Utc::now(),
                    }),
                )
            })
        };

        let outcomes = [approve.join().unwrap(), reject.join().unwrap()];
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "exactly one decision must commit");

        // The loser failed either at the commit CAS or, if it re-read after
        // the winner committed, at the transition guard.
        assert!(outcomes.iter().any(|r| matches!(
            r,
            Err(PipelineError::StaleState(_)) | Err(PipelineError::InvalidTransition(_))
        )));
    }

    #[test]
    fn failed_transition_leaves_no_partial_state() {
        let directory = Arc::new(InMemoryPrincipalDirectory::new());
        let pipeline = CommandPipeline::new(Arc::clone(&directory));
        let id = submitted_guru(&pipeline);

        let before = directory.load(id).unwrap();
        let result = pipeline.execute(
            id,
            PrincipalCommand::Reject(RejectApplication {
                reviewer: PrincipalId::new(),
                reason: "  ".to_string(),
                occurred_at: Utc::now(),
            }),
        );
        assert!(matches!(result, Err(PipelineError::Validation(_))));

        let after = directory.load(id).unwrap();
        assert_eq!(before, after);
    }
}
