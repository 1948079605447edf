//! Governance operations: the admin-only surface over the lifecycle.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use gurukul_core::PrincipalId;
use gurukul_identity::{
    ActivateGuru, AddAdminNote, ApproveApplication, BanPrincipal, BeginReview, LiftBan,
    Principal, PrincipalCommand, RejectApplication, SuspendGuru,
};
use gurukul_infra::{
    CommandPipeline, CourseCatalog, NotificationDispatcher, NotificationTemplate, PipelineError,
    PrincipalDirectory,
};

use crate::stats::GovernanceStats;

/// Reversible status change on an approved guru.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum StatusChange {
    Suspend { reason: String },
    Activate,
}

/// Admin workflow service. Generic over the directory, dispatcher, and
/// catalog seams so tests can inject in-process doubles.
pub struct GovernanceService<D, N, C> {
    pipeline: CommandPipeline<D>,
    directory: D,
    notifier: N,
    catalog: C,
}

impl<D, N, C> GovernanceService<D, N, C>
where
    D: PrincipalDirectory + Clone,
    N: NotificationDispatcher,
    C: CourseCatalog,
{
    pub fn new(directory: D, notifier: N, catalog: C) -> Self {
        Self {
            pipeline: CommandPipeline::new(directory.clone()),
            directory,
            notifier,
            catalog,
        }
    }

    /// Applications awaiting a decision, oldest first.
    pub fn list_pending(&self) -> Result<Vec<Principal>, PipelineError> {
        Ok(self.directory.list_pending()?)
    }

    pub fn begin_review(
        &self,
        id: PrincipalId,
        admin: PrincipalId,
        now: DateTime<Utc>,
    ) -> Result<Principal, PipelineError> {
        let (principal, _) = self.pipeline.execute(
            id,
            PrincipalCommand::BeginReview(BeginReview {
                reviewer: admin,
                occurred_at: now,
            }),
        )?;
        Ok(principal)
    }

    pub fn approve(
        &self,
        id: PrincipalId,
        admin: PrincipalId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Principal, PipelineError> {
        let (principal, _) = self.pipeline.execute(
            id,
            PrincipalCommand::Approve(ApproveApplication {
                reviewer: admin,
                notes: notes.clone(),
                occurred_at: now,
            }),
        )?;

        self.notify(
            &principal,
            NotificationTemplate::ApplicationApproved,
            json!({ "notes": notes }),
        );
        Ok(principal)
    }

    pub fn reject(
        &self,
        id: PrincipalId,
        admin: PrincipalId,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<Principal, PipelineError> {
        let (principal, _) = self.pipeline.execute(
            id,
            PrincipalCommand::Reject(RejectApplication {
                reviewer: admin,
                reason: reason.clone(),
                occurred_at: now,
            }),
        )?;

        self.notify(
            &principal,
            NotificationTemplate::ApplicationRejected,
            json!({ "reason": reason }),
        );
        Ok(principal)
    }

    pub fn set_status(
        &self,
        id: PrincipalId,
        admin: PrincipalId,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Principal, PipelineError> {
        match change {
            StatusChange::Suspend { reason } => {
                let (principal, _) = self.pipeline.execute(
                    id,
                    PrincipalCommand::Suspend(SuspendGuru {
                        actor: admin,
                        reason: reason.clone(),
                        occurred_at: now,
                    }),
                )?;
                self.notify(
                    &principal,
                    NotificationTemplate::GuruSuspended,
                    json!({ "reason": reason }),
                );
                Ok(principal)
            }
            StatusChange::Activate => {
                let (principal, _) = self.pipeline.execute(
                    id,
                    PrincipalCommand::Activate(ActivateGuru {
                        actor: admin,
                        occurred_at: now,
                    }),
                )?;
                self.notify(&principal, NotificationTemplate::GuruActivated, json!({}));
                Ok(principal)
            }
        }
    }

    pub fn add_note(
        &self,
        id: PrincipalId,
        admin: PrincipalId,
        note: String,
        now: DateTime<Utc>,
    ) -> Result<Principal, PipelineError> {
        let (principal, _) = self.pipeline.execute(
            id,
            PrincipalCommand::AddNote(AddAdminNote {
                author: admin,
                note,
                occurred_at: now,
            }),
        )?;
        Ok(principal)
    }

    pub fn ban(
        &self,
        id: PrincipalId,
        admin: PrincipalId,
        reason: String,
        ends_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Principal, PipelineError> {
        let (principal, _) = self.pipeline.execute(
            id,
            PrincipalCommand::Ban(BanPrincipal {
                actor: admin,
                reason,
                ends_at,
                occurred_at: now,
            }),
        )?;
        Ok(principal)
    }

    pub fn lift_ban(
        &self,
        id: PrincipalId,
        admin: PrincipalId,
        now: DateTime<Utc>,
    ) -> Result<Principal, PipelineError> {
        let (principal, _) = self.pipeline.execute(
            id,
            PrincipalCommand::LiftBan(LiftBan {
                actor: admin,
                occurred_at: now,
            }),
        )?;
        Ok(principal)
    }

    /// Dashboard statistics, recomputed from current state.
    pub fn stats(&self) -> Result<GovernanceStats, PipelineError> {
        let gurus = self.directory.list_gurus()?;
        Ok(GovernanceStats::compute(&gurus, self.catalog.course_count()))
    }

    /// Fire-and-forget: a delivery failure is logged and never becomes a
    /// transition error.
    fn notify(
        &self,
        principal: &Principal,
        template: NotificationTemplate,
        context: serde_json::Value,
    ) {
        if let Err(e) = self.notifier.send(&principal.email, template, &context) {
            tracing::warn!(
                principal = %principal.id,
                template = template.as_str(),
                error = %e,
                "notification delivery failed; transition already committed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gurukul_identity::{
        ApplicationStatus, EducationCredential, GuruProfile, RegisterPrincipal, Role,
        SubmitApplication, VerificationLevel,
    };
    use gurukul_infra::{
        InMemoryPrincipalDirectory, RecordingNotificationDispatcher, StaticCourseCatalog,
    };
    use std::sync::Arc;

    type TestService = GovernanceService<
        Arc<InMemoryPrincipalDirectory>,
        Arc<RecordingNotificationDispatcher>,
        StaticCourseCatalog,
    >;

    fn service() -> (TestService, Arc<RecordingNotificationDispatcher>) {
        let directory = Arc::new(InMemoryPrincipalDirectory::new());
        let notifier = Arc::new(RecordingNotificationDispatcher::new());
        let svc = GovernanceService::new(
            directory,
            Arc::clone(&notifier),
            StaticCourseCatalog::new(7),
        );
        (svc, notifier)
    }

    fn submitted_applicant(svc: &TestService) -> PrincipalId {
        let id = PrincipalId::new();
        let pipeline = CommandPipeline::new(Arc::clone(&svc.directory));
        pipeline
            .register(RegisterPrincipal {
                principal_id: id,
                email: format!("{id}@example.com"),
                username: id.to_string(),
                display_name: "Applicant".to_string(),
                role: Role::Guru,
                password_hash: "$argon2id$fake".to_string(),
                guru_profile: Some(GuruProfile {
                    education: vec![EducationCredential {
                        degree: "BEd".to_string(),
                        institution: "College".to_string(),
                        year: Some(2019),
                    }],
                    experience_years: Some(2),
                    subjects: vec!["literature".to_string()],
                    verification_level: VerificationLevel::Unverified,
                }),
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
    fn approve_notifies_the_applicant() {
        let (svc, notifier) = service();
        let id = submitted_applicant(&svc);
        let admin = PrincipalId::new();

        let principal = svc
            .approve(id, admin, Some("strong profile".to_string()), Utc::now())
            .unwrap();

        assert_eq!(
            principal.application.as_ref().unwrap().status,
            ApplicationStatus::Approved
        );
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].template, NotificationTemplate::ApplicationApproved);
        assert_eq!(sent[0].recipient_email, principal.email);
    }

    #[test]
    fn notification_failure_does_not_roll_back_the_transition() {
        let (svc, notifier) = service();
        let id = submitted_applicant(&svc);
        notifier.fail_next();

        let principal = svc.approve(id, PrincipalId::new(), None, Utc::now()).unwrap();
        assert_eq!(
            principal.application.as_ref().unwrap().status,
            ApplicationStatus::Approved
        );
        // The failed send was not recorded, and nothing was retried.
        assert!(notifier.sent().is_empty());

        // The persisted record agrees.
        let persisted = svc.directory.load(id).unwrap();
        assert!(persisted.application.as_ref().unwrap().account.is_approved);
    }

    #[test]
    fn reject_requires_its_reason_through_the_whole_stack() {
        let (svc, notifier) = service();
        let id = submitted_applicant(&svc);

        let result = svc.reject(id, PrincipalId::new(), "".to_string(), Utc::now());
        assert!(matches!(result, Err(PipelineError::Validation(_))));
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn suspend_then_activate_round_trip() {
        let (svc, notifier) = service();
        let id = submitted_applicant(&svc);
        let admin = PrincipalId::new();

        svc.approve(id, admin, None, Utc::now()).unwrap();
        let suspended = svc
            .set_status(
                id,
                admin,
                StatusChange::Suspend {
                    reason: "policy violation".to_string(),
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(
            suspended.application.as_ref().unwrap().status,
            ApplicationStatus::Suspended
        );

        let restored = svc
            .set_status(id, admin, StatusChange::Activate, Utc::now())
            .unwrap();
        assert_eq!(
            restored.application.as_ref().unwrap().status,
            ApplicationStatus::Approved
        );
        assert!(restored.is_active);

        let templates: Vec<_> = notifier.sent().iter().map(|n| n.template).collect();
        assert_eq!(
            templates,
            vec![
                NotificationTemplate::ApplicationApproved,
                NotificationTemplate::GuruSuspended,
                NotificationTemplate::GuruActivated,
            ]
        );
    }

    #[test]
    fn notes_accumulate_in_order() {
        let (svc, _) = service();
        let id = submitted_applicant(&svc);
        let admin = PrincipalId::new();

        svc.add_note(id, admin, "called references".to_string(), Utc::now())
            .unwrap();
        let principal = svc
            .add_note(id, admin, "verified degree".to_string(), Utc::now())
            .unwrap();

        let notes = &principal.application.as_ref().unwrap().admin_notes;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1].note, "verified degree");
    }

    #[test]
    fn stats_reflect_current_state_only() {
        let (svc, _) = service();
        let admin = PrincipalId::new();

        let a = submitted_applicant(&svc);
        let b = submitted_applicant(&svc);
        let c = submitted_applicant(&svc);

        svc.approve(a, admin, None, Utc::now()).unwrap();
        svc.reject(b, admin, "incomplete".to_string(), Utc::now())
            .unwrap();

        let stats = svc.stats().unwrap();
        assert_eq!(stats.total_gurus, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.course_count, 7);
        assert!((stats.approval_rate - 0.5).abs() < f64::EPSILON);

        // A later decision shifts the recomputed view; nothing is cached.
        svc.approve(c, admin, None, Utc::now()).unwrap();
        let stats = svc.stats().unwrap();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.approved, 2);
    }

    #[test]
    fn pending_queue_lists_only_undecided_applications() {
        let (svc, _) = service();
        let admin = PrincipalId::new();

        let a = submitted_applicant(&svc);
        let b = submitted_applicant(&svc);
        svc.approve(a, admin, None, Utc::now()).unwrap();
        svc.begin_review(b, admin, Utc::now()).unwrap();

        let pending = svc.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b);
        assert_eq!(
            pending[0].application.as_ref().unwrap().status,
            ApplicationStatus::UnderReview
        );
    }
}
