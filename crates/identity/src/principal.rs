//! Principal aggregate: identity + credential record + guru application.
//!
//! One record per principal. Students and gurus are the same aggregate
//! distinguished by role and capability set, not by parallel types; the
//! application lifecycle only exists on the guru variant.
//!
//! # Invariants
//! - Email is unique case-insensitively, username exactly (enforced by the
//!   directory at insert; normalized here).
//! - `password_changed_at` only moves forward; tokens issued before it are
//!   dead (the session registry consults it).
//! - Lifecycle transitions check the record's current status; the directory's
//!   compare-and-swap makes that check hold at commit time.
//! - `admin_notes` is append-only; a rejected application stays rejected.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use gurukul_core::{Aggregate, AggregateRoot, DomainError, PrincipalId};

use crate::application::{
    ApplicationRecord, ApplicationStatus, AdminNote, GuruProfile, Suspension, VerificationLevel,
};
use crate::roles::Role;
use crate::vault::{TokenDigest, LOCKOUT_MINUTES, MAX_FAILED_LOGINS};

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// An active or scheduled ban on a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanWindow {
    pub reason: String,
    pub starts_at: DateTime<Utc>,
    /// `None` means indefinite.
    pub ends_at: Option<DateTime<Utc>>,
}

impl BanWindow {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now >= self.starts_at && self.ends_at.map(|end| now < end).unwrap_or(true)
    }
}

/// Credential state owned exclusively by its principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Argon2id PHC string. The raw password never reaches this struct.
    pub password_hash: String,
    /// Tokens issued before this instant are invalid (implicit mass
    /// revocation on rotation).
    pub password_changed_at: DateTime<Utc>,
    pub failed_logins: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub reset_token: Option<TokenDigest>,
    pub verification_token: Option<TokenDigest>,
}

impl Default for CredentialRecord {
    fn default() -> Self {
        Self {
            password_hash: String::new(),
            password_changed_at: DateTime::UNIX_EPOCH,
            failed_logins: 0,
            locked_until: None,
            reset_token: None,
            verification_token: None,
        }
    }
}

impl CredentialRecord {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.map(|until| now < until).unwrap_or(false)
    }
}

/// The principal aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub is_active: bool,
    pub email_verified: bool,
    pub ban: Option<BanWindow>,
    pub credentials: CredentialRecord,
    /// Present iff `role == Guru`.
    pub application: Option<ApplicationRecord>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
    pub created: bool,
}

impl Default for Principal {
    fn default() -> Self {
        Self {
            id: PrincipalId::new(),
            email: String::new(),
            username: String::new(),
            display_name: String::new(),
            role: Role::Student,
            is_active: false,
            email_verified: false,
            ban: None,
            credentials: CredentialRecord::default(),
            application: None,
            created_at: DateTime::UNIX_EPOCH,
            version: 0,
            created: false,
        }
    }
}

impl Principal {
    pub fn empty(id: PrincipalId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if self.created {
            Ok(())
        } else {
            Err(DomainError::NotFound)
        }
    }

    fn application(&self) -> Result<&ApplicationRecord, DomainError> {
        self.application
            .as_ref()
            .ok_or_else(|| DomainError::invalid_transition("principal has no guru application"))
    }
}

impl AggregateRoot for Principal {
    type Id = PrincipalId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Command to create a principal. The password is already hashed; hashing is
/// the vault's job and happens off the aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPrincipal {
    pub principal_id: PrincipalId,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub password_hash: String,
    /// Seed profile for guru applicants; ignored for other roles.
    pub guru_profile: Option<GuruProfile>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyEmail {
    pub presented_digest: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordLoginFailure {
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordLoginSuccess {
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotatePassword {
    pub new_password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueResetToken {
    pub stored: TokenDigest,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueVerificationToken {
    pub stored: TokenDigest,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPassword {
    pub presented_digest: String,
    pub new_password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitApplication {
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeginReview {
    pub reviewer: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveApplication {
    pub reviewer: PrincipalId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectApplication {
    pub reviewer: PrincipalId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendGuru {
    pub actor: PrincipalId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateGuru {
    pub actor: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddAdminNote {
    pub author: PrincipalId,
    pub note: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanPrincipal {
    pub actor: PrincipalId,
    pub reason: String,
    pub ends_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiftBan {
    pub actor: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

/// All principal commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PrincipalCommand {
    Register(RegisterPrincipal),
    VerifyEmail(VerifyEmail),
    RecordLoginFailure(RecordLoginFailure),
    RecordLoginSuccess(RecordLoginSuccess),
    RotatePassword(RotatePassword),
    IssueResetToken(IssueResetToken),
    IssueVerificationToken(IssueVerificationToken),
    ResetPassword(ResetPassword),
    SubmitApplication(SubmitApplication),
    BeginReview(BeginReview),
    Approve(ApproveApplication),
    Reject(RejectApplication),
    Suspend(SuspendGuru),
    Activate(ActivateGuru),
    AddNote(AddAdminNote),
    Ban(BanPrincipal),
    LiftBan(LiftBan),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registered {
    pub principal_id: PrincipalId,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub password_hash: String,
    pub guru_profile: Option<GuruProfile>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailVerified {
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginFailed {
    pub failed_logins: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSucceeded {
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordRotated {
    pub new_password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetTokenIssued {
    pub stored: TokenDigest,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationTokenIssued {
    pub stored: TokenDigest,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationSubmitted {
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewStarted {
    pub reviewer: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationApproved {
    pub reviewer: PrincipalId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRejected {
    pub reviewer: PrincipalId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuruSuspended {
    pub actor: PrincipalId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuruActivated {
    pub actor: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminNoteAdded {
    pub author: PrincipalId,
    pub note: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Banned {
    pub actor: PrincipalId,
    pub reason: String,
    pub ends_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanLifted {
    pub actor: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

/// All principal events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PrincipalEvent {
    Registered(Registered),
    EmailVerified(EmailVerified),
    LoginFailed(LoginFailed),
    LoginSucceeded(LoginSucceeded),
    PasswordRotated(PasswordRotated),
    ResetTokenIssued(ResetTokenIssued),
    VerificationTokenIssued(VerificationTokenIssued),
    ApplicationSubmitted(ApplicationSubmitted),
    ReviewStarted(ReviewStarted),
    ApplicationApproved(ApplicationApproved),
    ApplicationRejected(ApplicationRejected),
    GuruSuspended(GuruSuspended),
    GuruActivated(GuruActivated),
    AdminNoteAdded(AdminNoteAdded),
    Banned(Banned),
    BanLifted(BanLifted),
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Principal {
    type Command = PrincipalCommand;
    type Event = PrincipalEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PrincipalEvent::Registered(e) => self.apply_registered(e),
            PrincipalEvent::EmailVerified(e) => self.apply_email_verified(e),
            PrincipalEvent::LoginFailed(e) => self.apply_login_failed(e),
            PrincipalEvent::LoginSucceeded(_) => self.apply_login_succeeded(),
            PrincipalEvent::PasswordRotated(e) => self.apply_password_rotated(e),
            PrincipalEvent::ResetTokenIssued(e) => {
                self.credentials.reset_token = Some(e.stored.clone());
            }
            PrincipalEvent::VerificationTokenIssued(e) => {
                self.credentials.verification_token = Some(e.stored.clone());
            }
            PrincipalEvent::ApplicationSubmitted(e) => self.apply_submitted(e),
            PrincipalEvent::ReviewStarted(_) => self.apply_review_started(),
            PrincipalEvent::ApplicationApproved(e) => self.apply_approved(e),
            PrincipalEvent::ApplicationRejected(e) => self.apply_rejected(e),
            PrincipalEvent::GuruSuspended(e) => self.apply_suspended(e),
            PrincipalEvent::GuruActivated(_) => self.apply_activated(),
            PrincipalEvent::AdminNoteAdded(e) => self.apply_note_added(e),
            PrincipalEvent::Banned(e) => self.apply_banned(e),
            PrincipalEvent::BanLifted(_) => self.ban = None,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PrincipalCommand::Register(cmd) => self.handle_register(cmd),
            PrincipalCommand::VerifyEmail(cmd) => self.handle_verify_email(cmd),
            PrincipalCommand::RecordLoginFailure(cmd) => self.handle_login_failure(cmd),
            PrincipalCommand::RecordLoginSuccess(cmd) => self.handle_login_success(cmd),
            PrincipalCommand::RotatePassword(cmd) => self.handle_rotate_password(cmd),
            PrincipalCommand::IssueResetToken(cmd) => self.handle_issue_reset_token(cmd),
            PrincipalCommand::IssueVerificationToken(cmd) => {
                self.handle_issue_verification_token(cmd)
            }
            PrincipalCommand::ResetPassword(cmd) => self.handle_reset_password(cmd),
            PrincipalCommand::SubmitApplication(cmd) => self.handle_submit(cmd),
            PrincipalCommand::BeginReview(cmd) => self.handle_begin_review(cmd),
            PrincipalCommand::Approve(cmd) => self.handle_approve(cmd),
            PrincipalCommand::Reject(cmd) => self.handle_reject(cmd),
            PrincipalCommand::Suspend(cmd) => self.handle_suspend(cmd),
            PrincipalCommand::Activate(cmd) => self.handle_activate(cmd),
            PrincipalCommand::AddNote(cmd) => self.handle_add_note(cmd),
            PrincipalCommand::Ban(cmd) => self.handle_ban(cmd),
            PrincipalCommand::LiftBan(cmd) => self.handle_lift_ban(cmd),
        }
    }
}

impl Principal {
    // ─────────────────────────────────────────────────────────────────────────
    // Command Handlers
    // ─────────────────────────────────────────────────────────────────────────

    fn handle_register(&self, cmd: &RegisterPrincipal) -> Result<Vec<PrincipalEvent>, DomainError> {
        if self.created {
            return Err(DomainError::duplicate("principal already exists"));
        }

        if cmd.email.trim().is_empty() || !cmd.email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }
        if cmd.username.trim().is_empty() {
            return Err(DomainError::validation("username cannot be empty"));
        }
        if cmd.display_name.trim().is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }
        if cmd.password_hash.is_empty() {
            return Err(DomainError::validation("password hash missing"));
        }

        Ok(vec![PrincipalEvent::Registered(Registered {
            principal_id: cmd.principal_id,
            email: cmd.email.trim().to_lowercase(),
            username: cmd.username.trim().to_string(),
            display_name: cmd.display_name.trim().to_string(),
            role: cmd.role,
            password_hash: cmd.password_hash.clone(),
            guru_profile: cmd.guru_profile.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_verify_email(&self, cmd: &VerifyEmail) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_created()?;

        let stored = self
            .credentials
            .verification_token
            .as_ref()
            .ok_or(DomainError::InvalidToken)?;

        if !stored.matches(&cmd.presented_digest) {
            return Err(DomainError::InvalidToken);
        }
        if stored.is_expired(cmd.occurred_at) {
            return Err(DomainError::ExpiredToken);
        }

        Ok(vec![PrincipalEvent::EmailVerified(EmailVerified {
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_login_failure(
        &self,
        cmd: &RecordLoginFailure,
    ) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_created()?;

        let failed_logins = self.credentials.failed_logins.saturating_add(1);
        let locked_until = (failed_logins >= MAX_FAILED_LOGINS)
            .then(|| cmd.occurred_at + Duration::minutes(LOCKOUT_MINUTES));

        Ok(vec![PrincipalEvent::LoginFailed(LoginFailed {
            failed_logins,
            locked_until,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_login_success(
        &self,
        cmd: &RecordLoginSuccess,
    ) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_created()?;

        Ok(vec![PrincipalEvent::LoginSucceeded(LoginSucceeded {
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rotate_password(
        &self,
        cmd: &RotatePassword,
    ) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_created()?;

        if cmd.new_password_hash.is_empty() {
            return Err(DomainError::validation("password hash missing"));
        }

        Ok(vec![PrincipalEvent::PasswordRotated(PasswordRotated {
            new_password_hash: cmd.new_password_hash.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_issue_reset_token(
        &self,
        cmd: &IssueResetToken,
    ) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_created()?;

        Ok(vec![PrincipalEvent::ResetTokenIssued(ResetTokenIssued {
            stored: cmd.stored.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_issue_verification_token(
        &self,
        cmd: &IssueVerificationToken,
    ) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_created()?;

        Ok(vec![PrincipalEvent::VerificationTokenIssued(
            VerificationTokenIssued {
                stored: cmd.stored.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_reset_password(
        &self,
        cmd: &ResetPassword,
    ) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_created()?;

        let stored = self
            .credentials
            .reset_token
            .as_ref()
            .ok_or(DomainError::InvalidToken)?;

        if !stored.matches(&cmd.presented_digest) {
            return Err(DomainError::InvalidToken);
        }
        if stored.is_expired(cmd.occurred_at) {
            return Err(DomainError::ExpiredToken);
        }
        if cmd.new_password_hash.is_empty() {
            return Err(DomainError::validation("password hash missing"));
        }

        Ok(vec![PrincipalEvent::PasswordRotated(PasswordRotated {
            new_password_hash: cmd.new_password_hash.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitApplication) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_created()?;
        let app = self.application()?;

        if app.status != ApplicationStatus::Draft {
            return Err(DomainError::invalid_transition(format!(
                "cannot submit from status '{}'",
                app.status
            )));
        }
        app.validate_for_submission()?;

        Ok(vec![PrincipalEvent::ApplicationSubmitted(
            ApplicationSubmitted {
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_begin_review(&self, cmd: &BeginReview) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_created()?;
        let app = self.application()?;

        if app.status != ApplicationStatus::Submitted {
            return Err(DomainError::invalid_transition(format!(
                "cannot begin review from status '{}'",
                app.status
            )));
        }

        Ok(vec![PrincipalEvent::ReviewStarted(ReviewStarted {
            reviewer: cmd.reviewer,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(
        &self,
        cmd: &ApproveApplication,
    ) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_created()?;
        let app = self.application()?;

        if !app.is_reviewable() {
            return Err(DomainError::invalid_transition(format!(
                "cannot approve from status '{}'",
                app.status
            )));
        }

        Ok(vec![PrincipalEvent::ApplicationApproved(
            ApplicationApproved {
                reviewer: cmd.reviewer,
                notes: cmd.notes.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_reject(&self, cmd: &RejectApplication) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_created()?;
        let app = self.application()?;

        if !app.is_reviewable() {
            return Err(DomainError::invalid_transition(format!(
                "cannot reject from status '{}'",
                app.status
            )));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("rejection reason cannot be empty"));
        }

        Ok(vec![PrincipalEvent::ApplicationRejected(
            ApplicationRejected {
                reviewer: cmd.reviewer,
                reason: cmd.reason.trim().to_string(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_suspend(&self, cmd: &SuspendGuru) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_created()?;
        let app = self.application()?;

        if !app.account.is_approved || app.status != ApplicationStatus::Approved {
            return Err(DomainError::invalid_transition(format!(
                "cannot suspend from status '{}'",
                app.status
            )));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("suspension reason cannot be empty"));
        }

        Ok(vec![PrincipalEvent::GuruSuspended(GuruSuspended {
            actor: cmd.actor,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(&self, cmd: &ActivateGuru) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_created()?;
        let app = self.application()?;

        if app.status != ApplicationStatus::Suspended || !app.account.is_approved {
            return Err(DomainError::invalid_transition(format!(
                "cannot activate from status '{}'",
                app.status
            )));
        }

        Ok(vec![PrincipalEvent::GuruActivated(GuruActivated {
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_note(&self, cmd: &AddAdminNote) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_created()?;
        self.application()?;

        if cmd.note.trim().is_empty() {
            return Err(DomainError::validation("note cannot be empty"));
        }

        Ok(vec![PrincipalEvent::AdminNoteAdded(AdminNoteAdded {
            author: cmd.author,
            note: cmd.note.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_ban(&self, cmd: &BanPrincipal) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_created()?;

        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("ban reason cannot be empty"));
        }
        if let Some(ban) = &self.ban {
            if ban.is_active(cmd.occurred_at) {
                return Err(DomainError::invalid_transition("principal already banned"));
            }
        }

        Ok(vec![PrincipalEvent::Banned(Banned {
            actor: cmd.actor,
            reason: cmd.reason.trim().to_string(),
            ends_at: cmd.ends_at,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_lift_ban(&self, cmd: &LiftBan) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_created()?;

        if self.ban.is_none() {
            return Err(DomainError::invalid_transition("principal is not banned"));
        }

        Ok(vec![PrincipalEvent::BanLifted(BanLifted {
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event Appliers
    // ─────────────────────────────────────────────────────────────────────────

    fn apply_registered(&mut self, e: &Registered) {
        self.id = e.principal_id;
        self.email = e.email.clone();
        self.username = e.username.clone();
        self.display_name = e.display_name.clone();
        self.role = e.role;
        self.is_active = true;
        self.credentials = CredentialRecord {
            password_hash: e.password_hash.clone(),
            password_changed_at: e.occurred_at,
            ..Default::default()
        };
        self.application = (e.role == Role::Guru)
            .then(|| ApplicationRecord::draft(e.guru_profile.clone().unwrap_or_default()));
        self.created_at = e.occurred_at;
        self.created = true;
    }

    fn apply_email_verified(&mut self, _e: &EmailVerified) {
        self.email_verified = true;
        self.credentials.verification_token = None;
        if let Some(app) = &mut self.application {
            if app.profile.verification_level == VerificationLevel::Unverified {
                app.profile.verification_level = VerificationLevel::EmailVerified;
            }
        }
    }

    fn apply_login_failed(&mut self, e: &LoginFailed) {
        self.credentials.failed_logins = e.failed_logins;
        self.credentials.locked_until = e.locked_until;
    }

    fn apply_login_succeeded(&mut self) {
        self.credentials.failed_logins = 0;
        self.credentials.locked_until = None;
    }

    fn apply_password_rotated(&mut self, e: &PasswordRotated) {
        self.credentials.password_hash = e.new_password_hash.clone();
        self.credentials.password_changed_at = e.occurred_at;
        self.credentials.reset_token = None;
        self.credentials.failed_logins = 0;
        self.credentials.locked_until = None;
    }

    fn apply_submitted(&mut self, e: &ApplicationSubmitted) {
        if let Some(app) = &mut self.application {
            app.status = ApplicationStatus::Submitted;
            app.submitted_at = Some(e.occurred_at);
        }
    }

    fn apply_review_started(&mut self) {
        if let Some(app) = &mut self.application {
            app.status = ApplicationStatus::UnderReview;
        }
    }

    fn apply_approved(&mut self, e: &ApplicationApproved) {
        if let Some(app) = &mut self.application {
            app.status = ApplicationStatus::Approved;
            app.reviewed_at = Some(e.occurred_at);
            app.reviewed_by = Some(e.reviewer);
            app.approval_notes = e.notes.clone();
            app.account.is_approved = true;
            app.account.can_create_content = true;
            app.account.can_teach = true;
        }
        self.is_active = true;
    }

    fn apply_rejected(&mut self, e: &ApplicationRejected) {
        if let Some(app) = &mut self.application {
            app.status = ApplicationStatus::Rejected;
            app.reviewed_at = Some(e.occurred_at);
            app.reviewed_by = Some(e.reviewer);
            app.rejection_reason = Some(e.reason.clone());
        }
    }

    fn apply_suspended(&mut self, e: &GuruSuspended) {
        if let Some(app) = &mut self.application {
            app.status = ApplicationStatus::Suspended;
            app.suspension = Some(Suspension {
                reason: e.reason.clone(),
                suspended_by: e.actor,
                suspended_at: e.occurred_at,
            });
            app.account.can_create_content = false;
            app.account.can_teach = false;
        }
        self.is_active = false;
    }

    fn apply_activated(&mut self) {
        if let Some(app) = &mut self.application {
            app.status = ApplicationStatus::Approved;
            app.suspension = None;
            app.account.can_create_content = true;
            app.account.can_teach = true;
        }
        self.is_active = true;
    }

    fn apply_note_added(&mut self, e: &AdminNoteAdded) {
        if let Some(app) = &mut self.application {
            app.admin_notes.push(AdminNote {
                note: e.note.clone(),
                added_by: e.author,
                added_at: e.occurred_at,
            });
        }
    }

    fn apply_banned(&mut self, e: &Banned) {
        self.ban = Some(BanWindow {
            reason: e.reason.clone(),
            starts_at: e.occurred_at,
            ends_at: e.ends_at,
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
