//! Guru application record: the approval-workflow state attached to a
//! principal applying to author content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gurukul_core::{DomainError, DomainResult, PrincipalId};

/// Review status of a guru application.
///
/// `Rejected` is terminal for the record; `Suspended` is admin-reversible.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    Suspended,
}

impl core::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Suspended => "suspended",
        };
        f.write_str(s)
    }
}

/// Account capability flags derived from status transitions.
///
/// These are never set directly; only the lifecycle transitions flip them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AccountStatus {
    pub is_approved: bool,
    pub can_create_content: bool,
    pub can_teach: bool,
}

/// Verification depth of a guru's identity/qualifications (ordered).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationLevel {
    #[default]
    Unverified,
    EmailVerified,
    DocumentsVerified,
    Expert,
}

/// One education credential claimed by an applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationCredential {
    pub degree: String,
    pub institution: String,
    pub year: Option<u16>,
}

/// Applicant profile evaluated during review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GuruProfile {
    pub education: Vec<EducationCredential>,
    /// `Some(0)` is a valid, explicit answer; `None` means not provided.
    pub experience_years: Option<u8>,
    pub subjects: Vec<String>,
    pub verification_level: VerificationLevel,
}

/// An audit note appended by an admin. The list is append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminNote {
    pub note: String,
    pub added_by: PrincipalId,
    pub added_at: DateTime<Utc>,
}

/// Why and by whom an approved guru was suspended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suspension {
    pub reason: String,
    pub suspended_by: PrincipalId,
    pub suspended_at: DateTime<Utc>,
}

/// The full application record. Created in `Draft` atomically with its
/// owning principal; mutated only through the governance transitions; never
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApplicationRecord {
    pub status: ApplicationStatus,
    pub profile: GuruProfile,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<PrincipalId>,
    /// Present iff `status == Rejected`.
    pub rejection_reason: Option<String>,
    pub approval_notes: Option<String>,
    pub suspension: Option<Suspension>,
    pub account: AccountStatus,
    pub admin_notes: Vec<AdminNote>,
}

impl ApplicationRecord {
    pub fn draft(profile: GuruProfile) -> Self {
        Self {
            profile,
            ..Default::default()
        }
    }

    /// Submission gate: at least one education credential, an explicit
    /// experience answer (zero included), and at least one subject.
    pub fn validate_for_submission(&self) -> DomainResult<()> {
        if self.profile.education.is_empty() {
            return Err(DomainError::validation(
                "at least one education credential is required",
            ));
        }
        if self.profile.experience_years.is_none() {
            return Err(DomainError::validation(
                "years of experience must be provided (zero is acceptable)",
            ));
        }
        if self.profile.subjects.is_empty() {
            return Err(DomainError::validation(
                "at least one subject of expertise is required",
            ));
        }
        Ok(())
    }

    /// Whether an approve/reject decision may be taken on the record.
    pub fn is_reviewable(&self) -> bool {
        matches!(
            self.status,
            ApplicationStatus::Submitted | ApplicationStatus::UnderReview
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_profile() -> GuruProfile {
        GuruProfile {
            education: vec![EducationCredential {
                degree: "BSc Mathematics".to_string(),
                institution: "State University".to_string(),
                year: Some(2015),
            }],
            experience_years: Some(3),
            subjects: vec!["mathematics".to_string()],
            verification_level: VerificationLevel::EmailVerified,
        }
    }

    #[test]
    fn draft_with_complete_profile_is_submittable() {
        let record = ApplicationRecord::draft(complete_profile());
        assert!(record.validate_for_submission().is_ok());
    }

    #[test]
    fn zero_experience_is_an_explicit_answer() {
        let mut profile = complete_profile();
        profile.experience_years = Some(0);
        let record = ApplicationRecord::draft(profile);
        assert!(record.validate_for_submission().is_ok());
    }

    #[test]
    fn missing_fields_fail_validation() {
        let mut profile = complete_profile();
        profile.education.clear();
        let record = ApplicationRecord::draft(profile);
        assert!(matches!(
            record.validate_for_submission(),
            Err(DomainError::Validation(_))
        ));

        let mut profile = complete_profile();
        profile.experience_years = None;
        let record = ApplicationRecord::draft(profile);
        assert!(record.validate_for_submission().is_err());

        let mut profile = complete_profile();
        profile.subjects.clear();
        let record = ApplicationRecord::draft(profile);
        assert!(record.validate_for_submission().is_err());
    }

    #[test]
    fn reviewable_states() {
        let mut record = ApplicationRecord::draft(complete_profile());
        assert!(!record.is_reviewable());

        record.status = ApplicationStatus::Submitted;
        assert!(record.is_reviewable());

        record.status = ApplicationStatus::UnderReview;
        assert!(record.is_reviewable());

        record.status = ApplicationStatus::Rejected;
        assert!(!record.is_reviewable());
    }

    #[test]
    fn verification_levels_are_ordered() {
        assert!(VerificationLevel::Expert > VerificationLevel::DocumentsVerified);
        assert!(VerificationLevel::EmailVerified > VerificationLevel::Unverified);
    }
}
