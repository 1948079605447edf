//! Authorization guard: composable capability predicates and the login gate.
//!
//! Requirements are pure and independently combinable; adding a capability
//! dimension means adding a variant, not widening an existing branch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::application::{ApplicationStatus, VerificationLevel};
use crate::principal::Principal;
use crate::roles::Role;

/// One capability predicate over a resolved principal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "requirement", content = "value")]
pub enum Requirement {
    /// Principal's role must be one of the listed roles.
    RoleIn(Vec<Role>),
    /// Account must be active (not suspended/deactivated).
    ActiveAccount,
    /// Guru application must be approved.
    ApprovedGuru,
    /// Email ownership must be proven.
    VerifiedEmail,
    /// At least this many years of declared experience.
    MinExperienceYears(u8),
    /// Declared expertise must include this subject (case-insensitive).
    HasSubject(String),
    /// Verification depth must be at least this level.
    MinVerificationLevel(VerificationLevel),
}

impl core::fmt::Display for Requirement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Requirement::RoleIn(roles) => {
                let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
                write!(f, "role must be one of [{}]", names.join(", "))
            }
            Requirement::ActiveAccount => write!(f, "account must be active"),
            Requirement::ApprovedGuru => write!(f, "guru application must be approved"),
            Requirement::VerifiedEmail => write!(f, "email must be verified"),
            Requirement::MinExperienceYears(n) => {
                write!(f, "at least {n} years of experience required")
            }
            Requirement::HasSubject(s) => write!(f, "expertise in '{s}' required"),
            Requirement::MinVerificationLevel(l) => {
                write!(f, "verification level {l:?} or higher required")
            }
        }
    }
}

impl Requirement {
    /// Check this predicate against a principal. Pure; no IO.
    pub fn check(&self, principal: &Principal) -> Result<(), AuthzError> {
        let met = match self {
            Requirement::RoleIn(roles) => roles.contains(&principal.role),
            Requirement::ActiveAccount => principal.is_active,
            Requirement::ApprovedGuru => principal
                .application
                .as_ref()
                .map(|app| app.account.is_approved)
                .unwrap_or(false),
            Requirement::VerifiedEmail => principal.email_verified,
            Requirement::MinExperienceYears(n) => principal
                .application
                .as_ref()
                .and_then(|app| app.profile.experience_years)
                .map(|years| years >= *n)
                .unwrap_or(false),
            Requirement::HasSubject(subject) => principal
                .application
                .as_ref()
                .map(|app| {
                    app.profile
                        .subjects
                        .iter()
                        .any(|s| s.eq_ignore_ascii_case(subject))
                })
                .unwrap_or(false),
            Requirement::MinVerificationLevel(level) => principal
                .application
                .as_ref()
                .map(|app| app.profile.verification_level >= *level)
                .unwrap_or(false),
        };

        if met {
            Ok(())
        } else {
            Err(AuthzError::Forbidden(self.clone()))
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthzError {
    /// Carries the first unmet requirement so callers can render an
    /// actionable message.
    #[error("forbidden: {0}")]
    Forbidden(Requirement),
}

/// Check every requirement in order; the first unmet one is returned.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &[Requirement]) -> Result<(), AuthzError> {
    for requirement in required {
        requirement.check(principal)?;
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Login gate
// ─────────────────────────────────────────────────────────────────────────────

/// Why a login was denied. Each variant is a distinct, user-facing reason the
/// UI branches on; never collapse these into a generic "unauthorized".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "code")]
pub enum LoginDenial {
    Banned {
        reason: String,
        until: Option<DateTime<Utc>>,
    },
    Locked {
        until: DateTime<Utc>,
    },
    ApplicationDraft,
    PendingReview,
    Rejected {
        reason: Option<String>,
    },
    Suspended {
        reason: Option<String>,
    },
    Inactive,
}

impl LoginDenial {
    /// Human-readable explanation surfaced at login time.
    pub fn message(&self) -> String {
        match self {
            LoginDenial::Banned { reason, until } => match until {
                Some(until) => format!("account banned until {until}: {reason}"),
                None => format!("account banned: {reason}"),
            },
            LoginDenial::Locked { until } => {
                format!("too many failed attempts; locked until {until}")
            }
            LoginDenial::ApplicationDraft => {
                "your guru application has not been submitted yet".to_string()
            }
            LoginDenial::PendingReview => {
                "your guru application is pending review".to_string()
            }
            LoginDenial::Rejected { reason } => match reason {
                Some(reason) => format!("your guru application was rejected: {reason}"),
                None => "your guru application was rejected".to_string(),
            },
            LoginDenial::Suspended { reason } => match reason {
                Some(reason) => format!("account suspended: {reason}"),
                None => "account suspended".to_string(),
            },
            LoginDenial::Inactive => "account is inactive".to_string(),
        }
    }
}

/// Decide whether a principal may obtain tokens right now.
///
/// Only approved **and** active gurus pass; every other state maps to its own
/// denial reason. Students and staff pass unless banned, locked, or inactive.
pub fn login_gate(principal: &Principal, now: DateTime<Utc>) -> Result<(), LoginDenial> {
    if let Some(ban) = &principal.ban {
        if ban.is_active(now) {
            return Err(LoginDenial::Banned {
                reason: ban.reason.clone(),
                until: ban.ends_at,
            });
        }
    }

    if let Some(until) = principal.credentials.locked_until {
        if now < until {
            return Err(LoginDenial::Locked { until });
        }
    }

    if let Some(app) = &principal.application {
        match app.status {
            ApplicationStatus::Draft => return Err(LoginDenial::ApplicationDraft),
            ApplicationStatus::Submitted | ApplicationStatus::UnderReview => {
                return Err(LoginDenial::PendingReview)
            }
            ApplicationStatus::Rejected => {
                return Err(LoginDenial::Rejected {
                    reason: app.rejection_reason.clone(),
                })
            }
            ApplicationStatus::Suspended => {
                return Err(LoginDenial::Suspended {
                    reason: app.suspension.as_ref().map(|s| s.reason.clone()),
                })
            }
            ApplicationStatus::Approved => {}
        }
    }

    if !principal.is_active {
        return Err(LoginDenial::Inactive);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{
        AccountStatus, ApplicationRecord, EducationCredential, GuruProfile,
    };
    use crate::principal::BanWindow;
    use chrono::Duration;
    use gurukul_core::PrincipalId;

    fn student() -> Principal {
        Principal {
            email: "s@example.com".to_string(),
            username: "student".to_string(),
            role: Role::Student,
            is_active: true,
            created: true,
            ..Principal::empty(PrincipalId::new())
        }
    }

    fn guru_with_status(status: ApplicationStatus) -> Principal {
        let approved = matches!(
            status,
            ApplicationStatus::Approved | ApplicationStatus::Suspended
        );
        let mut p = Principal {
            role: Role::Guru,
            is_active: status == ApplicationStatus::Approved,
            application: Some(ApplicationRecord {
                status,
                profile: GuruProfile {
                    education: vec![EducationCredential {
                        degree: "BA".to_string(),
                        institution: "U".to_string(),
                        year: None,
                    }],
                    experience_years: Some(4),
                    subjects: vec!["History".to_string()],
                    verification_level: VerificationLevel::EmailVerified,
                },
                account: AccountStatus {
                    is_approved: approved,
                    can_create_content: status == ApplicationStatus::Approved,
                    can_teach: status == ApplicationStatus::Approved,
                },
                ..Default::default()
            }),
            created: true,
            ..Principal::empty(PrincipalId::new())
        };
        if status == ApplicationStatus::Rejected {
            p.application.as_mut().unwrap().rejection_reason =
                Some("thin profile".to_string());
        }
        p
    }

    #[test]
    fn active_student_passes_the_gate() {
        assert!(login_gate(&student(), Utc::now()).is_ok());
    }

    #[test]
    fn each_application_state_maps_to_its_own_denial() {
        let now = Utc::now();
        assert_eq!(
            login_gate(&guru_with_status(ApplicationStatus::Draft), now),
            Err(LoginDenial::ApplicationDraft)
        );
        assert_eq!(
            login_gate(&guru_with_status(ApplicationStatus::Submitted), now),
            Err(LoginDenial::PendingReview)
        );
        assert_eq!(
            login_gate(&guru_with_status(ApplicationStatus::UnderReview), now),
            Err(LoginDenial::PendingReview)
        );
        assert!(matches!(
            login_gate(&guru_with_status(ApplicationStatus::Rejected), now),
            Err(LoginDenial::Rejected { reason: Some(_) })
        ));
        assert!(login_gate(&guru_with_status(ApplicationStatus::Approved), now).is_ok());
    }

    #[test]
    fn suspended_denial_mentions_suspension() {
        let mut p = guru_with_status(ApplicationStatus::Suspended);
        p.application.as_mut().unwrap().suspension = Some(crate::application::Suspension {
            reason: "policy violation".to_string(),
            suspended_by: PrincipalId::new(),
            suspended_at: Utc::now(),
        });

        let denial = login_gate(&p, Utc::now()).unwrap_err();
        assert!(denial.message().contains("suspended"));
        assert!(denial.message().contains("policy violation"));
    }

    #[test]
    fn active_ban_denies_with_reason_and_window() {
        let now = Utc::now();
        let mut p = student();
        p.ban = Some(BanWindow {
            reason: "spam".to_string(),
            starts_at: now - Duration::hours(1),
            ends_at: Some(now + Duration::hours(1)),
        });
        assert!(matches!(
            login_gate(&p, now),
            Err(LoginDenial::Banned { .. })
        ));

        // Expired window no longer gates.
        assert!(login_gate(&p, now + Duration::hours(2)).is_ok());
    }

    #[test]
    fn lockout_denies_until_window_passes() {
        let now = Utc::now();
        let mut p = student();
        p.credentials.locked_until = Some(now + Duration::minutes(10));
        assert!(matches!(login_gate(&p, now), Err(LoginDenial::Locked { .. })));
        assert!(login_gate(&p, now + Duration::minutes(11)).is_ok());
    }

    #[test]
    fn requirements_compose_independently() {
        let p = guru_with_status(ApplicationStatus::Approved);
        assert!(authorize(
            &p,
            &[
                Requirement::RoleIn(vec![Role::Guru]),
                Requirement::ActiveAccount,
                Requirement::ApprovedGuru,
                Requirement::MinExperienceYears(3),
                Requirement::HasSubject("history".to_string()),
                Requirement::MinVerificationLevel(VerificationLevel::EmailVerified),
            ],
        )
        .is_ok());
    }

    #[test]
    fn first_unmet_requirement_is_reported() {
        let p = guru_with_status(ApplicationStatus::Approved);
        let err = authorize(
            &p,
            &[
                Requirement::RoleIn(vec![Role::Guru]),
                Requirement::MinExperienceYears(10),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            AuthzError::Forbidden(Requirement::MinExperienceYears(10))
        );
    }

    #[test]
    fn student_fails_guru_requirements() {
        let p = student();
        assert!(Requirement::ApprovedGuru.check(&p).is_err());
        assert!(Requirement::HasSubject("history".to_string()).check(&p).is_err());
        assert!(Requirement::RoleIn(vec![Role::Admin]).check(&p).is_err());
    }
}
