//! `gurukul-identity` — pure identity/authorization domain (zero-trust).
//!
//! This crate is intentionally decoupled from HTTP and storage. It holds the
//! `Principal` aggregate (identity + credential record + guru application
//! record), the credential vault primitives, the authorization guard, and the
//! token claims model.

pub mod application;
pub mod claims;
pub mod guard;
pub mod principal;
pub mod roles;
pub mod vault;

pub use application::{
    AccountStatus, AdminNote, ApplicationRecord, ApplicationStatus, EducationCredential,
    GuruProfile, Suspension, VerificationLevel,
};
pub use claims::{JwtClaims, TokenKind, TokenValidationError, validate_claims};
pub use guard::{authorize, login_gate, AuthzError, LoginDenial, Requirement};
pub use principal::{
    ActivateGuru, AddAdminNote, ApproveApplication, BanPrincipal, BanWindow, BeginReview,
    CredentialRecord, IssueResetToken, IssueVerificationToken, LiftBan, Principal,
    PrincipalCommand, PrincipalEvent, RecordLoginFailure, RecordLoginSuccess, RegisterPrincipal,
    RejectApplication, ResetPassword, RotatePassword, SubmitApplication, SuspendGuru, VerifyEmail,
};
pub use roles::Role;
pub use vault::{OneTimeToken, PasswordVaultError, TokenDigest};
