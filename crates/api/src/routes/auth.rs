//! Public authentication routes plus the authenticated whoami/logout pair.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use gurukul_core::PrincipalId;
use gurukul_identity::{
    login_gate, vault, EducationCredential, GuruProfile, IssueResetToken,
    IssueVerificationToken, Principal, PrincipalCommand, RecordLoginFailure, RecordLoginSuccess,
    RegisterPrincipal, ResetPassword, Role, RotatePassword, SubmitApplication, TokenKind,
    VerificationLevel, VerifyEmail,
};
use gurukul_infra::{NotificationTemplate, PipelineError, PrincipalDirectory};

use crate::app::AppServices;
use crate::context::PrincipalContext;
use crate::errors::{
    denial_response, json_error, pipeline_error_to_response, registry_error_to_response,
};

// ─────────────────────────────────────────────────────────────────────────────
// Request DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub password: String,
    /// "student" (default) or "guru".
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub profile: Option<GuruProfileRequest>,
}

#[derive(Debug, Deserialize)]
pub struct GuruProfileRequest {
    #[serde(default)]
    pub education: Vec<EducationCredentialRequest>,
    #[serde(default)]
    pub experience_years: Option<u8>,
    #[serde(default)]
    pub subjects: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EducationCredentialRequest {
    pub degree: String,
    pub institution: String,
    #[serde(default)]
    pub year: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email or username.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn public_router() -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/verify-email", post(verify_email))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /auth/register
///
/// Creates the principal; a guru registration carries its application, which
/// is submitted right away when the profile is complete and parked in draft
/// otherwise.
pub async fn register(
    Extension(services): Extension<AppServices>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    let role = match body.role.as_deref() {
        None | Some("student") => Role::Student,
        Some("guru") => Role::Guru,
        Some(other) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "invalid_role",
                format!("cannot register with role '{other}'"),
            )
        }
    };

    if body.password.len() < 8 {
        return json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "password must be at least 8 characters",
        );
    }

    let password = body.password;
    let password_hash = match tokio::task::spawn_blocking(move || vault::hash_password(&password))
        .await
    {
        Ok(Ok(hash)) => hash,
        _ => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "hashing_failed",
                "could not process password",
            )
        }
    };

    let now = Utc::now();
    let id = PrincipalId::new();
    let principal = match services.pipeline.register(RegisterPrincipal {
        principal_id: id,
        email: body.email,
        username: body.username,
        display_name: body.display_name,
        role,
        password_hash,
        guru_profile: body.profile.map(profile_into_domain),
        occurred_at: now,
    }) {
        Ok(principal) => principal,
        Err(e) => return pipeline_error_to_response(e),
    };

    // Complete guru profiles go straight into the review queue; incomplete
    // ones stay draft (the login gate will say so).
    let mut application_status = principal.application.as_ref().map(|app| app.status);
    if role == Role::Guru {
        match services.pipeline.execute(
            id,
            PrincipalCommand::SubmitApplication(SubmitApplication { occurred_at: now }),
        ) {
            Ok((submitted, _)) => {
                application_status = submitted.application.as_ref().map(|app| app.status);
            }
            Err(PipelineError::Validation(_)) => {}
            Err(e) => return pipeline_error_to_response(e),
        }
    }

    issue_verification_token(&services, &principal, now);

    (
        StatusCode::CREATED,
        Json(json!({
            "id": principal.id,
            "email": principal.email,
            "username": principal.username,
            "role": principal.role,
            "application_status": application_status,
        })),
    )
        .into_response()
}

/// POST /auth/login
pub async fn login(
    Extension(services): Extension<AppServices>,
    Json(body): Json<LoginRequest>,
) -> Response {
    let now = Utc::now();

    let principal = match services.directory.find_by_identifier(&body.identifier) {
        Ok(Some(principal)) => principal,
        Ok(None) => {
            return json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "invalid credentials",
            )
        }
        Err(_) => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_unavailable",
                "directory unavailable",
            )
        }
    };

    if let Err(denial) = login_gate(&principal, now) {
        return denial_response(denial);
    }

    let stored_hash = principal.credentials.password_hash.clone();
    let password = body.password;
    let verified =
        tokio::task::spawn_blocking(move || vault::verify_password(&password, &stored_hash)).await;

    match verified {
        Ok(Ok(())) => {}
        Ok(Err(vault::PasswordVaultError::InvalidCredentials)) => {
            if let Err(e) = services.pipeline.execute(
                principal.id,
                PrincipalCommand::RecordLoginFailure(RecordLoginFailure { occurred_at: now }),
            ) {
                tracing::warn!(principal = %principal.id, error = %e, "failed to record login failure");
            }
            return json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "invalid credentials",
            );
        }
        _ => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "hashing_failed",
                "could not verify password",
            )
        }
    }

    if let Err(e) = services.pipeline.execute(
        principal.id,
        PrincipalCommand::RecordLoginSuccess(RecordLoginSuccess { occurred_at: now }),
    ) {
        tracing::warn!(principal = %principal.id, error = %e, "failed to reset login counters");
    }

    match services
        .registry
        .issue_session(principal.id, principal.role, now)
    {
        Ok(pair) => (
            StatusCode::OK,
            Json(json!({
                "access_token": pair.access_token,
                "refresh_token": pair.refresh_token,
                "token_type": "Bearer",
            })),
        )
            .into_response(),
        Err(e) => registry_error_to_response(e),
    }
}

/// POST /auth/refresh
pub async fn refresh(
    Extension(services): Extension<AppServices>,
    Json(body): Json<RefreshRequest>,
) -> Response {
    let now = Utc::now();

    let claims = match services.registry.peek(&body.refresh_token) {
        Ok(claims) => claims,
        Err(_) => {
            return json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_refresh_token",
                "invalid refresh token",
            )
        }
    };
    if claims.expect_kind(TokenKind::Refresh).is_err() {
        return json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_refresh_token",
            "invalid refresh token",
        );
    }

    let principal = match services.directory.load(claims.sub) {
        Ok(principal) => principal,
        Err(_) => {
            return json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_refresh_token",
                "invalid refresh token",
            )
        }
    };

    // Password rotation kills outstanding refresh tokens too.
    if claims.issued_at < principal.credentials.password_changed_at {
        return json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_refresh_token",
            "invalid refresh token",
        );
    }

    if let Err(denial) = login_gate(&principal, now) {
        return denial_response(denial);
    }

    match services.registry.refresh(&body.refresh_token, now) {
        Ok((_, pair)) => (
            StatusCode::OK,
            Json(json!({
                "access_token": pair.access_token,
                "refresh_token": pair.refresh_token,
                "token_type": "Bearer",
            })),
        )
            .into_response(),
        Err(e) => registry_error_to_response(e),
    }
}

/// POST /auth/logout (authenticated)
pub async fn logout(
    Extension(services): Extension<AppServices>,
    Extension(ctx): Extension<PrincipalContext>,
) -> Response {
    let now = Utc::now();

    if let Err(e) = services.registry.revoke_access(ctx.access_token(), now) {
        return registry_error_to_response(e);
    }
    if let Err(e) = services.registry.revoke_session(ctx.principal_id()) {
        return registry_error_to_response(e);
    }

    StatusCode::NO_CONTENT.into_response()
}

/// POST /auth/change-password (authenticated)
///
/// Rotates the credential; every token issued before this instant,
/// including the one authorizing this call, dies when the write commits.
pub async fn change_password(
    Extension(services): Extension<AppServices>,
    Extension(ctx): Extension<PrincipalContext>,
    Json(body): Json<ChangePasswordRequest>,
) -> Response {
    let now = Utc::now();

    if body.new_password.len() < 8 {
        return json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "password must be at least 8 characters",
        );
    }

    let stored_hash = ctx.principal().credentials.password_hash.clone();
    let current = body.current_password;
    let verified =
        tokio::task::spawn_blocking(move || vault::verify_password(&current, &stored_hash)).await;
    match verified {
        Ok(Ok(())) => {}
        Ok(Err(vault::PasswordVaultError::InvalidCredentials)) => {
            return json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "current password is incorrect",
            )
        }
        _ => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "hashing_failed",
                "could not verify password",
            )
        }
    }

    let password = body.new_password;
    let password_hash = match tokio::task::spawn_blocking(move || vault::hash_password(&password))
        .await
    {
        Ok(Ok(hash)) => hash,
        _ => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "hashing_failed",
                "could not process password",
            )
        }
    };

    if let Err(e) = services.pipeline.execute(
        ctx.principal_id(),
        PrincipalCommand::RotatePassword(RotatePassword {
            new_password_hash: password_hash,
            occurred_at: now,
        }),
    ) {
        return pipeline_error_to_response(e);
    }

    if let Err(e) = services.registry.revoke_session(ctx.principal_id()) {
        tracing::warn!(principal = %ctx.principal_id(), error = %e, "failed to drop session after password change");
    }

    (
        StatusCode::OK,
        Json(json!({ "message": "password updated; please log in again" })),
    )
        .into_response()
}

/// POST /auth/forgot-password
///
/// Always 202: whether the address exists is not disclosed.
pub async fn forgot_password(
    Extension(services): Extension<AppServices>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Response {
    let now = Utc::now();

    if let Ok(Some(principal)) = services.directory.find_by_email(&body.email) {
        let token = vault::OneTimeToken::reset(now);
        match services.pipeline.execute(
            principal.id,
            PrincipalCommand::IssueResetToken(IssueResetToken {
                stored: token.stored,
                occurred_at: now,
            }),
        ) {
            Ok(_) => {
                dispatch(
                    &services,
                    &principal,
                    NotificationTemplate::PasswordReset,
                    json!({ "token": token.raw }),
                );
            }
            Err(e) => {
                tracing::warn!(principal = %principal.id, error = %e, "failed to issue reset token");
            }
        }
    }

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "if the address is registered, a reset link is on its way",
        })),
    )
        .into_response()
}

/// POST /auth/reset-password
pub async fn reset_password(
    Extension(services): Extension<AppServices>,
    Json(body): Json<ResetPasswordRequest>,
) -> Response {
    let now = Utc::now();
    let digest = vault::digest_of(&body.token);

    let principal = match services.directory.find_by_reset_digest(&digest) {
        Ok(Some(principal)) => principal,
        Ok(None) => {
            return json_error(StatusCode::BAD_REQUEST, "invalid_token", "invalid token")
        }
        Err(_) => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_unavailable",
                "directory unavailable",
            )
        }
    };

    if body.new_password.len() < 8 {
        return json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "password must be at least 8 characters",
        );
    }

    let password = body.new_password;
    let password_hash = match tokio::task::spawn_blocking(move || vault::hash_password(&password))
        .await
    {
        Ok(Ok(hash)) => hash,
        _ => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "hashing_failed",
                "could not process password",
            )
        }
    };

    if let Err(e) = services.pipeline.execute(
        principal.id,
        PrincipalCommand::ResetPassword(ResetPassword {
            presented_digest: digest,
            new_password_hash: password_hash,
            occurred_at: now,
        }),
    ) {
        return pipeline_error_to_response(e);
    }

    // Belt and braces: the password-change cutoff already invalidates issued
    // tokens, dropping the session entry stops further refreshes at the door.
    if let Err(e) = services.registry.revoke_session(principal.id) {
        tracing::warn!(principal = %principal.id, error = %e, "failed to drop session after reset");
    }

    (
        StatusCode::OK,
        Json(json!({ "message": "password updated; please log in again" })),
    )
        .into_response()
}

/// POST /auth/verify-email
pub async fn verify_email(
    Extension(services): Extension<AppServices>,
    Json(body): Json<VerifyEmailRequest>,
) -> Response {
    let now = Utc::now();
    let digest = vault::digest_of(&body.token);

    let principal = match services.directory.find_by_verification_digest(&digest) {
        Ok(Some(principal)) => principal,
        Ok(None) => {
            return json_error(StatusCode::BAD_REQUEST, "invalid_token", "invalid token")
        }
        Err(_) => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_unavailable",
                "directory unavailable",
            )
        }
    };

    if let Err(e) = services.pipeline.execute(
        principal.id,
        PrincipalCommand::VerifyEmail(VerifyEmail {
            presented_digest: digest,
            occurred_at: now,
        }),
    ) {
        return pipeline_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(json!({ "message": "email verified" })),
    )
        .into_response()
}

/// GET /whoami (authenticated)
pub async fn whoami(Extension(ctx): Extension<PrincipalContext>) -> Response {
    let principal = ctx.principal();

    let application = principal.application.as_ref().map(|app| {
        json!({
            "status": app.status,
            "submitted_at": app.submitted_at,
            "account": app.account,
            "rejection_reason": app.rejection_reason,
            "suspension_reason": app.suspension.as_ref().map(|s| s.reason.clone()),
            "subjects": app.profile.subjects,
            "verification_level": app.profile.verification_level,
        })
    });

    (
        StatusCode::OK,
        Json(json!({
            "id": principal.id,
            "email": principal.email,
            "username": principal.username,
            "display_name": principal.display_name,
            "role": principal.role,
            "email_verified": principal.email_verified,
            "is_active": principal.is_active,
            "application": application,
        })),
    )
        .into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn profile_into_domain(profile: GuruProfileRequest) -> GuruProfile {
    GuruProfile {
        education: profile
            .education
            .into_iter()
            .map(|e| EducationCredential {
                degree: e.degree,
                institution: e.institution,
                year: e.year,
            })
            .collect(),
        experience_years: profile.experience_years,
        subjects: profile.subjects,
        verification_level: VerificationLevel::Unverified,
    }
}

fn issue_verification_token(
    services: &AppServices,
    principal: &Principal,
    now: chrono::DateTime<Utc>,
) {
    let token = vault::OneTimeToken::verification(now);
    match services.pipeline.execute(
        principal.id,
        PrincipalCommand::IssueVerificationToken(IssueVerificationToken {
            stored: token.stored,
            occurred_at: now,
        }),
    ) {
        Ok(_) => dispatch(
            services,
            principal,
            NotificationTemplate::EmailVerification,
            json!({ "token": token.raw }),
        ),
        Err(e) => {
            tracing::warn!(principal = %principal.id, error = %e, "failed to issue verification token");
        }
    }
}

fn dispatch(
    services: &AppServices,
    principal: &Principal,
    template: NotificationTemplate,
    context: serde_json::Value,
) {
    if let Err(e) = services.notifier.send(&principal.email, template, &context) {
        tracing::warn!(
            principal = %principal.id,
            template = template.as_str(),
            error = %e,
            "notification delivery failed"
        );
    }
}
