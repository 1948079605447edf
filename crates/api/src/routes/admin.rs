//! Governance routes: the admin-only surface over the application lifecycle.

use std::str::FromStr;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use gurukul_core::PrincipalId;
use gurukul_governance::StatusChange;
use gurukul_identity::{authorize, Principal, Requirement, Role};

use crate::app::AppServices;
use crate::context::PrincipalContext;
use crate::errors::{authz_error_to_response, json_error, pipeline_error_to_response};

// ─────────────────────────────────────────────────────────────────────────────
// Request DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct AddNoteRequest {
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub reason: String,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/admin/gurus/pending", get(list_pending))
        .route("/admin/gurus/:id/review", post(begin_review))
        .route("/admin/gurus/:id/approve", post(approve))
        .route("/admin/gurus/:id/reject", post(reject))
        .route("/admin/gurus/:id/status", post(set_status))
        .route("/admin/gurus/:id/notes", post(add_note))
        .route("/admin/principals/:id/ban", post(ban))
        .route("/admin/principals/:id/ban/lift", post(lift_ban))
        .route("/admin/stats", get(stats))
}

// ─────────────────────────────────────────────────────────────────────────────
// Guards
// ─────────────────────────────────────────────────────────────────────────────

/// Mutating governance actions are admin-only.
fn require_admin(ctx: &PrincipalContext) -> Result<(), Response> {
    authorize(ctx.principal(), &[Requirement::RoleIn(vec![Role::Admin])])
        .map_err(authz_error_to_response)
}

/// Read-side views are open to moderators as well.
fn require_reviewer(ctx: &PrincipalContext) -> Result<(), Response> {
    authorize(
        ctx.principal(),
        &[Requirement::RoleIn(vec![Role::Admin, Role::Moderator])],
    )
    .map_err(authz_error_to_response)
}

fn parse_id(raw: &str) -> Result<PrincipalId, Response> {
    PrincipalId::from_str(raw)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/gurus/pending
pub async fn list_pending(
    Extension(services): Extension<AppServices>,
    Extension(ctx): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = require_reviewer(&ctx) {
        return resp;
    }

    let pending = match services.governance.list_pending() {
        Ok(pending) => pending,
        Err(e) => return pipeline_error_to_response(e),
    };

    let items: Vec<_> = pending.iter().map(pending_summary).collect();
    (StatusCode::OK, Json(json!({ "pending": items }))).into_response()
}

/// POST /admin/gurus/:id/review
pub async fn begin_review(
    Extension(services): Extension<AppServices>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = require_admin(&ctx) {
        return resp;
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .governance
        .begin_review(id, ctx.principal_id(), Utc::now())
    {
        Ok(principal) => (StatusCode::OK, Json(guru_summary(&principal))).into_response(),
        Err(e) => pipeline_error_to_response(e),
    }
}

/// POST /admin/gurus/:id/approve
pub async fn approve(
    Extension(services): Extension<AppServices>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<ApproveRequest>,
) -> Response {
    if let Err(resp) = require_admin(&ctx) {
        return resp;
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .governance
        .approve(id, ctx.principal_id(), body.notes, Utc::now())
    {
        Ok(principal) => (StatusCode::OK, Json(guru_summary(&principal))).into_response(),
        Err(e) => pipeline_error_to_response(e),
    }
}

/// POST /admin/gurus/:id/reject
pub async fn reject(
    Extension(services): Extension<AppServices>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<RejectRequest>,
) -> Response {
    if let Err(resp) = require_admin(&ctx) {
        return resp;
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .governance
        .reject(id, ctx.principal_id(), body.reason, Utc::now())
    {
        Ok(principal) => (StatusCode::OK, Json(guru_summary(&principal))).into_response(),
        Err(e) => pipeline_error_to_response(e),
    }
}

/// POST /admin/gurus/:id/status (suspend or activate)
pub async fn set_status(
    Extension(services): Extension<AppServices>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(change): Json<StatusChange>,
) -> Response {
    if let Err(resp) = require_admin(&ctx) {
        return resp;
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .governance
        .set_status(id, ctx.principal_id(), change, Utc::now())
    {
        Ok(principal) => (StatusCode::OK, Json(guru_summary(&principal))).into_response(),
        Err(e) => pipeline_error_to_response(e),
    }
}

/// POST /admin/gurus/:id/notes
pub async fn add_note(
    Extension(services): Extension<AppServices>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<AddNoteRequest>,
) -> Response {
    if let Err(resp) = require_admin(&ctx) {
        return resp;
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .governance
        .add_note(id, ctx.principal_id(), body.note, Utc::now())
    {
        Ok(principal) => {
            let notes = principal
                .application
                .as_ref()
                .map(|app| app.admin_notes.len())
                .unwrap_or(0);
            (StatusCode::OK, Json(json!({ "id": principal.id, "notes": notes }))).into_response()
        }
        Err(e) => pipeline_error_to_response(e),
    }
}

/// POST /admin/principals/:id/ban
pub async fn ban(
    Extension(services): Extension<AppServices>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<BanRequest>,
) -> Response {
    if let Err(resp) = require_admin(&ctx) {
        return resp;
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .governance
        .ban(id, ctx.principal_id(), body.reason, body.ends_at, Utc::now())
    {
        Ok(principal) => (StatusCode::OK, Json(json!({ "id": principal.id, "banned": true })))
            .into_response(),
        Err(e) => pipeline_error_to_response(e),
    }
}

/// POST /admin/principals/:id/ban/lift
pub async fn lift_ban(
    Extension(services): Extension<AppServices>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = require_admin(&ctx) {
        return resp;
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.governance.lift_ban(id, ctx.principal_id(), Utc::now()) {
        Ok(principal) => (StatusCode::OK, Json(json!({ "id": principal.id, "banned": false })))
            .into_response(),
        Err(e) => pipeline_error_to_response(e),
    }
}

/// GET /admin/stats
pub async fn stats(
    Extension(services): Extension<AppServices>,
    Extension(ctx): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = require_reviewer(&ctx) {
        return resp;
    }

    match services.governance.stats() {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => pipeline_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// View helpers
// ─────────────────────────────────────────────────────────────────────────────

fn pending_summary(principal: &Principal) -> serde_json::Value {
    let app = principal.application.as_ref();
    json!({
        "id": principal.id,
        "email": principal.email,
        "username": principal.username,
        "display_name": principal.display_name,
        "status": app.map(|a| a.status),
        "submitted_at": app.and_then(|a| a.submitted_at),
        "experience_years": app.and_then(|a| a.profile.experience_years),
        "subjects": app.map(|a| a.profile.subjects.clone()),
        "education": app.map(|a| a.profile.education.clone()),
        "verification_level": app.map(|a| a.profile.verification_level),
    })
}

fn guru_summary(principal: &Principal) -> serde_json::Value {
    let app = principal.application.as_ref();
    json!({
        "id": principal.id,
        "email": principal.email,
        "username": principal.username,
        "is_active": principal.is_active,
        "status": app.map(|a| a.status),
        "account": app.map(|a| a.account),
        "reviewed_by": app.and_then(|a| a.reviewed_by),
        "reviewed_at": app.and_then(|a| a.reviewed_at),
        "rejection_reason": app.and_then(|a| a.rejection_reason.clone()),
        "approval_notes": app.and_then(|a| a.approval_notes.clone()),
        "suspension_reason": app.and_then(|a| a.suspension.as_ref().map(|s| s.reason.clone())),
    })
}
