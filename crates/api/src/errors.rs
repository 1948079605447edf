//! Error → HTTP response mapping.
//!
//! Every domain outcome is a typed, user-safe response; only backing-store
//! failures surface as 5xx.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use gurukul_identity::{AuthzError, LoginDenial};
use gurukul_infra::PipelineError;
use gurukul_sessions::RegistryError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn pipeline_error_to_response(err: PipelineError) -> axum::response::Response {
    match err {
        PipelineError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        PipelineError::InvalidTransition(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition", msg)
        }
        PipelineError::StaleState(msg) => json_error(StatusCode::CONFLICT, "stale_state", msg),
        PipelineError::DuplicateIdentity(msg) => {
            json_error(StatusCode::CONFLICT, "duplicate_identity", msg)
        }
        PipelineError::InvalidToken => {
            json_error(StatusCode::BAD_REQUEST, "invalid_token", "invalid token")
        }
        PipelineError::ExpiredToken => {
            json_error(StatusCode::BAD_REQUEST, "expired_token", "token has expired")
        }
        PipelineError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        PipelineError::Unauthorized => {
            json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized")
        }
        PipelineError::StoreUnavailable => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_unavailable",
            "directory unavailable",
        ),
    }
}

/// Bearer-token failures are all 401; the code tells the client whether a
/// re-login or just a refresh is in order.
pub fn registry_error_to_response(err: RegistryError) -> axum::response::Response {
    let code = match err {
        RegistryError::Expired => "token_expired",
        RegistryError::Revoked => "token_revoked",
        RegistryError::PasswordChanged => "password_changed",
        RegistryError::InvalidRefreshToken => "invalid_refresh_token",
        RegistryError::InvalidToken => "unauthenticated",
        RegistryError::Store(_) => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_unavailable",
                "session store unavailable",
            )
        }
    };
    json_error(StatusCode::UNAUTHORIZED, code, err.to_string())
}

pub fn authz_error_to_response(err: AuthzError) -> axum::response::Response {
    let AuthzError::Forbidden(requirement) = &err;
    (
        StatusCode::FORBIDDEN,
        axum::Json(json!({
            "error": "forbidden",
            "message": err.to_string(),
            "unmet_requirement": requirement,
        })),
    )
        .into_response()
}

/// Login denials are 403 with the structured reason the UI branches on.
pub fn denial_response(denial: LoginDenial) -> axum::response::Response {
    (
        StatusCode::FORBIDDEN,
        axum::Json(json!({
            "error": "login_denied",
            "message": denial.message(),
            "denial": denial,
        })),
    )
        .into_response()
}
