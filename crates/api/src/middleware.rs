//! Bearer authentication middleware.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use gurukul_identity::login_gate;
use gurukul_infra::PrincipalDirectory;

use crate::app::AppServices;
use crate::context::PrincipalContext;
use crate::errors::{denial_response, json_error, registry_error_to_response};

/// Authenticate the bearer token and resolve the **live** principal record.
///
/// The full validity rule runs here (signature, expiry, revocation set,
/// password-change cutoff), then the account gate: a suspension or ban
/// committed a moment ago denies this request, not some later one.
pub async fn auth_middleware(
    State(services): State<AppServices>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())?;
    let now = Utc::now();

    let claims = services
        .registry
        .peek(token)
        .map_err(registry_error_to_response)?;

    let principal = services.directory.load(claims.sub).map_err(|_| {
        json_error(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "unknown principal",
        )
    })?;

    services
        .registry
        .check_access(token, principal.credentials.password_changed_at, now)
        .map_err(registry_error_to_response)?;

    login_gate(&principal, now).map_err(denial_response)?;

    let token = token.to_string();
    req.extensions_mut()
        .insert(PrincipalContext::new(principal, token));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, Response> {
    let unauthenticated =
        || json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "missing bearer token");

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(unauthenticated)?;

    let header = header.to_str().map_err(|_| unauthenticated())?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(unauthenticated)?
        .trim();

    if token.is_empty() {
        return Err(unauthenticated());
    }

    Ok(token)
}
