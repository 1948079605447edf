use gurukul_core::PrincipalId;
use gurukul_identity::{Principal, Role};

/// Authenticated request context: the live principal record plus the raw
/// bearer token (needed again at logout to revoke it).
///
/// The record is resolved fresh by the middleware on every request, never
/// cached across requests, so admin actions (suspension, bans) bite on the
/// very next call.
#[derive(Debug, Clone)]
pub struct PrincipalContext {
    principal: Principal,
    access_token: String,
}

impl PrincipalContext {
    pub fn new(principal: Principal, access_token: String) -> Self {
        Self {
            principal,
            access_token,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal.id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}
