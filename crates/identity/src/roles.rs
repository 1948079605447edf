use serde::{Deserialize, Serialize};

/// Role of a principal.
///
/// Roles are a closed set here (unlike tag-style capability dimensions, which
/// live on the guru profile): the lifecycle and governance rules branch on
/// them, so an open string type would push exhaustiveness checks to runtime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Guru,
    Admin,
    Moderator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Guru => "guru",
            Role::Admin => "admin",
            Role::Moderator => "moderator",
        }
    }

    /// Roles allowed to drive the governance workflow.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Roles allowed read access to governance views (queues, stats).
    pub fn can_review(&self) -> bool {
        matches!(self, Role::Admin | Role::Moderator)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
