use crate::types::UserRole;
use uuid::Uuid;

/// Represents the authenticated caller for the current operation.
///
/// Produced by the identity layer outside this crate; the core only uses it
/// for attribution (uploaded_by) and exposes the role for callers that gate
/// admin-only operations.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The ID of the authenticated user
    pub user_id: Uuid,

    /// The role of the authenticated user
    pub role: UserRole,
}

impl AuthContext {
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self { user_id, role }
    }

    /// Context for internal system operations (seeding, maintenance).
    pub fn internal_system_context() -> Self {
        Self {
            user_id: Uuid::nil(),
            role: UserRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
