//! The static role/action permission matrix baked into the core.

use warden_types::{ActionType, Role};

/// Gate 5, role authority: does `role` have standing to issue `action_type`
/// at all? Destructive-action approval is a separate check (gate 6,
/// `approval`).
pub fn role_permits(role: Role, action_type: ActionType) -> bool {
    match role {
        Role::SuperAdmin => true,
        Role::SecurityAnalyst => true,
        Role::ItAdmin => !action_type.is_destructive(),
        Role::PolicyManager => false,
        Role::Auditor => false,
    }
}
