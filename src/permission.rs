//! Role/action checks against a model's permission matrix.

use crate::config::{Action, PermissionMatrix, Role};

/// True iff `role` has an entry in `matrix` that grants `action` explicitly or carries `all`.
/// A role absent from the matrix is denied.
pub fn is_allowed(matrix: &PermissionMatrix, role: Role, action: Action) -> bool {
    match matrix.get(role) {
        Some(set) => set.all || set.actions.contains(&action),
        None => false,
    }
}
