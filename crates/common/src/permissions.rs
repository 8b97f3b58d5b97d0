//! Role-based capability checks.

use uuid::Uuid;

use crate::error::AppError;
use crate::types::UserRole;

/// All capabilities that can be checked in one place. Adding a new capability
/// here forces the compiler to ensure `check()` handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ManageTenant,
    ManageUsers,
    ManageRules,
    ManageJobs,
    ApprovePurchaseOrders,
    ReviewLogbook,
    ManageCrew,
    ManageFleet,
    RecordEngineHours,
    ManageDocuments,
    WriteLogbook,
    RequestPurchase,
    ViewFleet,
}

pub struct PermissionChecker;

impl PermissionChecker {
    /// Evaluate whether `role` may exercise `permission`. Admins pass every check.
    pub fn check(role: UserRole, permission: Permission) -> bool {
        use UserRole::*;

        if role == Admin {
            return true;
        }

        match permission {
            Permission::ManageTenant | Permission::ManageUsers => false,
            Permission::ManageRules | Permission::ManageJobs => role == Manager,
            Permission::ApprovePurchaseOrders
            | Permission::ReviewLogbook
            | Permission::ManageCrew => matches!(role, Manager | Captain),
            Permission::ManageFleet | Permission::ManageDocuments => {
                matches!(role, Manager | Captain | ChiefEngineer)
            }
            Permission::RecordEngineHours => {
                matches!(role, Manager | Captain | ChiefEngineer | Engineer)
            }
            Permission::WriteLogbook | Permission::RequestPurchase | Permission::ViewFleet => true,
        }
    }

    /// Like [`check`](Self::check) but returns `AppError::Forbidden` on denial.
    pub fn require(role: UserRole, permission: Permission) -> Result<(), AppError> {
        if Self::check(role, permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Role '{}' is not allowed to {:?}",
                role, permission
            )))
        }
    }
}

/// The authenticated caller a service operation runs on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub role: UserRole,
}

impl Actor {
    pub fn new(tenant_id: Uuid, user_id: Uuid, role: UserRole) -> Self {
        Self {
            tenant_id,
            user_id,
            role,
        }
    }

    pub fn can(&self, permission: Permission) -> bool {
        PermissionChecker::check(self.role, permission)
    }

    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        PermissionChecker::require(self.role, permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_passes_everything() {
        for permission in [
            Permission::ManageTenant,
            Permission::ManageUsers,
            Permission::ManageRules,
            Permission::ApprovePurchaseOrders,
            Permission::RecordEngineHours,
        ] {
            assert!(PermissionChecker::check(UserRole::Admin, permission));
        }
    }

    #[test]
    fn test_only_admin_manages_users() {
        assert!(!PermissionChecker::check(UserRole::Manager, Permission::ManageUsers));
        assert!(!PermissionChecker::check(UserRole::Captain, Permission::ManageTenant));
    }

    #[test]
    fn test_engineer_records_hours_but_cannot_approve() {
        assert!(PermissionChecker::check(
            UserRole::Engineer,
            Permission::RecordEngineHours
        ));
        assert!(!PermissionChecker::check(
            UserRole::Engineer,
            Permission::ApprovePurchaseOrders
        ));
        assert!(!PermissionChecker::check(UserRole::Engineer, Permission::ManageFleet));
    }

    #[test]
    fn test_crew_baseline() {
        assert!(PermissionChecker::check(UserRole::Crew, Permission::WriteLogbook));
        assert!(PermissionChecker::check(UserRole::Crew, Permission::RequestPurchase));
        assert!(!PermissionChecker::check(UserRole::Crew, Permission::RecordEngineHours));
        assert!(!PermissionChecker::check(UserRole::Crew, Permission::ReviewLogbook));
    }

    #[test]
    fn test_require_maps_to_forbidden() {
        let err = PermissionChecker::require(UserRole::Crew, Permission::ManageRules).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(PermissionChecker::require(UserRole::Manager, Permission::ManageRules).is_ok());
    }
}
