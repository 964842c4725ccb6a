//! Static role → permission table.
//!
//! Every room action is checked against this table; there is no per-room
//! customisation of roles.

use crate::models::Role;
use serde::{Deserialize, Serialize};

/// Actions gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageRoom,
    DeleteRoom,
    ManageMembers,
    ManageRoles,
    ManageInvitations,
    ManagePeriods,
    ManageMeals,
    ManageShopping,
    ApproveShopping,
    ManageMarketSchedule,
    ManagePayments,
    ManageExpenses,
    ManageTransactions,
    CreateVotes,
    CloseVotes,
    ViewReports,
    ExportData,
    ImportData,
}

impl Permission {
    pub const ALL: &'static [Permission] = &[
        Permission::ManageRoom,
        Permission::DeleteRoom,
        Permission::ManageMembers,
        Permission::ManageRoles,
        Permission::ManageInvitations,
        Permission::ManagePeriods,
        Permission::ManageMeals,
        Permission::ManageShopping,
        Permission::ApproveShopping,
        Permission::ManageMarketSchedule,
        Permission::ManagePayments,
        Permission::ManageExpenses,
        Permission::ManageTransactions,
        Permission::CreateVotes,
        Permission::CloseVotes,
        Permission::ViewReports,
        Permission::ExportData,
        Permission::ImportData,
    ];
}

impl Role {
    /// Whether this role grants `permission`
    pub fn has(&self, permission: Permission) -> bool {
        use Permission::*;
        match self {
            Role::Admin => true,
            Role::Manager => !matches!(permission, DeleteRoom | ManageRoles),
            Role::MealManager => matches!(permission, ManageMeals | ViewReports | CreateVotes),
            Role::Accountant => matches!(
                permission,
                ManagePayments
                    | ManageExpenses
                    | ManageTransactions
                    | ViewReports
                    | ExportData
                    | CreateVotes
            ),
            Role::MarketManager => matches!(
                permission,
                ManageShopping | ApproveShopping | ManageMarketSchedule | ViewReports | CreateVotes
            ),
            Role::Member => matches!(permission, ViewReports | CreateVotes),
        }
    }

    /// All permissions granted by this role
    pub fn permissions(&self) -> Vec<Permission> {
        Permission::ALL
            .iter()
            .copied()
            .filter(|p| self.has(*p))
            .collect()
    }

    /// Seniority used when one member acts on another (higher outranks lower)
    pub fn rank(&self) -> u8 {
        match self {
            Role::Admin => 3,
            Role::Manager => 2,
            Role::MealManager | Role::Accountant | Role::MarketManager => 1,
            Role::Member => 0,
        }
    }

    /// Whether a member holding this role may hand out `target`
    pub fn can_assign(&self, target: Role) -> bool {
        match self {
            Role::Admin => true,
            Role::Manager => !matches!(target, Role::Admin | Role::Manager),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_has_everything() {
        assert_eq!(Role::Admin.permissions().len(), Permission::ALL.len());
    }

    #[test]
    fn test_manager_cannot_delete_room_or_manage_roles() {
        assert!(!Role::Manager.has(Permission::DeleteRoom));
        assert!(!Role::Manager.has(Permission::ManageRoles));
        assert!(Role::Manager.has(Permission::ManagePeriods));
        assert!(Role::Manager.has(Permission::ImportData));
        assert_eq!(Role::Manager.permissions().len(), Permission::ALL.len() - 2);
    }

    #[test]
    fn test_specialist_roles() {
        assert_eq!(
            Role::MealManager.permissions(),
            vec![
                Permission::ManageMeals,
                Permission::CreateVotes,
                Permission::ViewReports
            ]
        );
        assert!(Role::Accountant.has(Permission::ManagePayments));
        assert!(Role::Accountant.has(Permission::ExportData));
        assert!(!Role::Accountant.has(Permission::ManageMeals));
        assert!(Role::MarketManager.has(Permission::ApproveShopping));
        assert!(!Role::MarketManager.has(Permission::ManagePayments));
    }

    #[test]
    fn test_member_is_read_mostly() {
        assert_eq!(
            Role::Member.permissions(),
            vec![Permission::CreateVotes, Permission::ViewReports]
        );
    }

    #[test]
    fn test_role_assignment() {
        assert!(Role::Admin.can_assign(Role::Admin));
        assert!(Role::Manager.can_assign(Role::Accountant));
        assert!(!Role::Manager.can_assign(Role::Manager));
        assert!(!Role::Manager.can_assign(Role::Admin));
        assert!(!Role::Accountant.can_assign(Role::Member));
    }

    #[test]
    fn test_rank_ordering() {
        assert!(Role::Admin.rank() > Role::Manager.rank());
        assert!(Role::Manager.rank() > Role::Accountant.rank());
        assert!(Role::MealManager.rank() > Role::Member.rank());
    }
}
