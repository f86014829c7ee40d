//! Role-based access to functional areas of the application.
//!
//! This is ordinary business authorization and is independent of tenant
//! isolation: a manager of tenant 3 may manage suppliers, but only tenant 3's.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::principal::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Sales,
    Products,
    Inventory,
    Suppliers,
    Reports,
    Finance,
    Configuration,
}

impl Area {
    pub const ALL: [Area; 7] = [
        Area::Sales,
        Area::Products,
        Area::Inventory,
        Area::Suppliers,
        Area::Reports,
        Area::Finance,
        Area::Configuration,
    ];

    fn minimum_role(self) -> Role {
        match self {
            Area::Sales => Role::Cashier,
            Area::Products | Area::Inventory => Role::Supervisor,
            Area::Suppliers | Area::Reports => Role::Manager,
            Area::Finance | Area::Configuration => Role::TenantAdmin,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PermissionChecker {
    role: Role,
}

impl PermissionChecker {
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    pub fn can(&self, area: Area) -> bool {
        self.role.at_least(area.minimum_role())
    }

    pub fn can_write(&self, area: Area) -> bool {
        // Cashiers record sales but never edit catalog or stock data.
        self.can(area) && (area != Area::Sales || self.role.at_least(Role::Supervisor))
    }

    pub fn effective_areas(&self) -> HashSet<Area> {
        Area::ALL.into_iter().filter(|area| self.can(*area)).collect()
    }
}

impl From<Role> for PermissionChecker {
    fn from(role: Role) -> Self {
        Self::new(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cashier_only_reaches_sales() {
        let checker = PermissionChecker::new(Role::Cashier);
        assert_eq!(checker.effective_areas(), HashSet::from([Area::Sales]));
        assert!(!checker.can_write(Area::Sales));
    }

    #[test]
    fn manager_reaches_suppliers_but_not_finance() {
        let checker = PermissionChecker::from(Role::Manager);
        assert!(checker.can(Area::Suppliers));
        assert!(checker.can_write(Area::Suppliers));
        assert!(!checker.can(Area::Finance));
    }

    #[test]
    fn tenant_admin_reaches_every_area() {
        let checker = PermissionChecker::new(Role::TenantAdmin);
        assert_eq!(checker.effective_areas().len(), Area::ALL.len());
    }
}
