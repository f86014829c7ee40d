//! Authenticated principals.
//!
//! Principals are loaded by the authentication layer; this crate only reads
//! them. Super-admin status is never stored here, see [`crate::policy`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tenant::TenantId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoleError {
    #[error("unknown role: {0}")]
    Unknown(String),
}

/// Closed set of user roles, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "cajero")]
    Cashier,
    #[serde(rename = "supervisor")]
    Supervisor,
    #[serde(rename = "gerente")]
    Manager,
    #[serde(rename = "admin_cliente")]
    TenantAdmin,
    #[serde(rename = "super_admin")]
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Cashier => "cajero",
            Role::Supervisor => "supervisor",
            Role::Manager => "gerente",
            Role::TenantAdmin => "admin_cliente",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn at_least(&self, other: Role) -> bool {
        *self >= other
    }
}

impl std::str::FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cajero" => Ok(Role::Cashier),
            "supervisor" => Ok(Role::Supervisor),
            "gerente" => Ok(Role::Manager),
            "admin_cliente" => Ok(Role::TenantAdmin),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(RoleError::Unknown(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(i64);

impl PrincipalId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: PrincipalId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    /// `None` is only legitimate for super-admins.
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Principal {
    pub fn new(id: PrincipalId, username: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            username: username.into(),
            email: None,
            role,
            tenant_id: None,
            is_active: true,
        }
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    /// A principal that is not a super-admin but carries no tenant.
    pub fn is_misconfigured(&self, is_super_admin: bool) -> bool {
        !is_super_admin && self.tenant_id.is_none()
    }
}
