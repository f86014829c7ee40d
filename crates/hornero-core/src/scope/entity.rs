//! Entity capabilities: which tables are tenant-owned and which are exempt.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::error::TenantSecurityViolation;
use crate::tenant::TenantId;

/// Column holding the owning tenant on every tenant-owned table.
pub const TENANT_COLUMN: &str = "panaderia_id";

/// Primary key column, assigned by the store.
pub const ID_COLUMN: &str = "id";

pub type RecordId = i64;

/// A stored row as the persistence layer hands it back.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tenancy {
    /// Carries [`TENANT_COLUMN`]; every access is scoped.
    Owned,
    /// Global table, deliberately shared by all tenants.
    Exempt,
}

/// A persisted entity type.
///
/// Implement it with [`tenant_owned!`](crate::tenant_owned) or
/// [`tenant_exempt!`](crate::tenant_exempt) so `TENANCY` and `owner` cannot
/// disagree.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const NAME: &'static str;
    const TABLE: &'static str;
    const TENANCY: Tenancy;

    fn id(&self) -> RecordId;

    /// `None` for exempt entities.
    fn owner(&self) -> Option<TenantId>;

    fn info() -> EntityInfo {
        EntityInfo {
            name: Self::NAME,
            table: Self::TABLE,
            tenancy: Self::TENANCY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityInfo {
    pub name: &'static str,
    pub table: &'static str,
    pub tenancy: Tenancy,
}

impl EntityInfo {
    pub fn is_owned(&self) -> bool {
        self.tenancy == Tenancy::Owned
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("table '{table}' registered twice ({first} and {second})")]
    DuplicateTable {
        table: &'static str,
        first: &'static str,
        second: &'static str,
    },
}

/// Startup-time allow-list of every table reachable by name.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entries: BTreeMap<&'static str, EntityInfo>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<E: Entity>(mut self) -> Result<Self, RegistryError> {
        let info = E::info();
        if let Some(existing) = self.entries.get(info.table) {
            return Err(RegistryError::DuplicateTable {
                table: info.table,
                first: existing.name,
                second: info.name,
            });
        }
        if info.tenancy == Tenancy::Exempt {
            tracing::info!(entity = info.name, table = info.table, "tenant-exempt entity registered");
        }
        self.entries.insert(info.table, info);
        Ok(self)
    }

    /// Unknown tables are a violation: a table missing from the allow-list
    /// is exactly the omission the registry exists to catch.
    pub fn lookup(&self, table: &str) -> Result<EntityInfo, TenantSecurityViolation> {
        self.entries.get(table).copied().ok_or_else(|| {
            TenantSecurityViolation::UnregisteredEntity {
                table: table.to_string(),
            }
            .logged()
        })
    }

    pub fn tables(&self) -> impl Iterator<Item = &EntityInfo> {
        self.entries.values()
    }
}

/// Implements [`Entity`] for a struct with `id: RecordId` and
/// `tenant_id: TenantId` fields.
#[macro_export]
macro_rules! tenant_owned {
    ($ty:ty, $name:literal, $table:literal) => {
        impl $crate::scope::Entity for $ty {
            const NAME: &'static str = $name;
            const TABLE: &'static str = $table;
            const TENANCY: $crate::scope::Tenancy = $crate::scope::Tenancy::Owned;

            fn id(&self) -> $crate::scope::RecordId {
                self.id
            }

            fn owner(&self) -> ::core::option::Option<$crate::tenant::TenantId> {
                ::core::option::Option::Some(self.tenant_id)
            }
        }
    };
}

/// Implements [`Entity`] for a global struct with an `id: RecordId` field.
#[macro_export]
macro_rules! tenant_exempt {
    ($ty:ty, $name:literal, $table:literal) => {
        impl $crate::scope::Entity for $ty {
            const NAME: &'static str = $name;
            const TABLE: &'static str = $table;
            const TENANCY: $crate::scope::Tenancy = $crate::scope::Tenancy::Exempt;

            fn id(&self) -> $crate::scope::RecordId {
                self.id
            }

            fn owner(&self) -> ::core::option::Option<$crate::tenant::TenantId> {
                ::core::option::Option::None
            }
        }
    };
}
