//! Tenant-scoped data access.

pub mod builder;
pub mod entity;
pub mod repository;

pub use builder::ScopedQueryBuilder;
pub use entity::{
    Entity, EntityInfo, EntityRegistry, RecordId, RegistryError, Row, Tenancy, ID_COLUMN,
    TENANT_COLUMN,
};
pub use repository::{list_named, Repository, Store};
