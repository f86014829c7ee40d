//! Hornero core - tenant isolation for a multi-tenant bakery platform
//!
//! This crate provides:
//! - Tenant and principal domain types
//! - The super-admin allow-list
//! - The per-request tenant context
//! - Tenant-scoped query building and typed repositories
//! - Post-fetch ownership verification

pub mod context;
pub mod entities;
pub mod error;
pub mod memory;
pub mod permission;
pub mod policy;
pub mod principal;
pub mod query;
pub mod scope;
pub mod tenant;
pub mod verify;

pub use context::{ContextCell, ContextError, RequestContext, ResolutionSource, TenantAccess};
pub use error::{ScopeError, ScopeResult, StoreError, TenantSecurityViolation};
pub use policy::{PolicyError, SuperAdminPolicy};
pub use principal::{Principal, PrincipalId, Role};
pub use tenant::{Plan, Tenant, TenantError, TenantId};
pub use verify::OwnershipVerifier;

/// Prelude for common imports
pub mod prelude {
    pub use crate::context::{ContextCell, RequestContext, ResolutionSource, TenantAccess};
    pub use crate::error::{ScopeError, ScopeResult, TenantSecurityViolation};
    pub use crate::query::{Assignments, Filter, Value};
    pub use crate::scope::{Entity, Repository, ScopedQueryBuilder, Store};
    pub use crate::tenant::TenantId;
    pub use crate::verify::OwnershipVerifier;
}

pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");
