//! Tenant resolution, the access guard, and the context extractor.

pub mod extract;
pub mod guard;
pub mod resolve;

pub use extract::Tenancy;
pub use guard::{access_guard, DenyReason};
pub use resolve::{RequestDescriptor, Resolution, ResolveError, TenantRegistry, TenantResolver};
