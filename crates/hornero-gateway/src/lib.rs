//! Hornero Gateway
//!
//! This crate implements the HTTP surface of the Hornero platform:
//! - Configuration and startup validation
//! - Session authentication
//! - Tenant resolution and the access guard
//! - Tenant-scoped API routes
//! - Persistence backends and metrics

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod router;
pub mod state;
pub mod tenancy;

pub use auth::{AuthError, JwtConfig, PrincipalDirectory, Session, SessionClaims, SESSION_COOKIE};
pub use config::{ConfigError, GatewayConfig};
pub use error::ApiError;
pub use router::build_routes;
pub use state::AppState;
pub use tenancy::{Tenancy, TenantRegistry};

/// Gateway version
pub const GATEWAY_VERSION: &str = env!("CARGO_PKG_VERSION");
