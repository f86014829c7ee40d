//! Tenant identity resolution
//!
//! Precedence, first match wins:
//! 1. super-admin per [`SuperAdminPolicy`]
//! 2. the authenticated principal's own tenant
//! 3. the tenant recorded in the session
//! 4. the `Host` subdomain (skipped for local hosts)
//! 5. the `tenant` query parameter, then the `X-Tenant-ID` header
//!
//! Steps 4 and 5 go through the [`TenantRegistry`] and only ever yield active
//! tenants. No step falls back to a default tenant.

use async_trait::async_trait;
use axum::http::request::Parts;
use hornero_core::{Principal, ResolutionSource, SuperAdminPolicy, Tenant, TenantId};

use crate::auth::tenant::{host_from_headers, tenant_from_headers, tenant_from_query, LocalHosts};
use crate::auth::Session;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("tenant registry unavailable: {0}")]
    Registry(String),
}

/// Lookup of tenants by slug or numeric id.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    /// Active tenant whose subdomain or decimal id equals `identifier`.
    async fn find_active(&self, identifier: &str) -> Result<Option<Tenant>, ResolveError>;
    /// Tenant by id, active or not.
    async fn get(&self, id: TenantId) -> Result<Option<Tenant>, ResolveError>;
}

/// Everything resolution may look at, detached from the request.
#[derive(Debug, Clone, Default)]
pub struct RequestDescriptor {
    pub host: Option<String>,
    pub tenant_header: Option<String>,
    pub tenant_query: Option<String>,
    pub session_tenant: Option<TenantId>,
    pub principal: Option<Principal>,
}

impl RequestDescriptor {
    pub fn from_parts(parts: &Parts) -> Self {
        let session = parts.extensions.get::<Session>();
        Self {
            host: host_from_headers(&parts.headers),
            tenant_header: tenant_from_headers(&parts.headers),
            tenant_query: tenant_from_query(&parts.uri),
            session_tenant: session.and_then(|s| s.session_tenant),
            principal: session.map(|s| s.principal.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    SuperAdmin,
    Tenant {
        tenant_id: TenantId,
        source: ResolutionSource,
    },
    Unresolved,
}

pub struct TenantResolver<'a> {
    registry: &'a dyn TenantRegistry,
    policy: &'a SuperAdminPolicy,
    local_hosts: &'a LocalHosts,
}

impl<'a> TenantResolver<'a> {
    pub fn new(
        registry: &'a dyn TenantRegistry,
        policy: &'a SuperAdminPolicy,
        local_hosts: &'a LocalHosts,
    ) -> Self {
        Self {
            registry,
            policy,
            local_hosts,
        }
    }

    /// Steps 1 and 2 only. `None` means the principal is neither a
    /// super-admin nor bound to a tenant.
    pub fn for_principal(&self, principal: &Principal) -> Option<Resolution> {
        if self.policy.is_super_admin(principal) {
            return Some(Resolution::SuperAdmin);
        }
        principal.tenant_id.map(|tenant_id| Resolution::Tenant {
            tenant_id,
            source: ResolutionSource::AuthenticatedUser,
        })
    }

    pub async fn resolve(&self, request: &RequestDescriptor) -> Result<Resolution, ResolveError> {
        if let Some(resolution) = request
            .principal
            .as_ref()
            .and_then(|principal| self.for_principal(principal))
        {
            return Ok(resolution);
        }

        if let Some(tenant_id) = request.session_tenant {
            return Ok(Resolution::Tenant {
                tenant_id,
                source: ResolutionSource::Session,
            });
        }

        if let Some(subdomain) = request
            .host
            .as_deref()
            .and_then(|host| self.local_hosts.subdomain_of(host))
        {
            return self.lookup(&subdomain, ResolutionSource::Subdomain).await;
        }

        match request
            .tenant_query
            .as_deref()
            .or(request.tenant_header.as_deref())
        {
            Some(identifier) => self.lookup(identifier, ResolutionSource::Header).await,
            None => Ok(Resolution::Unresolved),
        }
    }

    async fn lookup(
        &self,
        identifier: &str,
        source: ResolutionSource,
    ) -> Result<Resolution, ResolveError> {
        match self.registry.find_active(identifier).await? {
            Some(tenant) => Ok(Resolution::Tenant {
                tenant_id: tenant.id,
                source,
            }),
            None => {
                tracing::debug!(identifier, source = source.as_str(), "no active tenant matches");
                Ok(Resolution::Unresolved)
            }
        }
    }
}
