//! Per-request tenant context.
//!
//! A [`ContextCell`] is created for each inbound request, established exactly
//! once by the access guard, and dropped with the request. It is never stored
//! in thread-local or process-wide state.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tenant::TenantId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("request context has not been established")]
    NotEstablished,
    #[error("request context already established as {established}, refusing {attempted}")]
    Conflict {
        established: RequestContext,
        attempted: RequestContext,
    },
}

/// Where the tenant identity of a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    AuthenticatedUser,
    Session,
    Subdomain,
    Header,
    SuperAdminPolicy,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::AuthenticatedUser => "authenticated_user",
            ResolutionSource::Session => "session",
            ResolutionSource::Subdomain => "subdomain",
            ResolutionSource::Header => "header",
            ResolutionSource::SuperAdminPolicy => "super_admin_policy",
        }
    }
}

/// Resolved identity of one request.
///
/// The constructors are the only way to build one, so a super-admin context
/// never carries a tenant id and a tenant context always does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    tenant_id: Option<TenantId>,
    super_admin: bool,
    source: ResolutionSource,
}

impl RequestContext {
    pub fn for_tenant(tenant_id: TenantId, source: ResolutionSource) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            super_admin: false,
            source,
        }
    }

    pub fn super_admin() -> Self {
        Self {
            tenant_id: None,
            super_admin: true,
            source: ResolutionSource::SuperAdminPolicy,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn is_super_admin(&self) -> bool {
        self.super_admin
    }

    pub fn source(&self) -> ResolutionSource {
        self.source
    }

    pub fn access(&self) -> TenantAccess {
        TenantAccess {
            tenant_id: self.tenant_id,
            is_super_admin: self.super_admin,
        }
    }

    /// Whether a record owned by `owner` is visible from this context.
    pub fn can_see(&self, owner: TenantId) -> bool {
        self.super_admin || self.tenant_id == Some(owner)
    }
}

impl std::fmt::Display for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.tenant_id {
            _ if self.super_admin => write!(f, "super-admin"),
            Some(id) => write!(f, "tenant {id} (via {})", self.source.as_str()),
            None => write!(f, "unscoped"),
        }
    }
}

/// What handlers see of the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantAccess {
    pub tenant_id: Option<TenantId>,
    pub is_super_admin: bool,
}

/// Write-once holder for the context of a single request.
#[derive(Debug, Default)]
pub struct ContextCell {
    inner: OnceLock<RequestContext>,
}

impl ContextCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// First writer wins. Establishing an identical context again is a no-op;
    /// a different one is logged as a consistency fault and rejected.
    pub fn establish(&self, context: RequestContext) -> Result<&RequestContext, ContextError> {
        let mut stored = false;
        let current = self.inner.get_or_init(|| {
            stored = true;
            context
        });

        if stored {
            tracing::debug!(context = %current, "request context established");
            return Ok(current);
        }

        if *current == context {
            return Ok(current);
        }

        tracing::error!(
            target: "hornero::security",
            established = %current,
            attempted = %context,
            "request context re-established with a different identity; keeping the first"
        );
        Err(ContextError::Conflict {
            established: *current,
            attempted: context,
        })
    }

    pub fn current(&self) -> Option<&RequestContext> {
        self.inner.get()
    }

    pub fn require(&self) -> Result<TenantAccess, ContextError> {
        self.current()
            .map(RequestContext::access)
            .ok_or(ContextError::NotEstablished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_fails_before_establish() {
        let cell = ContextCell::new();
        assert!(cell.current().is_none());
        assert_eq!(cell.require(), Err(ContextError::NotEstablished));
    }

    #[test]
    fn establish_then_require_exposes_tenant() {
        let cell = ContextCell::new();
        cell.establish(RequestContext::for_tenant(
            TenantId::new(3),
            ResolutionSource::AuthenticatedUser,
        ))
        .unwrap();

        assert_eq!(
            cell.require().unwrap(),
            TenantAccess {
                tenant_id: Some(TenantId::new(3)),
                is_super_admin: false,
            }
        );
    }

    #[test]
    fn super_admin_context_is_unscoped() {
        let ctx = RequestContext::super_admin();
        assert!(ctx.tenant_id().is_none());
        assert!(ctx.is_super_admin());
        assert!(ctx.can_see(TenantId::new(1)));
        assert!(ctx.can_see(TenantId::new(99)));
    }

    #[test]
    fn re_establishing_same_context_is_idempotent() {
        let cell = ContextCell::new();
        let ctx = RequestContext::for_tenant(TenantId::new(3), ResolutionSource::Session);
        cell.establish(ctx).unwrap();
        assert_eq!(cell.establish(ctx).unwrap(), &ctx);
    }

    #[test]
    fn conflicting_establish_keeps_first_value() {
        let cell = ContextCell::new();
        let first = RequestContext::for_tenant(TenantId::new(3), ResolutionSource::AuthenticatedUser);
        let second = RequestContext::for_tenant(TenantId::new(5), ResolutionSource::Header);
        cell.establish(first).unwrap();

        let err = cell.establish(second).unwrap_err();
        assert_eq!(
            err,
            ContextError::Conflict {
                established: first,
                attempted: second,
            }
        );
        assert_eq!(cell.current(), Some(&first));
    }

    #[test]
    fn escalating_to_super_admin_after_establish_is_rejected() {
        let cell = ContextCell::new();
        let tenant = RequestContext::for_tenant(TenantId::new(3), ResolutionSource::AuthenticatedUser);
        cell.establish(tenant).unwrap();

        assert!(cell.establish(RequestContext::super_admin()).is_err());
        assert!(!cell.current().unwrap().is_super_admin());
    }

    #[test]
    fn fresh_cell_does_not_inherit_previous_request() {
        {
            let cell = ContextCell::new();
            cell.establish(RequestContext::for_tenant(
                TenantId::new(2),
                ResolutionSource::AuthenticatedUser,
            ))
            .unwrap();
        }
        let next = ContextCell::new();
        assert!(next.current().is_none());
    }
}
