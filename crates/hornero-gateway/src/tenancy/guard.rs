//! Access guard
//!
//! Runs in front of every tenant-scoped route. A request leaves the guard
//! either with an established [`ContextCell`] in its extensions or as a `303`
//! redirect to the login, safe or subscription-expired page. Those pages are
//! mounted outside the guard.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use futures::FutureExt;
use hornero_core::{ContextCell, RequestContext, TenantId};

use crate::auth::Session;
use crate::metrics::GUARD_OUTCOMES;
use crate::state::AppState;
use crate::tenancy::resolve::Resolution;

/// Why an authenticated request could not be tied to a tenant. The code is
/// passed to the safe page as `?motivo=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingTenant,
    UnknownTenant,
    InactiveTenant,
    RegistryUnavailable,
    ResolutionFailed,
    ContextConflict,
}

impl DenyReason {
    pub const ALL: [DenyReason; 6] = [
        DenyReason::MissingTenant,
        DenyReason::UnknownTenant,
        DenyReason::InactiveTenant,
        DenyReason::RegistryUnavailable,
        DenyReason::ResolutionFailed,
        DenyReason::ContextConflict,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingTenant => "usuario_sin_panaderia",
            DenyReason::UnknownTenant => "panaderia_desconocida",
            DenyReason::InactiveTenant => "panaderia_inactiva",
            DenyReason::RegistryUnavailable => "registro_no_disponible",
            DenyReason::ResolutionFailed => "error_resolucion",
            DenyReason::ContextConflict => "contexto_inconsistente",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|reason| reason.as_str() == code)
    }

    /// Text shown to the user on the safe page.
    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::MissingTenant => "Tu usuario no está asociado a ninguna panadería.",
            DenyReason::UnknownTenant => "La panadería asociada a tu usuario no existe.",
            DenyReason::InactiveTenant => "La panadería asociada a tu usuario está desactivada.",
            DenyReason::RegistryUnavailable | DenyReason::ResolutionFailed => {
                "No se pudo verificar tu panadería. Intenta nuevamente más tarde."
            }
            DenyReason::ContextConflict => "Se detectó una inconsistencia en tu sesión.",
        }
    }
}

enum Admission {
    Granted(RequestContext),
    Denied(DenyReason),
    SubscriptionExpired(TenantId),
}

fn record(outcome: &str) {
    GUARD_OUTCOMES.with_label_values(&[outcome]).inc();
}

pub async fn access_guard(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(session) = request.extensions().get::<Session>().cloned() else {
        tracing::debug!(path = %request.uri().path(), "unauthenticated request, redirecting to login");
        record("unauthenticated");
        return Redirect::to(&state.config.login_path).into_response();
    };

    let admission = AssertUnwindSafe(admit(&state, &session))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            tracing::error!(
                principal = %session.principal.id,
                "tenant resolution panicked; treating the request as unresolved"
            );
            Admission::Denied(DenyReason::ResolutionFailed)
        });

    let context = match admission {
        Admission::Granted(context) => context,
        Admission::Denied(reason) => return deny(&state, &session, &request, reason),
        Admission::SubscriptionExpired(tenant_id) => {
            tracing::info!(%tenant_id, principal = %session.principal.id, "subscription expired");
            record("subscription_expired");
            return Redirect::to(&state.config.expired_path).into_response();
        }
    };

    let cell = request
        .extensions()
        .get::<Arc<ContextCell>>()
        .cloned()
        .unwrap_or_default();
    if cell.establish(context).is_err() {
        return deny(&state, &session, &request, DenyReason::ContextConflict);
    }
    record(if context.is_super_admin() { "super_admin" } else { "tenant" });
    request.extensions_mut().insert(cell);

    next.run(request).await
}

fn deny(state: &AppState, session: &Session, request: &Request, reason: DenyReason) -> Response {
    tracing::warn!(
        principal = %session.principal.id,
        username = %session.principal.username,
        path = %request.uri().path(),
        reason = reason.as_str(),
        "request has no valid tenant; redirecting to the safe page"
    );
    record(reason.as_str());
    Redirect::to(&format!("{}?motivo={}", state.config.safe_path, reason.as_str())).into_response()
}

/// Only the principal's own identity counts here. Session, host and header
/// hints never give a tenant to a principal that lacks one.
async fn admit(state: &AppState, session: &Session) -> Admission {
    let principal = &session.principal;
    let (tenant_id, source) = match state.resolver().for_principal(principal) {
        Some(Resolution::SuperAdmin) => return Admission::Granted(RequestContext::super_admin()),
        Some(Resolution::Tenant { tenant_id, source }) => (tenant_id, source),
        Some(Resolution::Unresolved) | None => return Admission::Denied(DenyReason::MissingTenant),
    };

    if let Some(session_tenant) = session.session_tenant.filter(|t| *t != tenant_id) {
        tracing::warn!(
            target: "hornero::security",
            principal = %principal.id,
            %tenant_id,
            %session_tenant,
            "session tenant disagrees with the principal's tenant; ignoring the session value"
        );
    }

    match state.tenants.get(tenant_id).await {
        Ok(Some(tenant)) if !tenant.is_active => Admission::Denied(DenyReason::InactiveTenant),
        Ok(Some(tenant)) if !tenant.is_subscription_current(Utc::now()) => {
            Admission::SubscriptionExpired(tenant_id)
        }
        Ok(Some(_)) => Admission::Granted(RequestContext::for_tenant(tenant_id, source)),
        Ok(None) => Admission::Denied(DenyReason::UnknownTenant),
        Err(err) => {
            tracing::warn!(%tenant_id, error = %err, "tenant registry lookup failed");
            Admission::Denied(DenyReason::RegistryUnavailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_round_trip() {
        for reason in DenyReason::ALL {
            assert_eq!(DenyReason::from_code(reason.as_str()), Some(reason));
        }
        assert_eq!(DenyReason::from_code("<script>"), None);
    }
}
