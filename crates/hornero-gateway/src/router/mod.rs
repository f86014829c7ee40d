//! HTTP routes of the Hornero gateway
//!
//! Public routes (health, metrics, the login/safe/expired pages and the
//! tenant branding probe) sit outside the access guard. Everything under
//! `/api` is guarded.

mod pages;
mod suppliers;

use axum::{
    extract::{Path, State},
    middleware,
    routing::get,
    Json, Router,
};
use hornero_core::permission::{Area, PermissionChecker};
use hornero_core::query::Filter;
use hornero_core::scope::{list_named, Row};
use serde_json::{json, Value};

use crate::auth::{authenticate, Session};
use crate::error::ApiError;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::tenancy::{access_guard, Tenancy};

/// Build the main router for the gateway
pub fn build_routes(state: AppState) -> Router {
    let config = state.config.clone();

    let guarded = Router::new()
        .route("/api/context", get(current_context))
        .route(
            "/api/proveedores",
            get(suppliers::list).post(suppliers::create),
        )
        .route(
            "/api/proveedores/:id",
            get(suppliers::show)
                .put(suppliers::update)
                .delete(suppliers::remove),
        )
        .route("/api/tablas/:tabla", get(list_table))
        .route_layer(middleware::from_fn_with_state(state.clone(), access_guard));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/tenant-info", get(pages::tenant_info))
        .route(&config.login_path, get(pages::login))
        .route(&config.safe_path, get(pages::access_denied))
        .route(&config.expired_path, get(pages::subscription_expired))
        .merge(guarded)
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Role check for business areas. Super-admins may use every area.
pub(crate) fn authorize(
    tenancy: &Tenancy,
    session: &Session,
    area: Area,
    write: bool,
) -> Result<(), ApiError> {
    if tenancy.context().is_super_admin() {
        return Ok(());
    }
    let checker = PermissionChecker::from(session.principal.role);
    let allowed = if write {
        checker.can_write(area)
    } else {
        checker.can(area)
    };
    if allowed {
        Ok(())
    } else {
        tracing::debug!(
            principal = %session.principal.id,
            role = %session.principal.role,
            ?area,
            write,
            "role check failed"
        );
        Err(ApiError::Forbidden(format!(
            "role '{}' may not {} {area:?}",
            session.principal.role,
            if write { "modify" } else { "view" }
        )))
    }
}

async fn current_context(tenancy: Tenancy, session: Session) -> Json<Value> {
    let access = tenancy.access();
    Json(json!({
        "tenantId": access.tenant_id,
        "isSuperAdmin": access.is_super_admin,
        "source": tenancy.context().source().as_str(),
        "username": session.principal.username,
        "role": session.principal.role,
    }))
}

/// Lists any allow-listed table. Used by report exports.
async fn list_table(
    State(state): State<AppState>,
    tenancy: Tenancy,
    session: Session,
    Path(table): Path<String>,
) -> Result<Json<Vec<Row>>, ApiError> {
    authorize(&tenancy, &session, Area::Reports, false)?;
    let rows = list_named(
        state.store.as_ref(),
        tenancy.context(),
        &state.entities,
        &table,
        Filter::new(),
    )
    .await?;
    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header::LOCATION, Request, StatusCode};
    use hornero_core::memory::MemoryStore;
    use tower::ServiceExt;

    use crate::config::GatewayConfig;
    use crate::db::{MemoryPrincipalDirectory, MemoryTenantRegistry};

    fn app() -> Router {
        let state = AppState::new(
            GatewayConfig::with_secret("test_secret_key_that_is_long_enough"),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryTenantRegistry::new()),
            Arc::new(MemoryPrincipalDirectory::new()),
        )
        .unwrap();
        build_routes(state)
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn guarded_routes_redirect_anonymous_requests_to_login() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/proveedores")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/login");
    }

    #[tokio::test]
    async fn safe_page_is_reachable_without_a_session() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/acceso-denegado?motivo=usuario_sin_panaderia")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
