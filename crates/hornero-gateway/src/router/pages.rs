//! Pages reachable without a tenant context.

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    response::Html,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;
use crate::tenancy::{DenyReason, RequestDescriptor, Resolution};

const GENERIC_DENIAL: &str = "No tienes acceso a esta sección.";

#[derive(Debug, Default, Deserialize)]
pub struct SafePageQuery {
    pub motivo: Option<String>,
}

pub async fn login() -> Html<&'static str> {
    Html("<h1>Iniciar sesión</h1><p>Ingresa con tu usuario de Hornero.</p>")
}

/// Target of every guard denial. Only known reason codes are rendered.
pub async fn access_denied(Query(query): Query<SafePageQuery>) -> (StatusCode, Html<String>) {
    let message = query
        .motivo
        .as_deref()
        .and_then(DenyReason::from_code)
        .map_or(GENERIC_DENIAL, |reason| reason.message());
    (
        StatusCode::FORBIDDEN,
        Html(format!("<h1>Acceso denegado</h1><p>{message}</p>")),
    )
}

pub async fn subscription_expired() -> (StatusCode, Html<&'static str>) {
    (
        StatusCode::PAYMENT_REQUIRED,
        Html("<h1>Suscripción vencida</h1><p>Renueva tu plan para seguir usando Hornero.</p>"),
    )
}

/// Public branding probe: which bakery does this host, header or session
/// point at. Nothing beyond name, slug and plan is exposed.
pub async fn tenant_info(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<Value>, ApiError> {
    let (parts, _body) = request.into_parts();
    let descriptor = RequestDescriptor::from_parts(&parts);

    let (tenant_id, source) = match state.resolver().resolve(&descriptor).await? {
        Resolution::SuperAdmin => return Ok(Json(json!({ "superAdmin": true }))),
        Resolution::Tenant { tenant_id, source } => (tenant_id, source),
        Resolution::Unresolved => return Err(ApiError::TenantNotFound),
    };

    let tenant = state
        .tenants
        .get(tenant_id)
        .await?
        .filter(|tenant| tenant.is_active)
        .ok_or(ApiError::TenantNotFound)?;

    Ok(Json(json!({
        "id": tenant.id,
        "name": tenant.name,
        "subdomain": tenant.subdomain,
        "plan": tenant.plan,
        "source": source.as_str(),
    })))
}
