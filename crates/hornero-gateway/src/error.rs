//! HTTP error surface of the gateway.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hornero_core::{ContextError, ScopeError, StoreError, TenantSecurityViolation};
use serde_json::json;

use crate::metrics::TENANT_VIOLATIONS;
use crate::tenancy::ResolveError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("{entity} #{id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("no active tenant matches this request")]
    TenantNotFound,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Violation(#[from] TenantSecurityViolation),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ScopeError> for ApiError {
    fn from(err: ScopeError) -> Self {
        match err {
            ScopeError::Violation(violation) => ApiError::Violation(violation),
            ScopeError::Context(err) => ApiError::Context(err),
            ScopeError::Store(err) => ApiError::Store(err),
            err @ (ScopeError::TenantRequired { .. }
            | ScopeError::InvalidColumn(_)
            | ScopeError::ReservedColumn(_)
            | ScopeError::UnboundedMutation { .. }) => ApiError::Validation(err.to_string()),
            err @ ScopeError::Decode { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            ApiError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::TenantNotFound => (StatusCode::NOT_FOUND, "TENANT_NOT_FOUND"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::Violation(_) => (StatusCode::FORBIDDEN, "TENANT_SECURITY_VIOLATION"),
            ApiError::Context(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONTEXT_UNAVAILABLE"),
            ApiError::Resolve(_) => (StatusCode::SERVICE_UNAVAILABLE, "TENANT_REGISTRY_UNAVAILABLE"),
            ApiError::Store(_) | ApiError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            ApiError::Violation(violation) => {
                TENANT_VIOLATIONS.with_label_values(&[violation.kind()]).inc();
                "Access to this resource is not allowed".to_string()
            }
            ApiError::Store(_) | ApiError::Internal(_) | ApiError::Context(_) | ApiError::Resolve(_) => {
                tracing::error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hornero_core::TenantId;

    #[test]
    fn violations_map_to_forbidden_with_code() {
        let err = ApiError::from(ScopeError::Violation(TenantSecurityViolation::ForeignRecord {
            entity: "Supplier",
            record_id: 42,
            record_tenant: TenantId::new(5),
            context: "tenant 3 (via authenticated_user)".to_string(),
        }));
        assert_eq!(
            err.status_and_code(),
            (StatusCode::FORBIDDEN, "TENANT_SECURITY_VIOLATION")
        );
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn missing_tenant_on_super_admin_insert_is_validation() {
        let err = ApiError::from(ScopeError::TenantRequired { entity: "Supplier" });
        assert_eq!(err.status_and_code().0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn missing_context_is_internal() {
        let err = ApiError::from(ScopeError::Context(ContextError::NotEstablished));
        assert_eq!(err.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
