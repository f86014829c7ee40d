//! Handler-side access to the request context.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::request::Parts;
use axum::extract::FromRequestParts;
use hornero_core::{ContextCell, ContextError, RequestContext, TenantAccess};

use crate::error::ApiError;

/// The context established by the access guard. Extraction fails on routes
/// the guard does not cover.
#[derive(Debug, Clone, Copy)]
pub struct Tenancy(pub RequestContext);

impl Tenancy {
    pub fn access(&self) -> TenantAccess {
        self.0.access()
    }

    pub fn context(&self) -> &RequestContext {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Tenancy
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<ContextCell>>()
            .and_then(|cell| cell.current().copied())
            .map(Tenancy)
            .ok_or(ApiError::Context(ContextError::NotEstablished))
    }
}
