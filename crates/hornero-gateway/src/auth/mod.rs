//! Session authentication for the Hornero gateway
//!
//! Sessions are HS256 JWTs carried either in the `hornero_session` cookie or
//! in an `Authorization: Bearer` header. [`authenticate`] turns a valid token
//! into a [`Session`] in the request extensions; it never rejects a request
//! itself, the access guard decides what an anonymous request may reach.

pub mod tenant;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use hornero_core::{Principal, PrincipalId, TenantId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "hornero_session";

/// JWT claims of a session token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub sub: String, // principal id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<i64>,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
}

impl SessionClaims {
    pub fn principal_id(&self) -> Result<PrincipalId, AuthError> {
        self.sub
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .map(PrincipalId::new)
            .ok_or(AuthError::InvalidToken)
    }

    pub fn session_tenant(&self) -> Option<TenantId> {
        self.tenant_id.filter(|id| *id > 0).map(TenantId::new)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Missing session credentials")]
    MissingCredentials,
    #[error("Invalid header format")]
    InvalidHeaderFormat,
    #[error("Principal directory unavailable: {0}")]
    Directory(String),
}

/// Signing configuration for session tokens
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    pub issuer: String,
    pub expiry_seconds: u64,
}

impl JwtConfig {
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            expiry_seconds: 8 * 3600,
        }
    }

    pub fn with_expiry(mut self, seconds: u64) -> Self {
        self.expiry_seconds = seconds;
        self
    }

    /// Issue a session token for a principal, optionally remembering the
    /// tenant the login happened under.
    pub fn issue_session(
        &self,
        principal: PrincipalId,
        tenant: Option<TenantId>,
    ) -> Result<String, AuthError> {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = SessionClaims {
            sub: principal.to_string(),
            tenant_id: tenant.map(TenantId::get),
            exp: now + self.expiry_seconds as usize,
            iat: now,
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|_| AuthError::InvalidToken)
    }

    pub fn verify_token(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                if e.kind() == &jsonwebtoken::errors::ErrorKind::ExpiredSignature {
                    AuthError::TokenExpired
                } else {
                    AuthError::InvalidToken
                }
            })
    }
}

/// Source of principals for session lookups.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    async fn find(&self, id: PrincipalId) -> Result<Option<Principal>, AuthError>;
}

/// An authenticated request: the stored principal plus the tenant recorded
/// in the session token, if any.
#[derive(Debug, Clone)]
pub struct Session {
    pub principal: Principal,
    pub session_tenant: Option<TenantId>,
}

/// Session token from the bearer header, falling back to the cookie.
pub fn session_token(headers: &HeaderMap) -> Result<String, AuthError> {
    if headers.contains_key(axum::http::header::AUTHORIZATION) {
        return headers
            .typed_get::<Authorization<Bearer>>()
            .map(|Authorization(bearer)| bearer.token().to_string())
            .ok_or(AuthError::InvalidHeaderFormat);
    }
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::MissingCredentials)
}

/// Loads the [`Session`] of a request, if it carries a valid one.
pub async fn load_session(state: &AppState, headers: &HeaderMap) -> Result<Session, AuthError> {
    let token = session_token(headers)?;
    let claims = state.jwt.verify_token(&token)?;
    let principal = state
        .principals
        .find(claims.principal_id()?)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    if !principal.is_active {
        tracing::debug!(principal = %principal.id, "session of inactive principal ignored");
        return Err(AuthError::InvalidToken);
    }

    Ok(Session {
        principal,
        session_tenant: claims.session_tenant(),
    })
}

/// Attaches a [`Session`] to requests carrying a valid session token.
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    match load_session(&state, request.headers()).await {
        Ok(session) => {
            tracing::debug!(
                principal = %session.principal.id,
                username = %session.principal.username,
                "session authenticated"
            );
            request.extensions_mut().insert(session);
        }
        Err(AuthError::MissingCredentials) => {}
        Err(AuthError::Directory(reason)) => {
            tracing::warn!(%reason, "principal directory lookup failed; treating request as anonymous");
        }
        Err(err) => tracing::debug!(error = %err, "rejected session token"),
    }
    next.run(request).await
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(ApiError::Unauthenticated)
    }
}
