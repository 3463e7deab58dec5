use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::TokenCodec;
use crate::error::ApiError;

/// Trusted identity headers set by the gateway for downstream services
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USERNAME_HEADER: &str = "x-username";

const DEFAULT_PUBLIC_PATHS: &[&str] = &[
    "/api/auth/login",
    "/api/auth/register",
    "/health",
    "/actuator",
    "/swagger-ui",
    "/v3/api-docs",
    "/docs",
];

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization token not found")]
    MissingToken,

    #[error("Invalid authorization header format")]
    MalformedAuthHeader,

    #[error("Invalid or expired token")]
    InvalidToken,
}

/// Authenticated user context extracted from a verified token
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
}

/// Path prefixes forwarded without authentication
#[derive(Debug, Clone)]
pub struct PublicPaths {
    prefixes: Vec<String>,
}

impl Default for PublicPaths {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_PATHS.iter().copied())
    }
}

impl PublicPaths {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.into().trim_end_matches('/').to_string())
                .collect(),
        }
    }

    /// Prefixes match whole path segments only: `/health` covers `/health/db`, not `/healthz`
    pub fn is_public(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| segment_prefix(path, prefix))
    }
}

pub(crate) fn segment_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub codec: Arc<TokenCodec>,
    pub public_paths: Arc<PublicPaths>,
}

impl AuthState {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self {
            codec,
            public_paths: Arc::new(PublicPaths::default()),
        }
    }
}

/// Gateway filter: verifies the bearer token and injects trusted identity headers
pub async fn jwt_auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Identity headers only ever come from this filter
    let headers = request.headers_mut();
    headers.remove(USER_ID_HEADER);
    headers.remove(USERNAME_HEADER);

    let path = request.uri().path().to_string();
    if state.public_paths.is_public(&path) {
        tracing::debug!("Public path {}, forwarding unauthenticated", path);
        return Ok(next.run(request).await);
    }

    let auth_user = authenticate(&state.codec, request.headers()).map_err(|err| {
        tracing::warn!("Rejected request to {}: {:?}", path, err);
        ApiError::from(err)
    })?;

    let user_id = HeaderValue::from_str(&auth_user.user_id.to_string())
        .map_err(|_| ApiError::from(AuthError::InvalidToken))?;
    let username = HeaderValue::from_str(&auth_user.username).map_err(|_| {
        tracing::warn!("Token subject is not a valid header value");
        ApiError::from(AuthError::InvalidToken)
    })?;

    let headers = request.headers_mut();
    headers.insert(USER_ID_HEADER, user_id);
    headers.insert(USERNAME_HEADER, username);

    tracing::debug!("Authenticated {} for {}", auth_user.username, path);
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Extract and verify the bearer token from request headers
pub fn authenticate(codec: &TokenCodec, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
    let token = extract_bearer_token(headers)?;

    let claims = codec.verify(token).map_err(|err| {
        tracing::debug!("Token verification failed: {}", err);
        AuthError::InvalidToken
    })?;

    let user_id = claims.user_uuid().ok_or(AuthError::InvalidToken)?;

    Ok(AuthUser {
        user_id,
        username: claims.sub,
    })
}

/// Extract the token from an `Authorization: Bearer <token>` header
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;

    let auth_str = auth_header.to_str().map_err(|_| AuthError::MalformedAuthHeader)?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AuthError::MalformedAuthHeader),
    }
}
