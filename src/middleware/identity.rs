use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::{USERNAME_HEADER, USER_ID_HEADER};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Missing X-User-Id header")]
    Missing,

    #[error("Invalid X-User-Id header")]
    Malformed,
}

/// Requester identity as asserted by the gateway's trusted headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub user_id: Uuid,
    pub username: Option<String>,
}

impl RequestIdentity {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Result<Self, IdentityError> {
        let raw = headers.get(USER_ID_HEADER).ok_or(IdentityError::Missing)?;
        let user_id = raw
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .ok_or(IdentityError::Malformed)?;

        let username = headers
            .get(USERNAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self { user_id, username })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers).map_err(|err| {
            tracing::warn!("{} {} rejected: {}", parts.method, parts.uri.path(), err);
            ApiError::from(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn parses_trusted_headers() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        headers.insert(USERNAME_HEADER, HeaderValue::from_static("alice"));

        let identity = RequestIdentity::from_headers(&headers).unwrap();
        assert_eq!(identity.user_id, id);
        assert_eq!(identity.username.as_deref(), Some("alice"));
    }

    #[test]
    fn absent_or_malformed_header_is_rejected() {
        let mut headers = HeaderMap::new();
        assert_eq!(RequestIdentity::from_headers(&headers), Err(IdentityError::Missing));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert_eq!(RequestIdentity::from_headers(&headers), Err(IdentityError::Malformed));

        let api: ApiError = IdentityError::Malformed.into();
        assert_eq!(api.status_code(), 400);
    }
}
