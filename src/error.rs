// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::TokenError;
use crate::config::ConfigError;
use crate::database::store::StoreError;
use crate::middleware::auth::AuthError;
use crate::middleware::identity::IdentityError;
use crate::ownership::AccessError;
use crate::services::clients::ClientError;
use crate::services::ServiceError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (upstream service unreachable)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::PayloadTooLarge(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Short error label carried in the `error` field of the body
    pub fn error_label(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) | ApiError::InvalidJson(_) => "Bad Request",
            ApiError::ValidationError { .. } => "Validation Failed",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::Forbidden(_) => "Unauthorized Access",
            ApiError::NotFound(_) => "Not Found",
            ApiError::Conflict(_) => "Conflict",
            ApiError::PayloadTooLarge(_) => "Payload Too Large",
            ApiError::InternalServerError(_) => "Internal Server Error",
            ApiError::BadGateway(_) => "Bad Gateway",
            ApiError::ServiceUnavailable(_) => "Service Unavailable",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "status": self.status_code(),
            "error": self.error_label(),
            "message": self.message(),
        });

        if let ApiError::ValidationError { field_errors: Some(field_errors), .. } = self {
            response["errors"] = json!(field_errors);
        }

        response
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::PayloadTooLarge(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert domain error types to ApiError
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::unauthorized(err.to_string())
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidSecret | TokenError::Encoding(_) => {
                tracing::error!("Token codec failure: {}", err);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            // Verification failures never leak which check failed
            _ => ApiError::from(AuthError::InvalidToken),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotFound { .. } => ApiError::not_found(err.to_string()),
            AccessError::Unauthorized { .. } => ApiError::forbidden(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => {
                tracing::error!("Store unavailable: {}", msg);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            StoreError::Duplicate(detail) => {
                tracing::warn!("Unique constraint rejected write: {}", detail);
                ApiError::conflict(crate::services::DUPLICATE_MESSAGE)
            }
            other => {
                // Log the real error but return generic message
                tracing::error!("Store error: {}", other);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation { message, field_errors } => {
                ApiError::validation_error(message, Some(field_errors))
            }
            ServiceError::Access(e) => e.into(),
            ServiceError::Conflict(msg) => ApiError::conflict(msg),
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::InvalidCredentials => ApiError::unauthorized("Invalid credentials"),
            ServiceError::Store(e) => e.into(),
            ServiceError::Token(e) => e.into(),
            ServiceError::Client(e) => e.into(),
            ServiceError::Password(msg) => {
                tracing::error!("Password hashing failure: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        tracing::error!("Downstream service call failed: {}", err);
        match err {
            ClientError::Incomplete(_) => ApiError::bad_gateway(format!("Account not deleted, {}", err)),
            _ => ApiError::bad_gateway("A dependent service could not complete the request"),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        tracing::error!("Configuration error: {}", err);
        ApiError::internal_server_error("Service is misconfigured")
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn body_has_uniform_shape() {
        let body = ApiError::unauthorized("Invalid or expired token").to_json();
        assert_eq!(body["status"], 401);
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(body["message"], "Invalid or expired token");
        assert!(body["timestamp"].as_str().is_some());
        assert!(body.get("errors").is_none());
    }

    #[test]
    fn validation_error_carries_field_detail() {
        let mut fields = HashMap::new();
        fields.insert("title".to_string(), "Title is required".to_string());
        let body = ApiError::validation_error("Validation failed", Some(fields)).to_json();
        assert_eq!(body["status"], 400);
        assert_eq!(body["errors"]["title"], "Title is required");
    }

    #[test]
    fn access_errors_map_to_404_and_403() {
        let id = Uuid::new_v4();
        let missing: ApiError = AccessError::NotFound { kind: "Note", id }.into();
        assert_eq!(missing.status_code(), 404);

        let denied: ApiError = AccessError::Unauthorized { kind: "Note", id }.into();
        assert_eq!(denied.status_code(), 403);
        assert_eq!(denied.to_json()["error"], "Unauthorized Access");
    }

    #[test]
    fn token_failures_collapse_to_invalid_token() {
        for err in [TokenError::Malformed, TokenError::InvalidSignature, TokenError::Expired, TokenError::MissingClaim("sub")] {
            let api: ApiError = err.into();
            assert_eq!(api.status_code(), 401);
            assert_eq!(api.message(), "Invalid or expired token");
        }
    }

    #[test]
    fn duplicate_detail_stays_in_the_log() {
        let api: ApiError =
            StoreError::Duplicate("duplicate key value violates unique constraint \"users_pkey\"".to_string()).into();
        assert_eq!(api.status_code(), 409);
        assert!(!api.message().contains("users_pkey"));
    }

    #[test]
    fn internal_store_errors_are_generic() {
        let api: ApiError = StoreError::Query("relation \"notes\" does not exist".to_string()).into();
        assert_eq!(api.status_code(), 500);
        assert!(!api.message().contains("relation"));
    }
}
