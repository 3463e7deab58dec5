pub mod clients;
pub mod events;
pub mod notes;
pub mod owned;
pub mod tasks;
pub mod users;

use std::collections::HashMap;

use thiserror::Error;

use crate::auth::TokenError;
use crate::database::store::StoreError;
use crate::ownership::AccessError;
use clients::ClientError;

pub use clients::{HttpOwnedDataClient, OwnedDataClient, PurgeReport};
pub use events::EventService;
pub use notes::NoteService;
pub use owned::{CreatePayload, OwnedResourceService, PatchPayload};
pub use tasks::TaskService;
pub use users::UserService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: HashMap<String, String>,
    },

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("{0}")]
    Password(String),
}

/// Client-facing text for a uniqueness violation the store caught
pub const DUPLICATE_MESSAGE: &str = "A record with the same unique value already exists";

impl ServiceError {
    /// Validation failure on a single field
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), message.into());
        ServiceError::Validation {
            message: "Validation failed".to_string(),
            field_errors,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(detail) => {
                tracing::warn!("Unique constraint rejected write: {}", detail);
                ServiceError::Conflict(DUPLICATE_MESSAGE.to_string())
            }
            other => ServiceError::Store(other),
        }
    }
}

/// Collects per-field validation messages
#[derive(Debug, Default)]
pub struct FieldErrors(HashMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    /// Require a present, non-blank string
    pub fn require_text(&mut self, field: &str, value: Option<&str>, label: &str) {
        if value.map_or(true, |v| v.trim().is_empty()) {
            self.add(field, format!("{} is required", label));
        }
    }

    /// When present, the string must not be blank
    pub fn non_blank(&mut self, field: &str, value: Option<&str>, label: &str) {
        if matches!(value, Some(v) if v.trim().is_empty()) {
            self.add(field, format!("{} must not be blank", label));
        }
    }

    pub fn into_result(self) -> Result<(), ServiceError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation {
                message: "Validation failed".to_string(),
                field_errors: self.0,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_report_first_message_per_field() {
        let mut errors = FieldErrors::new();
        errors.require_text("title", Some("  "), "Title");
        errors.add("title", "second message");
        errors.non_blank("description", Some("fine"), "Description");

        match errors.into_result() {
            Err(ServiceError::Validation { field_errors, .. }) => {
                assert_eq!(field_errors.len(), 1);
                assert_eq!(field_errors["title"], "Title is required");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_store_error_becomes_conflict() {
        let err: ServiceError =
            StoreError::Duplicate("duplicate key value violates unique constraint \"users_email_key\"".to_string())
                .into();
        match err {
            ServiceError::Conflict(message) => assert_eq!(message, DUPLICATE_MESSAGE),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn invalid_names_one_field() {
        match ServiceError::invalid("order_index", "Too large") {
            ServiceError::Validation { field_errors, .. } => {
                assert_eq!(field_errors.len(), 1);
                assert_eq!(field_errors["order_index"], "Too large");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
