//! Typed errors and HTTP mapping.

use crate::repository::RepositoryError;
use crate::response::error_body;
use crate::service::ValidationErrors;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {kind} identifier '{name}'")]
    InvalidIdentifier { kind: &'static str, name: String },
    #[error("invalid primary key: table {table} column {column}")]
    InvalidPrimaryKey { table: String, column: String },
    #[error("{table}: {kind} '{field}' is not a declared field")]
    UnknownField {
        table: String,
        kind: &'static str,
        field: String,
    },
    #[error("duplicate route: /{0}")]
    DuplicateRoute(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Outcome of a failed pipeline operation. Transports map each kind to their own status.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(ValidationErrors),
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Storage failure. The detail is logged, never sent to clients.
    #[error("infrastructure: {0}")]
    Infrastructure(String),
}

impl AppError {
    /// Single-field validation failure.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.insert(field, message);
        AppError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NoRowsAffected => AppError::NotFound,
            RepositoryError::Conflict(detail) => AppError::Conflict(detail),
            RepositoryError::MissingPrimaryKey => AppError::BadRequest(e.to_string()),
            RepositoryError::UnknownField { ref field, .. } => AppError::invalid(field.clone(), "is not a known field"),
            other => AppError::Infrastructure(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Infrastructure(_) => "internal server error".to_string(),
            AppError::Conflict(_) => "resource already exists".to_string(),
            other => other.to_string(),
        };
        (status, Json(error_body(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_errors_are_classified() {
        assert!(matches!(AppError::from(RepositoryError::NoRowsAffected), AppError::NotFound));
        assert!(matches!(
            AppError::from(RepositoryError::Conflict("users_pkey".into())),
            AppError::Conflict(_)
        ));
        assert!(matches!(AppError::from(RepositoryError::Poisoned), AppError::Infrastructure(_)));
    }

    #[test]
    fn statuses() {
        assert_eq!(AppError::invalid("id", "is required").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("k".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Infrastructure("connection refused".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_message_lists_fields() {
        let mut errors = ValidationErrors::new();
        errors.insert("first_name", "is required");
        assert_eq!(AppError::Validation(errors).to_string(), "first_name is required");
    }
}
