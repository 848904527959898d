//! Typed errors and HTTP mapping.

use crate::config::{Action, Role};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidSetting { key: &'static str, message: String },
}

/// A model definition or a record payload that does not satisfy the model's shape.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("model name must not be empty")]
    EmptyName,
    #[error("invalid model name '{0}': use letters, digits and underscores, starting with a letter")]
    InvalidName(String),
    #[error("model '{0}' must declare at least one field")]
    NoFields(String),
    #[error("field name must not be empty")]
    EmptyFieldName,
    #[error("invalid field name '{0}': use letters, digits and underscores, starting with a letter")]
    InvalidFieldName(String),
    #[error("field name '{0}' is reserved")]
    ReservedFieldName(String),
    #[error("duplicate field '{0}'")]
    DuplicateField(String),
    #[error("unknown field type '{0}'")]
    UnknownFieldType(String),
    #[error("default for field '{field}' is not a valid {expected}")]
    InvalidDefault { field: String, expected: &'static str },
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    #[error("role '{0}' is listed more than once")]
    DuplicateRole(String),
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("malformed definition: {0}")]
    Malformed(String),
    #[error("{0} is required")]
    MissingRequired(String),
    #[error("{field} must be a valid {expected}")]
    InvalidValue { field: String, expected: &'static str },
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("{0}")]
    Payload(String),
}

/// A Table Store or File Store call that failed or did not finish in time.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: &'static str, after: Duration },
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("rejected: {0}")]
    Rejected(String),
}

impl StorageError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, StorageError::Timeout { .. })
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),
    #[error("role {role} may not {action} {model}")]
    PermissionDenied { model: String, action: Action, role: Role },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("definition for '{model}' was persisted but could not be registered: {source}")]
    PartialPublish {
        model: String,
        #[source]
        source: StorageError,
    },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::PermissionDenied { .. } => (StatusCode::FORBIDDEN, "permission_denied"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Storage(e) if e.is_timeout() => (StatusCode::GATEWAY_TIMEOUT, "storage_timeout"),
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            AppError::PartialPublish { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "partial_publish"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
        };
        let details = match &self {
            AppError::PartialPublish { model, .. } => Some(serde_json::json!({
                "model": model,
                "persisted": true,
                "registered": false
            })),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
