//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {kind} identifier '{value}'")]
    InvalidIdentifier { kind: &'static str, value: String },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Database failures, classified by the phase that produced them.
/// `Display` is the backend's detail message verbatim; it is what clients see.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    /// Could not obtain a transaction (connection or resource exhaustion).
    #[error("{0}")]
    Acquire(String),
    /// The statement or its commit was rejected.
    #[error("{0}")]
    Statement(String),
    /// Transient conflict; the whole transaction may be replayed.
    #[error("{0}")]
    Aborted(String),
    /// Dialect metadata could not be read.
    #[error("{0}")]
    Metadata(String),
    #[error("{0}")]
    Unavailable(String),
}

impl DbError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, DbError::Aborted(_))
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Db(e) => {
                tracing::error!(error = %e, "database error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
