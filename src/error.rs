//! # Error Normalization
//!
//! Every failure a request can hit is expressed as an [`AppError`] and rendered into the
//! uniform [`ErrorEnvelope`]. The [`normalize_errors`] stage is the single terminal point
//! that logs internal failures and applies the production disclosure boundary.

use std::{any::Any, backtrace::Backtrace};

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{config::Env, password::PasswordError, repository::RepoError, telemetry};

/// Message returned in place of internal details when running in production.
pub const PRODUCTION_MESSAGE: &str = "Something went wrong";

/// FieldError
///
/// One violated field from schema validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// ErrorEnvelope
///
/// The JSON body of every error response: `{error, message?, details?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub details: Option<Vec<FieldError>>,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            details: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Details of a failure the client is not allowed to see in production.
#[derive(Debug)]
pub struct InternalFailure {
    pub kind: &'static str,
    pub message: String,
    pub backtrace: Backtrace,
}

/// AppError
///
/// The failure taxonomy of the API. Variants map one-to-one onto a status code and an
/// envelope; see [`AppError::status_and_envelope`].
#[derive(Error, Debug)]
pub enum AppError {
    #[error("no token provided")]
    AuthMissing,

    #[error("malformed authorization header")]
    AuthMalformed,

    #[error("invalid token")]
    AuthInvalid,

    #[error("token expired")]
    AuthExpired,

    #[error("validation failed on {} field(s)", .0.len())]
    ValidationFailed(Vec<FieldError>),

    /// A uniqueness constraint rejected the write.
    #[error("{field} already exists")]
    DuplicateEntry { field: String },

    #[error("invalid username or password")]
    InvalidCredentials,

    /// An identifier-targeted operation found no record.
    #[error("{0}")]
    NotFound(String),

    /// No route matched the method and path. Carries the requested path.
    #[error("route not found: {0}")]
    RouteNotFound(String),

    /// The body could not be decoded as the expected JSON shape.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{}: {}", .0.kind, .0.message)]
    Internal(Box<InternalFailure>),
}

impl AppError {
    /// Build an internal failure, capturing a backtrace at the point it was raised.
    pub fn internal(kind: &'static str, message: impl Into<String>) -> Self {
        Self::Internal(Box::new(InternalFailure {
            kind,
            message: message.into(),
            backtrace: Backtrace::capture(),
        }))
    }

    /// Return the HTTP status code and the client-facing envelope for this error.
    pub fn status_and_envelope(&self) -> (StatusCode, ErrorEnvelope) {
        match self {
            Self::AuthMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorEnvelope::new("Access denied. No token provided."),
            ),
            Self::AuthMalformed => (
                StatusCode::UNAUTHORIZED,
                ErrorEnvelope::new("Access denied. Invalid token format."),
            ),
            Self::AuthInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorEnvelope::new("Access denied. Invalid token."),
            ),
            Self::AuthExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorEnvelope::new("Access denied. Token expired."),
            ),
            Self::ValidationFailed(details) => (
                StatusCode::BAD_REQUEST,
                ErrorEnvelope {
                    error: "Validation failed".to_string(),
                    message: None,
                    details: Some(details.clone()),
                },
            ),
            Self::DuplicateEntry { field } => (
                StatusCode::BAD_REQUEST,
                ErrorEnvelope::new("Duplicate entry").with_message(format!("{field} already exists")),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorEnvelope::new("Invalid credentials")
                    .with_message("Invalid username or password"),
            ),
            Self::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ErrorEnvelope::new("Not found").with_message(message.clone()),
            ),
            Self::RouteNotFound(path) => (
                StatusCode::NOT_FOUND,
                ErrorEnvelope::new("Route not found")
                    .with_message(format!("The requested endpoint {path} does not exist")),
            ),
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorEnvelope::new("Invalid request body").with_message(message.clone()),
            ),
            Self::RateLimited(message) => {
                (StatusCode::TOO_MANY_REQUESTS, ErrorEnvelope::new(message.clone()))
            }
            Self::Internal(failure) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorEnvelope::new("Internal server error").with_message(failure.message.clone()),
            ),
        }
    }
}

/// FailureReport
///
/// Attached to the extensions of a 500 response so that [`normalize_errors`] can log the
/// failure and redact the body. Never serialized to the client.
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub kind: &'static str,
    pub message: String,
    pub backtrace: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, envelope) = self.status_and_envelope();
        let mut response = (status, Json(envelope)).into_response();

        if let Self::Internal(failure) = self {
            response.extensions_mut().insert(FailureReport {
                kind: failure.kind,
                message: failure.message,
                backtrace: failure.backtrace.to_string(),
            });
        }

        response
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { field } => Self::DuplicateEntry { field },
            RepoError::Timeout => Self::internal("PersistenceTimeout", err.to_string()),
            RepoError::Backend(_) | RepoError::Corrupt(_) => {
                Self::internal("PersistenceError", err.to_string())
            }
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        Self::internal("PasswordError", err.to_string())
    }
}

/// normalize_errors
///
/// The terminal error stage. Sits inside the request logger so the completion line sees the
/// final status. Internal failures are written to the failure log; in production their
/// message is replaced with [`PRODUCTION_MESSAGE`].
pub async fn normalize_errors(State(env): State<Env>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let Some(report) = response.extensions_mut().remove::<FailureReport>() else {
        return response;
    };

    telemetry::record_failure(&report);

    if env == Env::Production {
        let envelope = ErrorEnvelope::new("Internal server error").with_message(PRODUCTION_MESSAGE);
        return (response.status(), Json(envelope)).into_response();
    }

    response
}

/// handle_panic
///
/// Used by `CatchPanicLayer`: turns a handler panic into an internal failure so it flows
/// through [`normalize_errors`] like any other.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };

    AppError::internal("Panic", message).into_response()
}
