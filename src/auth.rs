//! # Credential Verification
//!
//! Bearer tokens are HS256 JWTs carrying the admin's id and email. [`require_auth`] runs
//! on every protected route: it verifies the `Authorization` header, attaches [`AuthUser`]
//! to the request extensions and short-circuits with a 401 otherwise. It performs no
//! persistence I/O.

use std::time::Duration;

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{AppError, ErrorEnvelope},
};

/// Claims
///
/// The signed token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the `_id` of the admin record.
    pub sub: Uuid,
    pub email: String,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
}

/// AuthUser
///
/// The verified identity of the caller. Present in the request extensions iff
/// verification succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
        }
    }
}

/// AuthError
///
/// Why a credential was refused. The variant decides the client message; the decode
/// reason itself is only logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("no bearer token supplied")]
    MissingToken,

    #[error("authorization header is not of the form `Bearer <token>`")]
    MalformedHeader,

    #[error("token failed verification: {0}")]
    InvalidSignature(String),

    #[error("token expired")]
    Expired,

    #[error("token could not be processed: {0}")]
    Internal(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => AppError::AuthMissing,
            AuthError::MalformedHeader => AppError::AuthMalformed,
            AuthError::InvalidSignature(_) => AppError::AuthInvalid,
            AuthError::Expired => AppError::AuthExpired,
            AuthError::Internal(reason) => AppError::internal("AuthError", reason),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorEnvelope::new("Internal server error during authentication.")),
            )
                .into_response(),
            other => AppError::from(other).into_response(),
        }
    }
}

/// verify_bearer
///
/// Checks the raw `Authorization` header value and recovers the claims.
///
/// The header must be exactly `Bearer <token>`: two space-separated parts with the
/// `Bearer` scheme. A bare `Bearer ` counts as a missing token.
pub fn verify_bearer(header: Option<&str>, secret: &str) -> Result<Claims, AuthError> {
    let header = header.ok_or(AuthError::MissingToken)?;

    let mut parts = header.split(' ');
    if parts.next() != Some("Bearer") {
        return Err(AuthError::MalformedHeader);
    }
    let token = match parts.next() {
        None | Some("") => return Err(AuthError::MissingToken),
        Some(token) => token,
    };
    if parts.next().is_some() {
        return Err(AuthError::MalformedHeader);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    // An expiry in the past is expired, with no clock tolerance.
    validation.leeway = 0;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => AuthError::InvalidSignature(e.to_string()),
            _ => AuthError::Internal(e.to_string()),
        })
}

/// issue_token
///
/// Signs a fresh token for the given admin, valid for `ttl`.
pub fn issue_token(
    subject: Uuid,
    email: &str,
    secret: &str,
    ttl: Duration,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp().max(0) as usize;
    let claims = Claims {
        sub: subject,
        email: email.to_string(),
        iat: now,
        exp: now + ttl.as_secs() as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Internal(e.to_string()))
}

/// require_auth
///
/// The per-route verification stage. On success the handler sees [`AuthUser`]; on failure
/// the request never reaches it.
pub async fn require_auth(
    State(config): State<AppConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or("<non-ascii>"));

    match verify_bearer(header, &config.jwt_secret) {
        Ok(claims) => {
            request.extensions_mut().insert(AuthUser::from(claims));
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(reason = %err, "authentication rejected");
            err.into_response()
        }
    }
}

/// AuthUser Extractor
///
/// Reads the identity attached by [`require_auth`]. Rejects with a 401 when the route was
/// mounted without the verification stage.
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::AuthMissing)
    }
}
