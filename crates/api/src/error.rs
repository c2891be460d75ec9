//! HTTP error envelope.
//!
//! Every failure leaves the server as `{ "error": <message>, "code": <CODE> }`.
//! Domain failures keep their message; store failures are logged and replaced
//! by a generic one, except for the constraint violations a client can cause.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use slotswap_core::error::CoreError;
use slotswap_db::repositories::swap_request_repo::PENDING_PAIR_CONSTRAINT;
use slotswap_db::EngineError;

/// Application-level error type for HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `slotswap_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The request body could not be read.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A server-side inconsistency. The message is logged, never returned.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Rejected(negotiation) => AppError::Core(negotiation.into()),
            EngineError::Database(db) => AppError::Database(db),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Status, machine-readable code and client-facing message.
type Parts = (StatusCode, &'static str, String);

const INTERNAL_MESSAGE: &str = "An internal error occurred";

fn internal() -> Parts {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        INTERNAL_MESSAGE.to_string(),
    )
}

impl AppError {
    fn parts(&self) -> Parts {
        match self {
            AppError::Core(core) => core_parts(core),
            AppError::Database(err) => database_parts(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        }
    }
}

fn core_parts(err: &CoreError) -> Parts {
    let (status, code) = match err {
        CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        CoreError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        CoreError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        CoreError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        CoreError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
    };
    let message = match err {
        CoreError::NotFound { entity, id } => format!("{entity} with id {id} not found"),
        CoreError::Validation(msg)
        | CoreError::Conflict(msg)
        | CoreError::Unauthorized(msg)
        | CoreError::Forbidden(msg) => msg.clone(),
    };
    (status, code, message)
}

/// Map a store failure to a response.
///
/// Handlers look rows up with `fetch_optional`, so a `RowNotFound` can only
/// come from a row that vanished under a lock the engine held. That is a
/// server fault, not a missing resource.
fn database_parts(err: &sqlx::Error) -> Parts {
    if let sqlx::Error::Database(db_err) = err {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some(PENDING_PAIR_CONSTRAINT) => {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        "A pending swap request already exists for these slots".to_string(),
                    )
                }
                Some(constraint) if constraint.starts_with("uq_") => {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    )
                }
                _ => {}
            }
        }
    }
    tracing::error!(error = %err, "Database error");
    internal()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = json!({
            "error": message,
            "code": code,
        });
        (status, axum::Json(body)).into_response()
    }
}
