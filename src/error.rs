// src/error.rs
//
// Collaborator error codes are classified once, here, instead of being
// string-matched at every call site.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

/// Data-access failures, translated from Postgres error codes at the
/// boundary. `UniqueViolation` and `RelationMissing` are the two codes the
/// application reacts to; everything else stays opaque.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("relation does not exist")]
    RelationMissing,

    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DataError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            match db.code().as_deref() {
                Some("23505") => return DataError::UniqueViolation,
                Some("42P01") => return DataError::RelationMissing,
                _ => {}
            }
        }
        DataError::Sqlx(e)
    }
}

/// Request-level failures mapped onto the HTTP taxonomy: 400 for bad input,
/// 404/410/429 for the three distinct "not available" states, 500 for
/// collaborator failures (with the collaborator's diagnostic text, never
/// its credentials).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Gone(String),

    #[error("{0}")]
    LimitExceeded(String),

    #[error("payment session creation failed")]
    Payment { details: String },

    #[error("database error")]
    Database(#[from] DataError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::LimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Payment { .. } | ApiError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Payment { details } => json!({
                "error": self.to_string(),
                "details": details,
            }),
            ApiError::Database(e) => {
                log::error!("database error: {e}");
                json!({
                    "error": "database error",
                    "details": e.to_string(),
                })
            }
            _ => json!({ "error": self.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}
