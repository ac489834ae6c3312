use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::repo::RepoError;

/// Typed failures of engine operations. A rejected operation is never a silent no-op.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("authentication required")] Authentication,
    #[error("not allowed")] Authorization,
    #[error("invalid input: {0}")] Validation(String),
    #[error("conflict: {0}")] Conflict(String),
    #[error("not found")] NotFound,
    #[error("store error: {0}")] Store(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<RepoError> for EngineError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => EngineError::NotFound,
            RepoError::Conflict => EngineError::Conflict("conflicting store state".into()),
            RepoError::Internal(msg) => EngineError::Store(msg),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("unauthorized")] Unauthorized,
    #[error("forbidden")] Forbidden,
    #[error("{0}")] BadRequest(String),
    #[error("{0}")] Conflict(String),
    #[error("not found")] NotFound,
    #[error("too many requests")] TooManyRequests,
    #[error("internal error")] Internal,
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Authentication => ApiError::Unauthorized,
            EngineError::Authorization => ApiError::Forbidden,
            EngineError::Validation(msg) => ApiError::BadRequest(msg),
            EngineError::Conflict(msg) => ApiError::Conflict(msg),
            EngineError::NotFound => ApiError::NotFound,
            EngineError::Store(msg) => {
                tracing::error!(error = %msg, "store failure");
                ApiError::Internal
            }
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self { EngineError::from(e).into() }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        use actix_web::http::StatusCode;
        let status = match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        HttpResponse::build(status).json(ApiErrorBody { error: self.to_string() })
    }
}
