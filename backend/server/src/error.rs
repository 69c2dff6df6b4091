use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid mood")]
pub struct ValidationError;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Tally store lock poisoned")]
    Poisoned,
}

/// Why a vote was not counted.
#[derive(Error, Debug)]
pub enum VoteError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid mood")]
    InvalidMood(#[from] ValidationError),

    #[error("Internal error")]
    Internal(#[from] PersistenceError),
}

impl From<VoteError> for AppError {
    fn from(error: VoteError) -> Self {
        match error {
            VoteError::Invalid(e) => AppError::InvalidMood(e),
            VoteError::Persistence(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(cause) = &self {
            error!("Request failed: {cause}");
        }

        let status = match self {
            AppError::InvalidMood { .. } => StatusCode::BAD_REQUEST,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = json!({
            "success": false,
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}
