use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Outcome of a failed upstream catalog fetch
///
/// `Clone` so a single collapsed outcome can be handed to every waiter.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Catalog provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Catalog provider returned status {status}: {message}")]
    UpstreamRejected { status: u16, message: String },

    #[error("Malformed catalog response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Whether repeating the same query may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::UpstreamUnavailable(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::UpstreamUnavailable(e.to_string())
    }
}

/// Collection store failures
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Collection store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid input: resource id {0} is out of range")]
    ResourceIdOutOfRange(u64),

    #[error("Collection store database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Fetch(FetchError::UpstreamUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Fetch(FetchError::UpstreamRejected { .. })
            | AppError::Fetch(FetchError::MalformedResponse(_)) => StatusCode::BAD_GATEWAY,
            AppError::Store(StoreError::ResourceIdOutOfRange(_)) | AppError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Cache(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
