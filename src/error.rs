use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Record store query failed: {0}")]
    UpstreamFetch(String),

    #[error("Record store update failed: {0}")]
    UpstreamUpdate(String),

    #[error("Catalog build exceeded {0} pages")]
    TooManyPages(usize),

    #[error("Malformed record {id}: {reason}")]
    MalformedRecord { id: String, reason: String },

    #[error("No movies match the selected categories")]
    EmptyPool,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::MalformedRecord {
            id: id.into(),
            reason: reason.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::EmptyPool => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::UpstreamFetch(_)
            | AppError::UpstreamUpdate(_)
            | AppError::TooManyPages(_)
            | AppError::MalformedRecord { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::NotFound(msg) => msg,
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
