use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use music_core::MusicError;
use serde::Serialize;
use thiserror::Error;

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Music generation error: {0}")]
    Music(#[from] MusicError),

    #[error("Lyrics error: {0}")]
    Lyrics(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownTool(_) => StatusCode::NOT_FOUND,
            ApiError::Music(MusicError::Negotiation(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Music(MusicError::Encoding { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Lyrics(_) => StatusCode::BAD_GATEWAY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller mistakes, as opposed to failures while running a tool.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ApiError::InvalidInput(_) | ApiError::UnknownTool(_))
    }
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}
