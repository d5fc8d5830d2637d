// Error handling module
// Defines error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::render;

/// Errors that can occur while handling a browser request
#[derive(Error, Debug)]
pub enum ApiError {
    /// No Cohuman API credentials in the environment or config file
    #[error("Cohuman API credentials are not configured")]
    ConfigurationMissing,

    /// The OAuth provider rejected a token request or could not be reached
    #[error("OAuth handshake failed: {0}")]
    UpstreamAuth(String),

    /// Transport failure talking to the Cohuman API
    #[error("Cohuman API request failed: {0}")]
    UpstreamApi(String),

    /// The authorization callback arrived without a request token in the session
    #[error("No request token in session - start the sign-in at /authorize")]
    MissingRequestToken,

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// HTTP status used when this error reaches the browser
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ConfigurationMissing => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::UpstreamAuth(_) | ApiError::UpstreamApi(_) => StatusCode::BAD_GATEWAY,
            ApiError::MissingRequestToken => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::Internal(err) => {
                // Log internal errors
                tracing::error!("Internal error: {:?}", err);
                "Internal server error".to_string()
            }
            other => {
                tracing::warn!(status = status.as_u16(), "{}", other);
                other.to_string()
            }
        };

        (status, Html(render::render_error_page(status, &message))).into_response()
    }
}

/// Result type alias for request handling
pub type Result<T> = std::result::Result<T, ApiError>;
