//! Error types for the Streamgate server.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use streamgate_protocol::ErrorBody;
use streamgate_session::PlaybackError;

use crate::ConfigError;

/// Top-level error for building and running the server.
///
/// The `#[from]` attribute on each variant generates a `From` impl, so `?`
/// lifts sub-crate errors into this one.
#[derive(Debug, thiserror::Error)]
pub enum StreamgateError {
    /// Binding or serving the listener failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The environment holds an unusable setting.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An engine operation failed outside a request.
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// A rejected HTTP request, rendered as `{"error": "<reason>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Playback(#[from] PlaybackError),

    /// The request body is not valid JSON for the endpoint.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// The caller's address exhausted its quota for this endpoint.
    #[error("rate limit exceeded")]
    RateLimited,
}

impl ApiError {
    pub fn as_status_code(&self) -> StatusCode {
        match self {
            Self::Playback(e) => StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::Playback(e) => e.reason(),
            Self::InvalidBody(_) => "invalid body",
            Self::RateLimited => "rate limit",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.as_status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.reason().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use streamgate_protocol::{SessionId, TokenError};

    use super::*;

    #[test]
    fn test_from_playback_error() {
        let err: StreamgateError = PlaybackError::Forbidden.into();
        assert!(matches!(err, StreamgateError::Playback(_)));
        assert_eq!(err.to_string(), "admin role required");
    }

    #[test]
    fn test_from_io_error() {
        let err: StreamgateError =
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken").into();
        assert!(matches!(err, StreamgateError::Io(_)));
        assert!(err.to_string().contains("taken"));
    }

    #[test]
    fn test_api_error_status_follows_engine() {
        let err = ApiError::from(PlaybackError::SessionNotFound(SessionId::new("s_1")));
        assert_eq!(err.as_status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.reason(), "session not found");
    }

    #[test]
    fn test_api_error_token_failures_share_reason() {
        let err = ApiError::from(PlaybackError::Unauthorized(TokenError::Expired));
        assert_eq!(err.as_status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.reason(), "invalid token");
    }

    #[test]
    fn test_api_error_rate_limited_is_429() {
        assert_eq!(
            ApiError::RateLimited.as_status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ApiError::RateLimited.reason(), "rate limit");
    }
}
