//! Error types for the session engine.
//!
//! Every rejection a caller can see is a [`PlaybackError`]. Each variant
//! knows its HTTP status and a stable reason string; the concrete cause
//! stays in the `Display` output, which only goes to the logs.

use streamgate_protocol::{SessionId, SessionState, StreamId, TokenError};
use streamgate_store::StoreError;

/// Errors returned by [`SessionEngine`](crate::SessionEngine) operations.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// Unknown email or wrong password. Deliberately doesn't say which.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No bearer token was presented.
    #[error("missing bearer token")]
    MissingToken,

    /// A token failed verification: malformed, forged, expired, of the
    /// wrong kind, or minted for another session.
    #[error("token rejected: {0}")]
    Unauthorized(#[from] TokenError),

    /// The caller is authenticated but lacks the admin role.
    #[error("admin role required")]
    Forbidden,

    #[error("stream {0} not found")]
    StreamNotFound(StreamId),

    /// Playback can't start: the stream is missing or not live.
    #[error("stream {0} is not live")]
    StreamNotLive(StreamId),

    /// The stream went offline under an existing session.
    #[error("stream {0} went offline")]
    StreamOffline(StreamId),

    /// The wallet is missing or empty.
    #[error("insufficient points")]
    InsufficientPoints,

    /// The caller already holds as many active sessions as the stream
    /// allows.
    #[error("concurrent session limit of {limit} reached")]
    CapacityExceeded { limit: u32 },

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// Renewal or validation of a session that has ended.
    #[error("session {0} is not active")]
    SessionNotActive(SessionId),

    /// Heartbeat for a session that has ended. Reported like a missing
    /// session, and never charged.
    #[error("heartbeat for {state} session {id}")]
    SessionEnded { id: SessionId, state: SessionState },

    /// A store failure with no caller-facing meaning.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl PlaybackError {
    /// HTTP status code reported to the caller.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidCredentials | Self::MissingToken => 401,
            Self::Unauthorized(TokenError::Encode(_)) => 500,
            Self::Unauthorized(_) => 401,
            Self::Forbidden | Self::SessionNotActive(_) | Self::StreamOffline(_) => 403,
            Self::StreamNotLive(_) => 400,
            Self::InsufficientPoints => 402,
            Self::StreamNotFound(_) | Self::SessionNotFound(_) | Self::SessionEnded { .. } => 404,
            Self::CapacityExceeded { .. } => 429,
            Self::Store(_) => 500,
        }
    }

    /// Stable, machine-checkable reason string for the response body.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid credentials",
            Self::MissingToken => "missing bearer token",
            Self::Unauthorized(TokenError::Encode(_)) | Self::Store(_) => "internal error",
            Self::Unauthorized(_) => "invalid token",
            Self::Forbidden => "forbidden",
            Self::StreamNotFound(_) => "stream not found",
            Self::StreamNotLive(_) | Self::StreamOffline(_) => "stream not live",
            Self::InsufficientPoints => "insufficient points",
            Self::CapacityExceeded { .. } => "too many concurrent sessions",
            Self::SessionNotFound(_) => "session not found",
            Self::SessionNotActive(_) | Self::SessionEnded { .. } => "session not active",
        }
    }
}

impl From<StoreError> for PlaybackError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StreamNotFound(id) => Self::StreamNotFound(id),
            StoreError::StreamNotLive { id, .. } => Self::StreamNotLive(id),
            StoreError::WalletNotFound(_) | StoreError::InsufficientPoints(_) => {
                Self::InsufficientPoints
            }
            StoreError::CapacityExceeded { limit } => Self::CapacityExceeded { limit },
            StoreError::SessionNotFound(id) => Self::SessionNotFound(id),
            StoreError::SessionNotActive { id, state } => Self::SessionEnded { id, state },
            other @ (StoreError::IllegalTransition { .. } | StoreError::EmailTaken(_)) => {
                Self::Store(other)
            }
        }
    }
}
