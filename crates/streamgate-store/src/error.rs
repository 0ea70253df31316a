//! Error types for the entitlement store.

use streamgate_protocol::{SessionId, SessionState, StreamId, StreamStatus, UserId};

/// Structural failures reported by store operations.
///
/// These are ordinary result alternatives: the store never panics on a
/// missing entity. The session engine decides what each one means to a
/// caller.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The user has no wallet.
    #[error("wallet not found for user {0}")]
    WalletNotFound(UserId),

    /// The wallet is already at zero.
    #[error("insufficient points for user {0}")]
    InsufficientPoints(UserId),

    #[error("stream {0} not found")]
    StreamNotFound(StreamId),

    /// The stream exists but isn't accepting viewers.
    #[error("stream {id} is {status}, not live")]
    StreamNotLive { id: StreamId, status: StreamStatus },

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// An active-only operation hit a session that has already ended.
    #[error("session {id} is {state}")]
    SessionNotActive { id: SessionId, state: SessionState },

    /// The user already holds as many active sessions as the stream allows.
    #[error("concurrent session limit of {limit} reached")]
    CapacityExceeded { limit: u32 },

    /// The requested state change would leave a terminal state.
    #[error("illegal session transition {from} -> {to}")]
    IllegalTransition { from: SessionState, to: SessionState },

    /// Another user already owns this email address.
    #[error("email {0} already registered")]
    EmailTaken(String),
}
