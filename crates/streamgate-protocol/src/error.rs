//! Error types for the token codec.
//!
//! Each variant names a concrete reason for logging. Callers never see the
//! distinction: every one of them means "unauthorized".

use crate::TokenKind;

/// Why a token was rejected.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The token doesn't have the expected shape, or its payload doesn't
    /// decode (bad base64, bad JSON, empty subject, bad expiry field).
    #[error("invalid token format")]
    InvalidFormat,

    /// The MAC over the payload doesn't match the supplied signature.
    #[error("invalid token signature")]
    InvalidSignature,

    /// The token's expiry is at or before the verification time.
    #[error("token expired")]
    Expired,

    /// A refresh token was presented where an access token was expected,
    /// or the other way around.
    #[error("expected {expected:?} token, got {found:?}")]
    WrongKind {
        expected: TokenKind,
        found: TokenKind,
    },

    /// A playback token minted for a different session.
    #[error("playback token does not belong to this session")]
    SessionMismatch,

    /// Claims could not be serialized while issuing a token.
    #[error("failed to encode claims: {0}")]
    Encode(#[source] serde_json::Error),
}
