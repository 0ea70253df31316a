//! Shared vocabulary for Streamgate.
//!
//! This crate defines what every other layer talks about:
//!
//! - **Types** ([`User`], [`Wallet`], [`Stream`], [`Session`],
//!   [`LedgerEntry`], and their id newtypes) — the entities the
//!   entitlement store owns.
//! - **Messages** ([`PlaybackGrant`], [`HeartbeatReport`], …) — request
//!   and response bodies of the HTTP surface.
//! - **Tokens** ([`TokenCodec`]) — HMAC-signed identity and playback
//!   tokens, verified without touching the store.
//!
//! ```text
//! Transport (HTTP) → Session engine → Entitlement store
//!                          ↓
//!                 Protocol (this crate)
//! ```

mod error;
mod messages;
mod token;
mod types;

pub use error::TokenError;
pub use messages::{
    ErrorBody, HeartbeatReport, LoginRequest, LoginResponse, PlaybackGrant, RefreshRequest,
    RefreshResponse, SessionRequest, SetStateRequest, StartPlaybackRequest, StatusBody,
    StreamRuntime, StreamStateChanged,
};
pub use token::{DEV_SECRET, IdentityClaims, PlaybackClaims, TokenCodec, TokenKind, now_unix};
pub use types::{
    LedgerEntry, LedgerEntryId, LedgerReason, NewStream, Role, Session, SessionId, SessionState,
    Stream, StreamId, StreamPatch, StreamStatus, User, UserId, Wallet,
};
