//! Playback session engine for Streamgate.
//!
//! This crate turns the entitlement store into caller-facing operations:
//!
//! 1. **Identity**: logins, token refresh, bearer verification
//!    ([`SessionEngine::login`], [`SessionEngine::authenticate`])
//! 2. **Playback**: opening sessions, renewing play tokens, metering
//!    heartbeats, and ending sessions
//! 3. **Validation**: authorizing media fetches from a play token alone
//!    ([`SessionEngine::validate_playback`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Transport (above)   ← decodes HTTP, calls the engine, maps errors to statuses
//!     ↕
//! Session engine (this crate)
//!     ↕
//! Store + protocol (below)  ← atomic bookkeeping, token codec
//! ```

mod config;
mod directory;
mod engine;
mod error;

pub use config::{EngineConfig, ValidationPolicy};
pub use directory::UserDirectory;
pub use engine::{Identity, MetricsReport, SessionEngine, StartPlayback};
pub use error::PlaybackError;
