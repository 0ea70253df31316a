//! # Streamgate
//!
//! Points-metered live stream playback.
//!
//! Viewers log in, open a playback session against a live stream, and
//! prove they're still watching with periodic heartbeats. Each heartbeat
//! spends points from their wallet; when the wallet runs dry the session
//! is blocked. A media edge asks [`/internal/validate-playback`](routes)
//! before serving every fetch.
//!
//! This crate is the HTTP face of the system. The work happens below it:
//!
//! ```text
//! streamgate (this crate)   ← axum routes, bearer auth, rate limits
//!     ↕
//! streamgate-session        ← login, playback grants, heartbeat metering
//!     ↕
//! streamgate-store          ← atomic bookkeeping: wallets, sessions, ledger
//! streamgate-protocol       ← ids, entities, wire types, token codec
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use streamgate::prelude::*;
//!
//! # async fn demo() -> Result<(), StreamgateError> {
//! let server = StreamgateServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod auth;
mod config;
mod error;
mod rate_limit;
pub mod routes;
mod server;

pub use auth::{Admin, Caller};
pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, StreamgateError};
pub use rate_limit::{Bucket, RateLimitConfig, RateLimits};
pub use routes::AppState;
pub use server::{StreamgateServer, StreamgateServerBuilder};

/// Everything needed to embed a server.
pub mod prelude {
    pub use crate::{RateLimitConfig, ServerConfig, StreamgateError, StreamgateServer};
    pub use streamgate_protocol::*;
    pub use streamgate_session::{EngineConfig, SessionEngine, ValidationPolicy};
    pub use streamgate_store::MemoryStore;
}
