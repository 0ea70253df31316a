//! Core entity types for Streamgate.
//!
//! These are the records the entitlement store owns: users, wallets,
//! streams, playback sessions, and ledger entries. They double as the
//! JSON shapes returned over HTTP, so field names follow the wire format
//! (`balance_points`, `delta_points`, snake_case enum values).

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Generates 64 bits of randomness rendered as 16 lowercase hex chars.
fn random_hex() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 8] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Declares a string-backed identifier newtype.
///
/// Each id serializes as a bare JSON string (`#[serde(transparent)]`) and
/// knows the prefix used when the server generates a fresh one, so ids
/// stay recognizable in logs: `s_3f9a…` is a session, `l_…` a ledger row.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wraps an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generates a fresh, random identifier.
            pub fn generate() -> Self {
                Self(format!("{}{}", $prefix, random_hex()))
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifies a user account.
    UserId,
    "u_"
);
string_id!(
    /// Identifies a stream.
    StreamId,
    "stream-"
);
string_id!(
    /// Identifies a playback session.
    SessionId,
    "s_"
);
string_id!(
    /// Identifies a ledger entry.
    LedgerEntryId,
    "l_"
);

// ---------------------------------------------------------------------------
// Users and wallets
// ---------------------------------------------------------------------------

/// What a user is allowed to do. Role-gated endpoints require `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.write_str("admin"),
            Self::User => f.write_str("user"),
        }
    }
}

/// A user account as known to the user directory.
///
/// The password never leaves the server: it is skipped on serialization,
/// so a `User` can be embedded in a login response as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub role: Role,
    pub status: String,
}

/// A user's points balance. Driven to exactly zero at worst, never below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    #[serde(rename = "balance_points")]
    pub balance: i64,
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// Publication status of a stream. Only `Live` streams can be played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    #[default]
    Draft,
    Paused,
    Live,
    Ended,
}

impl StreamStatus {
    /// Returns `true` if new playback may start and existing playback
    /// tokens keep validating (under the strict policy).
    pub fn is_playable(self) -> bool {
        matches!(self, Self::Live)
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => f.write_str("draft"),
            Self::Paused => f.write_str("paused"),
            Self::Live => f.write_str("live"),
            Self::Ended => f.write_str("ended"),
        }
    }
}

/// A live stream that viewers pay to watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub id: StreamId,
    pub name: String,
    pub status: StreamStatus,
    pub ingest_mode: String,
    pub ingest_url: String,
    pub segment_duration_sec: u32,
    pub playlist_window_minutes: u32,
    /// Points charged per heartbeat.
    pub points_rate: u32,
    /// Upper bound on a viewer's concurrently active sessions.
    pub max_concurrent_sessions: u32,
}

/// Admin request to create a stream. Every field is optional on the wire;
/// the store assigns an id and defaults the status to `Draft`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewStream {
    pub id: Option<StreamId>,
    pub name: String,
    pub status: Option<StreamStatus>,
    pub ingest_mode: String,
    pub ingest_url: String,
    pub segment_duration_sec: u32,
    pub playlist_window_minutes: u32,
    pub points_rate: u32,
    pub max_concurrent_sessions: u32,
}

impl NewStream {
    /// Materializes the stream, generating an id when none was supplied.
    pub fn into_stream(self) -> Stream {
        Stream {
            id: self.id.unwrap_or_else(StreamId::generate),
            name: self.name,
            status: self.status.unwrap_or_default(),
            ingest_mode: self.ingest_mode,
            ingest_url: self.ingest_url,
            segment_duration_sec: self.segment_duration_sec,
            playlist_window_minutes: self.playlist_window_minutes,
            points_rate: self.points_rate,
            max_concurrent_sessions: self.max_concurrent_sessions,
        }
    }
}

/// Partial update of a stream. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamPatch {
    pub name: Option<String>,
    pub ingest_url: Option<String>,
    pub status: Option<StreamStatus>,
    pub points_rate: Option<u32>,
}

impl StreamPatch {
    pub fn apply(&self, stream: &mut Stream) {
        if let Some(name) = &self.name {
            stream.name = name.clone();
        }
        if let Some(url) = &self.ingest_url {
            stream.ingest_url = url.clone();
        }
        if let Some(status) = self.status {
            stream.status = status;
        }
        if let Some(rate) = self.points_rate {
            stream.points_rate = rate;
        }
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Lifecycle state of a playback session.
///
/// ```text
///   (start) ──→ Active ──(heartbeat, balance > 0 / renew)──→ Active
///                 │
///                 ├──(heartbeat exhausts balance / kick)──→ Blocked
///                 │
///                 └──(stop)──→ Stopped
/// ```
///
/// `Blocked` and `Stopped` are terminal: nothing leads back to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Blocked,
    Stopped,
}

impl SessionState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` once the session has left `Active` for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Blocked | Self::Stopped)
    }

    /// Returns `true` if moving from `self` to `target` is legal.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Active, Self::Active)
                | (Self::Active, Self::Blocked)
                | (Self::Active, Self::Stopped)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Blocked => f.write_str("blocked"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// A viewer's playback session against one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub stream_id: StreamId,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub ip: String,
    pub user_agent: String,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Why points moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    HeartbeatDeduction,
}

/// One append-only record of a point deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub user_id: UserId,
    pub stream_id: StreamId,
    pub session_id: SessionId,
    /// Negative (or zero) for deductions.
    #[serde(rename = "delta_points")]
    pub delta: i64,
    pub reason: LedgerReason,
    pub created_at: DateTime<Utc>,
}
