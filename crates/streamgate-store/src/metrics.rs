//! Observability counters kept alongside the entitlement tables.

use serde::{Deserialize, Serialize};

/// Coarse error categories counted for the monitoring endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected login attempts.
    LoginFailures,
    /// Any rejected playback call: start, renew, heartbeat, validation.
    PlaybackErrors,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 2] = [Self::LoginFailures, Self::PlaybackErrors];
}

/// Point-in-time counts over the store's tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreMetrics {
    pub users: usize,
    pub streams: usize,
    pub sessions: usize,
    pub active_sessions: usize,
    pub ledger_entries: usize,
}
