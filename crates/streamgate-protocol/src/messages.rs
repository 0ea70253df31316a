//! Request and response bodies exchanged over the HTTP surface.
//!
//! The session engine consumes and returns these directly; the transport
//! adapter only decodes and encodes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{SessionId, SessionState, Stream, StreamId, StreamStatus, User};

// -- Auth --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

// -- Streams --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStateRequest {
    pub state: StreamStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStateChanged {
    pub stream_id: StreamId,
    pub state: StreamStatus,
}

/// Runtime view of a stream: the record plus who is watching right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRuntime {
    pub stream: Stream,
    pub current_viewers: usize,
    pub last_manifest_at: DateTime<Utc>,
}

// -- Playback --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartPlaybackRequest {
    pub stream_id: StreamId,
    pub token: String,
}

/// Body shared by renew, heartbeat, stop, and kick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub session_id: SessionId,
}

/// What a viewer gets back from start or renew: the session and a fresh,
/// short-lived capability to fetch media for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackGrant {
    pub session_id: SessionId,
    pub play_token: String,
    pub play_url: String,
}

/// Result of a heartbeat. A `Blocked` report is delivered with HTTP 402.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatReport {
    pub state: SessionState,
    pub balance_points: i64,
}

// -- Generic bodies --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

impl StatusBody {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

/// Error payload: a stable, machine-checkable reason string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_playback_request_json_format() {
        let req: StartPlaybackRequest =
            serde_json::from_str(r#"{"stream_id":"stream-1","token":"abc"}"#).unwrap();
        assert_eq!(req.stream_id, StreamId::new("stream-1"));
        assert_eq!(req.token, "abc");
    }

    #[test]
    fn test_heartbeat_report_json_format() {
        let report = HeartbeatReport {
            state: SessionState::Blocked,
            balance_points: 0,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "blocked");
        assert_eq!(json["balance_points"], 0);
    }

    #[test]
    fn test_set_state_request_parses_status() {
        let req: SetStateRequest = serde_json::from_str(r#"{"state":"live"}"#).unwrap();
        assert_eq!(req.state, StreamStatus::Live);
    }
}
