//! The session engine: every caller-facing playback operation.
//!
//! The engine sits between the transport and the entitlement store. It
//! verifies tokens, asks the store to do the atomic work, translates store
//! outcomes into [`PlaybackError`]s, and counts rejections for the
//! monitoring endpoints.
//!
//! # Lifecycle of a viewer
//!
//! ```text
//! login() ──→ start_playback() ──→ heartbeat() (every few seconds)
//!                   │                   │
//!                   │                   ├── balance left ──→ [Active]
//!                   │                   └── balance gone ──→ [Blocked]
//!                   │
//!                   ├── renew_playback() ──→ fresh play token
//!                   ├── stop_session()   ──→ [Stopped]
//!                   └── kick_session()   ──→ [Blocked]  (admin)
//! ```
//!
//! The engine holds no entity state of its own. Everything lives in the
//! shared [`MemoryStore`], so one engine can serve every request handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use streamgate_protocol::{
    HeartbeatReport, IdentityClaims, LoginResponse, NewStream, PlaybackClaims, PlaybackGrant,
    RefreshResponse, Role, SessionId, SessionState, Stream, StreamId, StreamPatch, StreamRuntime,
    StreamStateChanged, StreamStatus, TokenCodec, TokenError, TokenKind, UserId, now_unix,
};
use streamgate_store::{ErrorKind, MemoryStore, StoreError, StoreMetrics};

use crate::{EngineConfig, PlaybackError, UserDirectory, ValidationPolicy};

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// An authenticated caller, recovered from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Everything needed to open a playback session.
#[derive(Debug, Clone)]
pub struct StartPlayback {
    pub stream_id: StreamId,
    /// The caller's access token, carried in the request body.
    pub token: String,
    pub ip: String,
    pub user_agent: String,
}

/// Aggregate figures for the metrics endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsReport {
    #[serde(flatten)]
    pub store: StoreMetrics,
    /// Points deducted over the trailing minute.
    pub points_spent_per_minute: i64,
}

// ---------------------------------------------------------------------------
// SessionEngine
// ---------------------------------------------------------------------------

/// Grants, meters, and revokes playback.
///
/// Generic over the [`UserDirectory`] used for logins; by default the
/// store itself is the directory.
pub struct SessionEngine<D: UserDirectory = Arc<MemoryStore>> {
    store: Arc<MemoryStore>,
    directory: D,
    codec: TokenCodec,
    config: EngineConfig,
}

impl SessionEngine {
    /// Creates an engine that looks users up in `store`.
    pub fn new(store: Arc<MemoryStore>, codec: TokenCodec, config: EngineConfig) -> Self {
        let directory = Arc::clone(&store);
        Self::with_directory(store, directory, codec, config)
    }
}

impl<D: UserDirectory> SessionEngine<D> {
    /// Creates an engine with an external user directory.
    pub fn with_directory(
        store: Arc<MemoryStore>,
        directory: D,
        codec: TokenCodec,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            directory,
            codec,
            config,
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =====================================================================
    // Identity
    // =====================================================================

    /// Exchanges credentials for an access/refresh token pair.
    ///
    /// # Errors
    /// [`PlaybackError::InvalidCredentials`] for an unknown email or a wrong
    /// password alike. Every failure bumps `login_failures`.
    pub fn login(&self, email: &str, password: &str) -> Result<LoginResponse, PlaybackError> {
        let user = match self.directory.find_by_email(email) {
            Some(user) if user.password == password => user,
            _ => {
                self.store.record_error(ErrorKind::LoginFailures);
                tracing::debug!(email, "login rejected");
                return Err(PlaybackError::InvalidCredentials);
            }
        };

        let now = now_unix();
        let access = IdentityClaims::new(
            user.id.clone(),
            user.role,
            TokenKind::Access,
            self.config.access_ttl,
            now,
        );
        let refresh = IdentityClaims::new(
            user.id.clone(),
            user.role,
            TokenKind::Refresh,
            self.config.refresh_ttl,
            now,
        );

        let response = LoginResponse {
            access_token: self.codec.issue_identity(&access)?,
            refresh_token: self.codec.issue_identity(&refresh)?,
            user,
        };
        tracing::info!(user_id = %response.user.id, "user logged in");
        Ok(response)
    }

    /// Mints a fresh access token from a refresh token.
    pub fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, PlaybackError> {
        let now = now_unix();
        let claims = self
            .codec
            .verify_identity(refresh_token, TokenKind::Refresh, now)
            .inspect_err(|e| tracing::debug!(error = %e, "refresh rejected"))?;

        let access = IdentityClaims::new(
            claims.sub,
            claims.rol,
            TokenKind::Access,
            self.config.access_ttl,
            now,
        );
        Ok(RefreshResponse {
            access_token: self.codec.issue_identity(&access)?,
        })
    }

    /// Verifies a bearer access token and returns the caller.
    ///
    /// # Errors
    /// [`PlaybackError::MissingToken`] for an empty token,
    /// [`PlaybackError::Unauthorized`] for anything that fails to verify.
    pub fn authenticate(&self, bearer: &str) -> Result<Identity, PlaybackError> {
        let bearer = bearer.trim();
        if bearer.is_empty() {
            return Err(PlaybackError::MissingToken);
        }
        let claims = self
            .codec
            .verify_identity(bearer, TokenKind::Access, now_unix())
            .inspect_err(|e| tracing::debug!(error = %e, "bearer token rejected"))?;
        Ok(Identity {
            user_id: claims.sub,
            role: claims.rol,
        })
    }

    pub fn require_admin(&self, identity: &Identity) -> Result<(), PlaybackError> {
        if identity.is_admin() {
            Ok(())
        } else {
            tracing::debug!(user_id = %identity.user_id, "admin route refused");
            Err(PlaybackError::Forbidden)
        }
    }

    // =====================================================================
    // Streams
    // =====================================================================

    pub fn create_stream(&self, new: NewStream) -> Stream {
        self.store.create_stream(new)
    }

    /// Applies a partial update (name, ingest URL, status, points rate).
    pub fn patch_stream(
        &self,
        id: &StreamId,
        patch: &StreamPatch,
    ) -> Result<Stream, PlaybackError> {
        let stream = self
            .store
            .update_stream(id, |stream| patch.apply(stream))
            .ok_or_else(|| PlaybackError::StreamNotFound(id.clone()))?;
        tracing::info!(stream_id = %id, status = %stream.status, "stream updated");
        Ok(stream)
    }

    /// Sets a stream's publication status.
    ///
    /// Taking a stream out of `Live` doesn't end sessions already open;
    /// under [`ValidationPolicy::RequireLiveStream`] their media fetches
    /// start failing instead.
    pub fn set_stream_state(
        &self,
        id: &StreamId,
        status: StreamStatus,
    ) -> Result<StreamStateChanged, PlaybackError> {
        self.store
            .update_stream(id, |stream| stream.status = status)
            .ok_or_else(|| PlaybackError::StreamNotFound(id.clone()))?;
        tracing::info!(stream_id = %id, %status, "stream state changed");
        Ok(StreamStateChanged {
            stream_id: id.clone(),
            state: status,
        })
    }

    /// The stream plus its current audience.
    pub fn stream_runtime(&self, id: &StreamId) -> Result<StreamRuntime, PlaybackError> {
        let stream = self
            .store
            .get_stream(id)
            .ok_or_else(|| PlaybackError::StreamNotFound(id.clone()))?;
        Ok(StreamRuntime {
            current_viewers: self.store.active_viewer_count(id),
            stream,
            last_manifest_at: Utc::now(),
        })
    }

    // =====================================================================
    // Playback
    // =====================================================================

    /// Opens a playback session and grants a play token.
    ///
    /// Checks run in order and the first failure wins:
    ///
    /// 1. access token verifies (401)
    /// 2. stream exists and is live (400)
    /// 3. wallet holds points (402)
    /// 4. caller is under the stream's session cap (429)
    ///
    /// Checks 2–4 and the session insert happen atomically in the store, so
    /// concurrent starts can't overshoot the cap. Nothing is created on
    /// failure.
    pub fn start_playback(&self, request: StartPlayback) -> Result<PlaybackGrant, PlaybackError> {
        let identity = self
            .codec
            .verify_identity(&request.token, TokenKind::Access, now_unix())
            .map_err(|e| self.playback_rejected("start", e.into()))?;

        let session = self
            .store
            .open_session(
                &identity.sub,
                &request.stream_id,
                &request.ip,
                &request.user_agent,
            )
            .map_err(|e| {
                let err = match e {
                    StoreError::StreamNotFound(id) => PlaybackError::StreamNotLive(id),
                    other => other.into(),
                };
                self.playback_rejected("start", err)
            })?;

        Ok(self.grant(&session.id))
    }

    /// Issues a fresh play token for an active session. Never charges.
    ///
    /// # Errors
    /// [`PlaybackError::SessionNotFound`] (404) or
    /// [`PlaybackError::SessionNotActive`] (403).
    pub fn renew_playback(&self, session_id: &SessionId) -> Result<PlaybackGrant, PlaybackError> {
        // Active -> Active is the only legal self-transition, so this both
        // checks liveness and bumps `last_seen_at` under one lock.
        self.store
            .transition_session(session_id, SessionState::Active)
            .map_err(|e| {
                let err = match e {
                    StoreError::IllegalTransition { .. } => {
                        PlaybackError::SessionNotActive(session_id.clone())
                    }
                    other => other.into(),
                };
                self.playback_rejected("renew", err)
            })?;

        Ok(self.grant(session_id))
    }

    /// Charges one heartbeat.
    ///
    /// A report with [`SessionState::Blocked`] means the balance ran out
    /// on this beat; the transport delivers it with status 402.
    ///
    /// # Errors
    /// [`PlaybackError::SessionNotFound`], [`PlaybackError::StreamNotFound`],
    /// or [`PlaybackError::SessionEnded`] for a session that is no longer
    /// active. None of them charge.
    pub fn heartbeat(&self, session_id: &SessionId) -> Result<HeartbeatReport, PlaybackError> {
        let charge = self
            .store
            .charge_heartbeat(session_id)
            .map_err(|e| self.playback_rejected("heartbeat", e.into()))?;

        Ok(HeartbeatReport {
            state: charge.session.state,
            balance_points: charge.balance,
        })
    }

    /// Ends a session at the viewer's request.
    ///
    /// Idempotent. Unknown sessions are ignored, and a session that was
    /// already blocked stays blocked.
    pub fn stop_session(&self, session_id: &SessionId) {
        self.end_session(session_id, SessionState::Stopped);
    }

    /// Forcibly ends a session. Admin only; the caller checks the role.
    pub fn kick_session(&self, session_id: &SessionId) {
        self.end_session(session_id, SessionState::Blocked);
    }

    /// Authorizes a media fetch for `session_id` with `token`.
    ///
    /// # Errors
    /// - 401 ([`PlaybackError::Unauthorized`]): malformed, forged, expired,
    ///   or minted for another session
    /// - 403 ([`PlaybackError::SessionNotActive`]): the session is unknown
    ///   or has ended
    /// - 403 ([`PlaybackError::StreamOffline`]): under
    ///   [`ValidationPolicy::RequireLiveStream`], the stream is no longer live
    pub fn validate_playback(
        &self,
        token: &str,
        session_id: &SessionId,
    ) -> Result<(), PlaybackError> {
        self.check_playback(token, session_id)
            .map_err(|e| self.playback_rejected("validate", e))
    }

    fn check_playback(&self, token: &str, session_id: &SessionId) -> Result<(), PlaybackError> {
        if token.is_empty() {
            return Err(TokenError::InvalidFormat.into());
        }
        self.codec.verify_playback(token, session_id, now_unix())?;

        let session = self
            .store
            .get_session(session_id)
            .filter(|s| s.state.is_active())
            .ok_or_else(|| PlaybackError::SessionNotActive(session_id.clone()))?;

        if self.config.validation == ValidationPolicy::RequireLiveStream {
            let live = self
                .store
                .get_stream(&session.stream_id)
                .is_some_and(|stream| stream.status.is_playable());
            if !live {
                return Err(PlaybackError::StreamOffline(session.stream_id));
            }
        }
        Ok(())
    }

    // =====================================================================
    // Observability
    // =====================================================================

    pub fn metrics(&self) -> MetricsReport {
        MetricsReport {
            store: self.store.metrics(),
            points_spent_per_minute: self.store.points_spent_last_minute(),
        }
    }

    pub fn error_summary(&self) -> BTreeMap<ErrorKind, u64> {
        self.store.error_summary()
    }

    // -- Helpers --

    /// Mints a play token and URL for a session.
    fn grant(&self, session_id: &SessionId) -> PlaybackGrant {
        let claims = PlaybackClaims::new(session_id.clone(), self.config.playback_ttl, now_unix());
        let play_token = self.codec.issue_playback(&claims);
        let play_url = format!(
            "{}/play/{}/master.m3u8?token={}",
            self.config.play_base_url.trim_end_matches('/'),
            session_id,
            play_token
        );
        PlaybackGrant {
            session_id: session_id.clone(),
            play_token,
            play_url,
        }
    }

    fn end_session(&self, session_id: &SessionId, target: SessionState) {
        match self.store.transition_session(session_id, target) {
            Ok(_) => {}
            Err(StoreError::SessionNotFound(_)) => {
                tracing::debug!(%session_id, to = %target, "end of unknown session ignored");
            }
            Err(e) => {
                tracing::debug!(%session_id, error = %e, "session already ended");
            }
        }
    }

    /// Counts a rejected playback call and logs why.
    fn playback_rejected(&self, op: &'static str, err: PlaybackError) -> PlaybackError {
        self.store.record_error(ErrorKind::PlaybackErrors);
        tracing::debug!(op, error = %err, "playback call rejected");
        err
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `SessionEngine`, named
    //! `test_{function}_{scenario}_{expected}`.
    //!
    //! Each test builds its own seeded store. `stream-1` is paused in the
    //! seed, so tests that play it set it live first.

    use std::time::Duration;

    use streamgate_store::DEMO_BALANCE;

    use super::*;

    // -- Helpers ----------------------------------------------------------

    fn engine() -> SessionEngine {
        engine_with(EngineConfig::default())
    }

    fn engine_with(config: EngineConfig) -> SessionEngine {
        SessionEngine::new(
            Arc::new(MemoryStore::seeded()),
            TokenCodec::new("test-secret"),
            config,
        )
    }

    fn stream1() -> StreamId {
        StreamId::new("stream-1")
    }

    fn demo_token(engine: &SessionEngine) -> String {
        engine.login("demo@local", "demo").unwrap().access_token
    }

    fn go_live(engine: &SessionEngine) {
        engine.set_stream_state(&stream1(), StreamStatus::Live).unwrap();
    }

    fn start(engine: &SessionEngine, token: &str) -> Result<PlaybackGrant, PlaybackError> {
        engine.start_playback(StartPlayback {
            stream_id: stream1(),
            token: token.to_string(),
            ip: "127.0.0.1".into(),
            user_agent: "test".into(),
        })
    }

    fn playback_errors(engine: &SessionEngine) -> u64 {
        engine.error_summary()[&ErrorKind::PlaybackErrors]
    }

    // =====================================================================
    // login() / refresh() / authenticate()
    // =====================================================================

    #[test]
    fn test_login_valid_credentials_returns_tokens_and_user() {
        let engine = engine();

        let resp = engine.login("demo@local", "demo").unwrap();

        assert_eq!(resp.user.email, "demo@local");
        assert_ne!(resp.access_token, resp.refresh_token);
        let identity = engine.authenticate(&resp.access_token).unwrap();
        assert_eq!(identity.user_id, resp.user.id);
        assert_eq!(identity.role, Role::User);
    }

    #[test]
    fn test_login_wrong_password_and_unknown_email_look_identical() {
        let engine = engine();

        let wrong_pw = engine.login("demo@local", "nope").unwrap_err();
        let unknown = engine.login("ghost@local", "demo").unwrap_err();

        assert_eq!(wrong_pw.reason(), unknown.reason());
        assert_eq!(wrong_pw.status_code(), 401);
        assert_eq!(engine.error_summary()[&ErrorKind::LoginFailures], 2);
    }

    #[test]
    fn test_refresh_valid_refresh_token_returns_access_token() {
        let engine = engine();
        let login = engine.login("admin@local", "admin").unwrap();

        let refreshed = engine.refresh(&login.refresh_token).unwrap();

        let identity = engine.authenticate(&refreshed.access_token).unwrap();
        assert!(identity.is_admin());
    }

    #[test]
    fn test_refresh_access_token_is_rejected() {
        let engine = engine();
        let login = engine.login("demo@local", "demo").unwrap();

        let err = engine.refresh(&login.access_token).unwrap_err();

        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_authenticate_refresh_token_is_rejected() {
        let engine = engine();
        let login = engine.login("demo@local", "demo").unwrap();

        assert!(engine.authenticate(&login.refresh_token).is_err());
        assert!(matches!(engine.authenticate(""), Err(PlaybackError::MissingToken)));
    }

    #[test]
    fn test_authenticate_token_from_other_secret_is_rejected() {
        let engine = engine();
        let other = engine_with(EngineConfig::default());
        let foreign = SessionEngine::new(
            Arc::clone(other.store()),
            TokenCodec::new("another-secret"),
            EngineConfig::default(),
        );
        let token = demo_token(&foreign);

        let err = engine.authenticate(&token).unwrap_err();

        assert!(matches!(err, PlaybackError::Unauthorized(TokenError::InvalidSignature)));
    }

    #[test]
    fn test_require_admin_user_role_is_forbidden() {
        let engine = engine();
        let user = engine.authenticate(&demo_token(&engine)).unwrap();

        assert!(matches!(engine.require_admin(&user), Err(PlaybackError::Forbidden)));
    }

    // =====================================================================
    // streams
    // =====================================================================

    #[test]
    fn test_patch_stream_unknown_returns_not_found() {
        let engine = engine();

        let err = engine
            .patch_stream(&StreamId::new("nope"), &StreamPatch::default())
            .unwrap_err();

        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_set_stream_state_unknown_returns_not_found() {
        let engine = engine();
        let err = engine
            .set_stream_state(&StreamId::new("nope"), StreamStatus::Live)
            .unwrap_err();
        assert!(matches!(err, PlaybackError::StreamNotFound(_)));
    }

    #[test]
    fn test_stream_runtime_counts_active_viewers() {
        let engine = engine();
        go_live(&engine);
        let token = demo_token(&engine);
        start(&engine, &token).unwrap();

        let runtime = engine.stream_runtime(&stream1()).unwrap();

        assert_eq!(runtime.current_viewers, 1);
        assert_eq!(runtime.stream.id, stream1());
    }

    // =====================================================================
    // start_playback()
    // =====================================================================

    #[test]
    fn test_start_playback_live_stream_returns_grant() {
        let engine = engine_with(EngineConfig {
            play_base_url: "http://edge.local/".into(),
            ..EngineConfig::default()
        });
        go_live(&engine);

        let grant = start(&engine, &demo_token(&engine)).unwrap();

        assert!(grant.play_token.starts_with(&format!("play:{}:", grant.session_id)));
        assert_eq!(
            grant.play_url,
            format!(
                "http://edge.local/play/{}/master.m3u8?token={}",
                grant.session_id, grant.play_token
            )
        );
        let session = engine.store().get_session(&grant.session_id).unwrap();
        assert_eq!(session.state, SessionState::Active);
        assert_eq!(session.ip, "127.0.0.1");
    }

    #[test]
    fn test_start_playback_bad_token_returns_unauthorized() {
        let engine = engine();
        go_live(&engine);

        let err = start(&engine, "garbage").unwrap_err();

        assert_eq!(err.status_code(), 401);
        assert_eq!(playback_errors(&engine), 1);
    }

    #[test]
    fn test_start_playback_paused_stream_returns_bad_request() {
        let engine = engine();

        let err = start(&engine, &demo_token(&engine)).unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert_eq!(err.reason(), "stream not live");
        assert_eq!(engine.metrics().store.sessions, 0);
    }

    #[test]
    fn test_start_playback_unknown_stream_returns_bad_request() {
        let engine = engine();

        let err = engine
            .start_playback(StartPlayback {
                stream_id: StreamId::new("nope"),
                token: demo_token(&engine),
                ip: String::new(),
                user_agent: String::new(),
            })
            .unwrap_err();

        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_start_playback_empty_wallet_returns_payment_required() {
        let engine = engine();
        go_live(&engine);
        // The seeded admin has no points.
        let admin = engine.login("admin@local", "admin").unwrap().access_token;

        let err = start(&engine, &admin).unwrap_err();

        assert_eq!(err.status_code(), 402);
    }

    #[test]
    fn test_start_playback_over_cap_returns_too_many_requests() {
        let engine = engine();
        go_live(&engine);
        let token = demo_token(&engine);
        start(&engine, &token).unwrap();
        start(&engine, &token).unwrap();

        let err = start(&engine, &token).unwrap_err();

        assert_eq!(err.status_code(), 429);
        assert_eq!(engine.metrics().store.sessions, 2);
        assert_eq!(playback_errors(&engine), 1);
    }

    // =====================================================================
    // renew_playback()
    // =====================================================================

    #[test]
    fn test_renew_playback_active_session_does_not_charge() {
        let engine = engine();
        go_live(&engine);
        let grant = start(&engine, &demo_token(&engine)).unwrap();

        let renewed = engine.renew_playback(&grant.session_id).unwrap();

        assert_eq!(renewed.session_id, grant.session_id);
        assert!(engine.store().ledger().is_empty());
    }

    #[test]
    fn test_renew_playback_unknown_session_returns_not_found() {
        let engine = engine();
        let err = engine.renew_playback(&SessionId::new("s_x")).unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_renew_playback_stopped_session_returns_forbidden() {
        let engine = engine();
        go_live(&engine);
        let grant = start(&engine, &demo_token(&engine)).unwrap();
        engine.stop_session(&grant.session_id);

        let err = engine.renew_playback(&grant.session_id).unwrap_err();

        assert_eq!(err.status_code(), 403);
        assert_eq!(err.reason(), "session not active");
    }

    // =====================================================================
    // heartbeat()
    // =====================================================================

    #[test]
    fn test_heartbeat_active_session_charges_points_rate() {
        let engine = engine();
        go_live(&engine);
        let grant = start(&engine, &demo_token(&engine)).unwrap();

        let report = engine.heartbeat(&grant.session_id).unwrap();

        assert_eq!(report.state, SessionState::Active);
        assert_eq!(report.balance_points, DEMO_BALANCE - 5);
    }

    #[test]
    fn test_heartbeat_unknown_session_returns_not_found() {
        let engine = engine();
        let err = engine.heartbeat(&SessionId::new("s_x")).unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(playback_errors(&engine), 1);
    }

    #[test]
    fn test_heartbeat_kicked_session_is_not_charged() {
        let engine = engine();
        go_live(&engine);
        let grant = start(&engine, &demo_token(&engine)).unwrap();
        engine.kick_session(&grant.session_id);

        let err = engine.heartbeat(&grant.session_id).unwrap_err();

        assert_eq!(err.status_code(), 404);
        assert!(engine.store().ledger().is_empty());
    }

    // =====================================================================
    // stop_session() / kick_session()
    // =====================================================================

    #[test]
    fn test_stop_session_unknown_is_silent() {
        let engine = engine();
        engine.stop_session(&SessionId::new("s_x"));
        assert_eq!(engine.metrics().store.sessions, 0);
    }

    #[test]
    fn test_stop_session_blocked_session_stays_blocked() {
        let engine = engine();
        go_live(&engine);
        let grant = start(&engine, &demo_token(&engine)).unwrap();
        engine.kick_session(&grant.session_id);

        engine.stop_session(&grant.session_id);

        let state = engine.store().get_session(&grant.session_id).unwrap().state;
        assert_eq!(state, SessionState::Blocked);
    }

    #[test]
    fn test_stop_session_frees_capacity() {
        let engine = engine();
        go_live(&engine);
        let token = demo_token(&engine);
        let first = start(&engine, &token).unwrap();
        start(&engine, &token).unwrap();

        engine.stop_session(&first.session_id);

        assert!(start(&engine, &token).is_ok());
    }

    // =====================================================================
    // validate_playback()
    // =====================================================================

    #[test]
    fn test_validate_playback_fresh_grant_is_accepted() {
        let engine = engine();
        go_live(&engine);
        let grant = start(&engine, &demo_token(&engine)).unwrap();

        assert!(engine.validate_playback(&grant.play_token, &grant.session_id).is_ok());
    }

    #[test]
    fn test_validate_playback_other_session_returns_unauthorized() {
        let engine = engine();
        go_live(&engine);
        let token = demo_token(&engine);
        let a = start(&engine, &token).unwrap();
        let b = start(&engine, &token).unwrap();

        let err = engine.validate_playback(&a.play_token, &b.session_id).unwrap_err();

        assert!(matches!(err, PlaybackError::Unauthorized(TokenError::SessionMismatch)));
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_validate_playback_expired_token_returns_unauthorized() {
        let engine = engine_with(EngineConfig {
            playback_ttl: Duration::ZERO,
            ..EngineConfig::default()
        });
        go_live(&engine);
        let grant = start(&engine, &demo_token(&engine)).unwrap();

        let err = engine
            .validate_playback(&grant.play_token, &grant.session_id)
            .unwrap_err();

        assert!(matches!(err, PlaybackError::Unauthorized(TokenError::Expired)));
    }

    #[test]
    fn test_validate_playback_blocked_session_returns_forbidden() {
        let engine = engine();
        go_live(&engine);
        let grant = start(&engine, &demo_token(&engine)).unwrap();
        engine.kick_session(&grant.session_id);

        let err = engine
            .validate_playback(&grant.play_token, &grant.session_id)
            .unwrap_err();

        assert_eq!(err.status_code(), 403);
        assert_eq!(playback_errors(&engine), 1);
    }

    #[test]
    fn test_validate_playback_paused_stream_depends_on_policy() {
        for (policy, allowed) in [
            (ValidationPolicy::RequireLiveStream, false),
            (ValidationPolicy::Lenient, true),
        ] {
            let engine = engine_with(EngineConfig {
                validation: policy,
                ..EngineConfig::default()
            });
            go_live(&engine);
            let grant = start(&engine, &demo_token(&engine)).unwrap();
            engine.set_stream_state(&stream1(), StreamStatus::Paused).unwrap();

            let result = engine.validate_playback(&grant.play_token, &grant.session_id);

            assert_eq!(result.is_ok(), allowed, "{policy:?}");
        }
    }

    #[test]
    fn test_validate_playback_empty_token_returns_unauthorized() {
        let engine = engine();
        let err = engine.validate_playback("", &SessionId::new("s_x")).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    // =====================================================================
    // metrics()
    // =====================================================================

    #[test]
    fn test_metrics_reports_points_spent_per_minute() {
        let engine = engine();
        go_live(&engine);
        let grant = start(&engine, &demo_token(&engine)).unwrap();
        engine.heartbeat(&grant.session_id).unwrap();
        engine.heartbeat(&grant.session_id).unwrap();

        let metrics = engine.metrics();

        assert_eq!(metrics.points_spent_per_minute, 10);
        assert_eq!(metrics.store.active_sessions, 1);
        assert_eq!(metrics.store.ledger_entries, 2);
    }

    #[test]
    fn test_metrics_report_serializes_flat() {
        let engine = engine();
        let json = serde_json::to_value(engine.metrics()).unwrap();
        assert_eq!(json["users"], 2);
        assert_eq!(json["points_spent_per_minute"], 0);
    }
}
