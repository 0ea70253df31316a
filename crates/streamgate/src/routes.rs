//! HTTP routes: decode the request, call the engine, encode the result.
//!
//! Handlers hold no logic of their own. Authentication happens in the
//! [`Caller`]/[`Admin`] extractors, rate limiting in route middleware,
//! and every failure becomes an [`ApiError`] rendered as
//! `{"error": "<reason>"}`.
//!
//! | Method | Path                           | Auth   |
//! |--------|--------------------------------|--------|
//! | GET    | `/healthz`                     | none   |
//! | POST   | `/auth/login`                  | none, rate limited |
//! | POST   | `/auth/refresh`                | none   |
//! | POST   | `/streams`                     | admin  |
//! | PATCH  | `/streams/:id`                 | admin  |
//! | POST   | `/streams/:id/state`           | admin  |
//! | GET    | `/streams/:id/runtime`         | caller |
//! | POST   | `/playback/start`              | token in body, rate limited |
//! | POST   | `/playback/renew`              | none   |
//! | POST   | `/playback/heartbeat`          | none   |
//! | POST   | `/playback/stop`               | none   |
//! | POST   | `/playback/kick`               | admin  |
//! | GET    | `/internal/validate-playback`  | play token |
//! | GET    | `/monitoring/health`           | admin  |
//! | GET    | `/monitoring/metrics`          | admin  |
//! | GET    | `/monitoring/errors`           | admin  |

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{ConnectInfo, FromRequest, Path, Query, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use streamgate_protocol::{
    HeartbeatReport, LoginRequest, LoginResponse, NewStream, PlaybackGrant, RefreshRequest,
    RefreshResponse, SessionId, SessionRequest, SessionState, SetStateRequest,
    StartPlaybackRequest, StatusBody, Stream, StreamId, StreamPatch, StreamRuntime,
    StreamStateChanged,
};
use streamgate_session::{MetricsReport, SessionEngine, StartPlayback};
use streamgate_store::ErrorKind;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{Admin, Caller, bearer_token};
use crate::{ApiError, Bucket, RateLimits};

/// Header carrying the session id on media validation requests.
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Shared state handed to every handler.
pub struct AppState {
    pub(crate) engine: SessionEngine,
    pub(crate) limits: RateLimits,
}

impl AppState {
    pub fn new(engine: SessionEngine, limits: RateLimits) -> Self {
        Self { engine, limits }
    }

    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }
}

/// JSON body extractor whose rejection is an [`ApiError`], so malformed
/// bodies get the same `{"error": ...}` shape as everything else.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Body<T>(pub T);

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let login_route = post(login).route_layer(middleware::from_fn_with_state(
        Arc::clone(&state),
        limit_login,
    ));
    let start_route = post(start_playback).route_layer(middleware::from_fn_with_state(
        Arc::clone(&state),
        limit_playback_start,
    ));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/login", login_route)
        .route("/auth/refresh", post(refresh))
        .route("/streams", post(create_stream))
        .route("/streams/:id", patch(patch_stream))
        .route("/streams/:id/state", post(set_stream_state))
        .route("/streams/:id/runtime", get(stream_runtime))
        .route("/playback/start", start_route)
        .route("/playback/renew", post(renew_playback))
        .route("/playback/heartbeat", post(heartbeat))
        .route("/playback/stop", post(stop_session))
        .route("/playback/kick", post(kick_session))
        .route("/internal/validate-playback", get(validate_playback))
        .route("/monitoring/health", get(monitoring_health))
        .route("/monitoring/metrics", get(monitoring_metrics))
        .route("/monitoring/errors", get(monitoring_errors))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

async fn limit_login(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state.limits.check(Bucket::Login, addr.ip())?;
    Ok(next.run(request).await)
}

async fn limit_playback_start(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state.limits.check(Bucket::PlaybackStart, addr.ip())?;
    Ok(next.run(request).await)
}

// ---------------------------------------------------------------------------
// Health and auth
// ---------------------------------------------------------------------------

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok", "time": Utc::now() }))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Body(req): Body<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    Ok(Json(state.engine.login(&req.email, &req.password)?))
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    Body(req): Body<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    Ok(Json(state.engine.refresh(&req.refresh_token)?))
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

async fn create_stream(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    Body(new): Body<NewStream>,
) -> (StatusCode, Json<Stream>) {
    (StatusCode::CREATED, Json(state.engine.create_stream(new)))
}

async fn patch_stream(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    Path(id): Path<StreamId>,
    Body(patch): Body<StreamPatch>,
) -> Result<Json<Stream>, ApiError> {
    Ok(Json(state.engine.patch_stream(&id, &patch)?))
}

async fn set_stream_state(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    Path(id): Path<StreamId>,
    Body(req): Body<SetStateRequest>,
) -> Result<Json<StreamStateChanged>, ApiError> {
    Ok(Json(state.engine.set_stream_state(&id, req.state)?))
}

async fn stream_runtime(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    Path(id): Path<StreamId>,
) -> Result<Json<StreamRuntime>, ApiError> {
    Ok(Json(state.engine.stream_runtime(&id)?))
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

async fn start_playback(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Body(req): Body<StartPlaybackRequest>,
) -> Result<Json<PlaybackGrant>, ApiError> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let grant = state.engine.start_playback(StartPlayback {
        stream_id: req.stream_id,
        token: req.token,
        ip: addr.ip().to_string(),
        user_agent,
    })?;
    Ok(Json(grant))
}

async fn renew_playback(
    State(state): State<Arc<AppState>>,
    Body(req): Body<SessionRequest>,
) -> Result<Json<PlaybackGrant>, ApiError> {
    Ok(Json(state.engine.renew_playback(&req.session_id)?))
}

/// 200 while the session stays active, 402 on the beat that blocks it.
async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Body(req): Body<SessionRequest>,
) -> Result<(StatusCode, Json<HeartbeatReport>), ApiError> {
    let report = state.engine.heartbeat(&req.session_id)?;
    let status = match report.state {
        SessionState::Blocked => StatusCode::PAYMENT_REQUIRED,
        _ => StatusCode::OK,
    };
    Ok((status, Json(report)))
}

async fn stop_session(
    State(state): State<Arc<AppState>>,
    Body(req): Body<SessionRequest>,
) -> Json<StatusBody> {
    state.engine.stop_session(&req.session_id);
    Json(StatusBody::new("stopped"))
}

async fn kick_session(
    State(state): State<Arc<AppState>>,
    Admin(admin): Admin,
    Body(req): Body<SessionRequest>,
) -> Json<StatusBody> {
    tracing::info!(session_id = %req.session_id, by = %admin.user_id, "session kicked");
    state.engine.kick_session(&req.session_id);
    Json(StatusBody::new("kicked"))
}

#[derive(Debug, Deserialize)]
struct ValidateQuery {
    token: Option<String>,
}

/// Media-edge hook: the play token comes from a bearer header or the
/// `token` query parameter, the session from `X-Session-Id`.
async fn validate_playback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ValidateQuery>,
) -> Result<StatusCode, ApiError> {
    let token = match bearer_token(&headers) {
        "" => query.token.unwrap_or_default(),
        token => token.to_string(),
    };
    let session_id = headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    state
        .engine
        .validate_playback(&token, &SessionId::new(session_id))?;
    Ok(StatusCode::OK)
}

// ---------------------------------------------------------------------------
// Monitoring
// ---------------------------------------------------------------------------

async fn monitoring_health(_admin: Admin) -> Json<StatusBody> {
    Json(StatusBody::new("ok"))
}

async fn monitoring_metrics(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
) -> Json<MetricsReport> {
    Json(state.engine.metrics())
}

async fn monitoring_errors(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
) -> Json<BTreeMap<ErrorKind, u64>> {
    Json(state.engine.error_summary())
}
