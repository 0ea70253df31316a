//! End-to-end playback scenarios against the engine, without HTTP.

use std::sync::Arc;
use std::thread;

use streamgate_protocol::{
    NewStream, Role, SessionState, StreamId, StreamStatus, TokenCodec, User, UserId,
};
use streamgate_session::{
    EngineConfig, PlaybackError, SessionEngine, StartPlayback, UserDirectory,
};
use streamgate_store::{ErrorKind, MemoryStore};

// =========================================================================
// Helpers
// =========================================================================

/// A store with one viewer holding `balance` points and one live stream.
fn engine(balance: i64, rate: u32, cap: u32) -> SessionEngine {
    let store = MemoryStore::new();
    store
        .insert_user(
            User {
                id: UserId::new("u_viewer"),
                email: "viewer@local".into(),
                password: "pw".into(),
                role: Role::User,
                status: "active".into(),
            },
            balance,
        )
        .unwrap();
    store.create_stream(NewStream {
        id: Some(StreamId::new("stream-live")),
        name: "Live".into(),
        status: Some(StreamStatus::Live),
        points_rate: rate,
        max_concurrent_sessions: cap,
        ..NewStream::default()
    });
    SessionEngine::new(
        Arc::new(store),
        TokenCodec::new("flow-secret"),
        EngineConfig::default(),
    )
}

fn start(
    engine: &SessionEngine,
    token: &str,
) -> Result<streamgate_protocol::PlaybackGrant, PlaybackError> {
    engine.start_playback(StartPlayback {
        stream_id: StreamId::new("stream-live"),
        token: token.to_string(),
        ip: "10.0.0.1".into(),
        user_agent: "flow".into(),
    })
}

fn token(engine: &SessionEngine) -> String {
    engine.login("viewer@local", "pw").unwrap().access_token
}

// =========================================================================
// Scenarios
// =========================================================================

#[test]
fn test_heartbeat_exhaustion_blocks_then_reports_not_active() {
    let engine = engine(5, 5, 1);
    let grant = start(&engine, &token(&engine)).unwrap();

    let first = engine.heartbeat(&grant.session_id).unwrap();
    let second = engine.heartbeat(&grant.session_id).unwrap_err();

    assert_eq!(first.state, SessionState::Blocked);
    assert_eq!(first.balance_points, 0);
    assert_eq!(second.status_code(), 404);
    assert_eq!(second.reason(), "session not active");
    assert_eq!(engine.store().ledger().len(), 1);
}

#[test]
fn test_blocked_session_never_reactivates() {
    let engine = engine(5, 5, 1);
    let grant = start(&engine, &token(&engine)).unwrap();
    engine.heartbeat(&grant.session_id).unwrap();

    assert!(engine.renew_playback(&grant.session_id).is_err());
    assert!(engine.heartbeat(&grant.session_id).is_err());
    engine.stop_session(&grant.session_id);

    let state = engine.store().get_session(&grant.session_id).unwrap().state;
    assert_eq!(state, SessionState::Blocked);
    assert!(engine
        .validate_playback(&grant.play_token, &grant.session_id)
        .is_err());
}

#[test]
fn test_capacity_one_second_start_is_refused() {
    let engine = engine(100, 1, 1);
    let token = token(&engine);

    start(&engine, &token).unwrap();
    let err = start(&engine, &token).unwrap_err();

    assert_eq!(err.status_code(), 429);
    assert_eq!(engine.metrics().store.sessions, 1);
}

#[test]
fn test_paused_stream_refuses_start_regardless_of_balance() {
    let engine = engine(1_000_000, 1, 100);
    engine
        .set_stream_state(&StreamId::new("stream-live"), StreamStatus::Paused)
        .unwrap();

    let err = start(&engine, &token(&engine)).unwrap_err();

    assert_eq!(err.status_code(), 400);
    assert_eq!(engine.error_summary()[&ErrorKind::PlaybackErrors], 1);
}

#[test]
fn test_concurrent_heartbeats_balance_never_negative() {
    let engine = engine(50, 7, 4);
    let token = token(&engine);
    let grants: Vec<_> = (0..4).map(|_| start(&engine, &token).unwrap()).collect();

    let per_thread: Vec<Vec<i64>> = thread::scope(|scope| {
        let handles: Vec<_> = grants
            .iter()
            .map(|grant| {
                let engine = &engine;
                scope.spawn(move || {
                    let mut seen = Vec::new();
                    while let Ok(report) = engine.heartbeat(&grant.session_id) {
                        seen.push(report.balance_points);
                        if report.state == SessionState::Blocked {
                            break;
                        }
                    }
                    seen
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for seen in &per_thread {
        assert!(seen.iter().all(|&balance| balance >= 0));
        assert!(seen.windows(2).all(|w| w[0] >= w[1]), "balance went up: {seen:?}");
    }
    let wallet = engine.store().get_wallet(&UserId::new("u_viewer")).unwrap();
    assert_eq!(wallet.balance, 0);
    let spent: i64 = engine.store().ledger().iter().map(|e| -e.delta).sum();
    assert_eq!(spent, 50);
}

#[test]
fn test_external_directory_is_used_for_login() {
    struct Fixed;

    impl UserDirectory for Fixed {
        fn find_by_email(&self, email: &str) -> Option<User> {
            (email == "ext@local").then(|| User {
                id: UserId::new("u_ext"),
                email: email.to_string(),
                password: "secret".into(),
                role: Role::Admin,
                status: "active".into(),
            })
        }
    }

    let engine = SessionEngine::with_directory(
        Arc::new(MemoryStore::new()),
        Fixed,
        TokenCodec::new("dir-secret"),
        EngineConfig::default(),
    );

    let login = engine.login("ext@local", "secret").unwrap();
    let identity = engine.authenticate(&login.access_token).unwrap();

    assert!(identity.is_admin());
    assert!(engine.login("viewer@local", "pw").is_err());
}
