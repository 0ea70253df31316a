//! Bootstrap data for a fresh process.

use streamgate_protocol::{NewStream, Role, StreamId, StreamStatus, User, UserId};

use crate::MemoryStore;

/// Points granted to the demo viewer.
pub const DEMO_BALANCE: i64 = 1000;

impl MemoryStore {
    /// A store holding one admin, one demo viewer, and one paused stream.
    ///
    /// | email        | password | role  | balance |
    /// |--------------|----------|-------|---------|
    /// | `admin@local`| `admin`  | admin | 0       |
    /// | `demo@local` | `demo`   | user  | 1000    |
    ///
    /// `stream-1` ("Default Stream") starts paused: an admin has to set it
    /// live before anyone can watch.
    pub fn seeded() -> Self {
        let store = Self::new();

        for (id, email, password, role, balance) in [
            ("u_admin", "admin@local", "admin", Role::Admin, 0),
            ("u_demo", "demo@local", "demo", Role::User, DEMO_BALANCE),
        ] {
            let user = User {
                id: UserId::new(id),
                email: email.to_string(),
                password: password.to_string(),
                role,
                status: "active".to_string(),
            };
            // The store is empty, so emails cannot collide.
            if let Err(e) = store.insert_user(user, balance) {
                tracing::warn!(error = %e, "seed user skipped");
            }
        }

        store.create_stream(NewStream {
            id: Some(StreamId::new("stream-1")),
            name: "Default Stream".to_string(),
            status: Some(StreamStatus::Paused),
            ingest_mode: "url".to_string(),
            ingest_url: String::new(),
            segment_duration_sec: 4,
            playlist_window_minutes: 2,
            points_rate: 5,
            max_concurrent_sessions: 2,
        });

        store
    }
}
