//! The entitlement store: the single source of truth for users, wallets,
//! streams, playback sessions, and the points ledger.
//!
//! # Concurrency
//!
//! Every table lives behind one `parking_lot::Mutex`. Each public method
//! takes the lock once, does pure in-memory work, and releases it, so
//! every call is indivisible to concurrent callers. Nothing blocks on I/O
//! while the lock is held, and that includes log output: the locked
//! section hands back what the event needs, and the event is emitted
//! after the guard drops.
//!
//! Operations that combine a check with a mutation (`open_session`,
//! `charge_heartbeat`, `transition_session`) do both inside the same
//! critical section. That is what keeps two concurrent heartbeats from
//! double-spending a wallet, and two concurrent starts from slipping past
//! the session cap.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use streamgate_protocol::{
    LedgerEntry, LedgerEntryId, LedgerReason, NewStream, Session, SessionId, SessionState, Stream,
    StreamId, User, UserId, Wallet,
};

use crate::{ErrorKind, StoreError, StoreMetrics};

/// Outcome of a heartbeat charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatCharge {
    /// The session after the charge (`Active` or `Blocked`).
    pub session: Session,
    /// Wallet balance after the charge.
    pub balance: i64,
    /// Points actually removed from the wallet (0 if the deduction failed).
    pub charged: i64,
}

/// In-memory entitlement store. Share it as `Arc<MemoryStore>`.
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

/// The raw tables. Only reachable through the lock.
#[derive(Default)]
struct Tables {
    /// Users keyed by email, which uniquely identifies them.
    users: HashMap<String, User>,
    wallets: HashMap<UserId, Wallet>,
    streams: HashMap<StreamId, Stream>,
    sessions: HashMap<SessionId, Session>,
    ledger: Vec<LedgerEntry>,
    errors: BTreeMap<ErrorKind, u64>,
}

impl Tables {
    fn active_sessions_where(&self, pred: impl Fn(&Session) -> bool) -> usize {
        self.sessions
            .values()
            .filter(|s| s.state.is_active() && pred(s))
            .count()
    }

    fn insert_session(
        &mut self,
        user_id: &UserId,
        stream_id: &StreamId,
        ip: &str,
        user_agent: &str,
    ) -> Session {
        let now = Utc::now();
        let session = Session {
            id: SessionId::generate(),
            user_id: user_id.clone(),
            stream_id: stream_id.clone(),
            state: SessionState::Active,
            started_at: now,
            last_seen_at: now,
            ip: ip.to_string(),
            user_agent: user_agent.to_string(),
        };
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// Deducts `amount` from the user's wallet and appends a ledger entry.
    ///
    /// The balance is clamped at zero; the ledger records what was
    /// actually removed so the ledger always sums to the wallet history.
    fn deduct(
        &mut self,
        user_id: &UserId,
        stream_id: &StreamId,
        session_id: &SessionId,
        amount: i64,
    ) -> Result<(i64, i64), StoreError> {
        let wallet = self
            .wallets
            .get_mut(user_id)
            .ok_or_else(|| StoreError::WalletNotFound(user_id.clone()))?;
        if wallet.balance <= 0 {
            return Err(StoreError::InsufficientPoints(user_id.clone()));
        }

        let before = wallet.balance;
        wallet.balance = (before - amount.max(0)).max(0);
        let remaining = wallet.balance;
        let charged = before - remaining;

        self.ledger.push(LedgerEntry {
            id: LedgerEntryId::generate(),
            user_id: user_id.clone(),
            stream_id: stream_id.clone(),
            session_id: session_id.clone(),
            delta: -charged,
            reason: LedgerReason::HeartbeatDeduction,
            created_at: Utc::now(),
        });

        Ok((remaining, charged))
    }
}

fn log_session_created(session: &Session) {
    tracing::info!(
        session_id = %session.id,
        user_id = %session.user_id,
        stream_id = %session.stream_id,
        "playback session created"
    );
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    // =====================================================================
    // Users and wallets
    // =====================================================================

    /// Registers a user with a wallet holding `balance` points.
    ///
    /// # Errors
    /// [`StoreError::EmailTaken`] if the email is already registered.
    pub fn insert_user(&self, user: User, balance: i64) -> Result<User, StoreError> {
        let mut tables = self.tables.lock();
        if tables.users.contains_key(&user.email) {
            return Err(StoreError::EmailTaken(user.email));
        }
        tables.wallets.insert(
            user.id.clone(),
            Wallet {
                user_id: user.id.clone(),
                balance: balance.max(0),
            },
        );
        tables.users.insert(user.email.clone(), user.clone());
        Ok(user)
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<User> {
        self.tables.lock().users.get(email).cloned()
    }

    pub fn get_wallet(&self, user_id: &UserId) -> Option<Wallet> {
        self.tables.lock().wallets.get(user_id).cloned()
    }

    // =====================================================================
    // Streams
    // =====================================================================

    /// Stores a new stream, assigning an id if absent and defaulting the
    /// status to `Draft`. An existing stream with the same id is replaced.
    pub fn create_stream(&self, new: NewStream) -> Stream {
        let stream = new.into_stream();
        self.tables
            .lock()
            .streams
            .insert(stream.id.clone(), stream.clone());
        tracing::info!(stream_id = %stream.id, status = %stream.status, "stream created");
        stream
    }

    /// Applies `mutate` to the stream atomically and returns the result,
    /// or `None` if the id is unknown.
    pub fn update_stream(
        &self,
        id: &StreamId,
        mutate: impl FnOnce(&mut Stream),
    ) -> Option<Stream> {
        let mut tables = self.tables.lock();
        let stream = tables.streams.get_mut(id)?;
        mutate(stream);
        Some(stream.clone())
    }

    pub fn get_stream(&self, id: &StreamId) -> Option<Stream> {
        self.tables.lock().streams.get(id).cloned()
    }

    /// Number of active sessions watching `stream_id`.
    ///
    /// Full scan; fine at this scale.
    pub fn active_viewer_count(&self, stream_id: &StreamId) -> usize {
        self.tables
            .lock()
            .active_sessions_where(|s| &s.stream_id == stream_id)
    }

    /// Number of active sessions owned by `user_id`, across all streams.
    pub fn active_user_session_count(&self, user_id: &UserId) -> usize {
        self.tables
            .lock()
            .active_sessions_where(|s| &s.user_id == user_id)
    }

    // =====================================================================
    // Sessions
    // =====================================================================

    /// Creates an active session unconditionally.
    ///
    /// Prefer [`open_session`](Self::open_session), which checks
    /// entitlement in the same critical section.
    pub fn create_session(
        &self,
        user_id: &UserId,
        stream_id: &StreamId,
        ip: &str,
        user_agent: &str,
    ) -> Session {
        let session = self
            .tables
            .lock()
            .insert_session(user_id, stream_id, ip, user_agent);
        log_session_created(&session);
        session
    }

    /// Creates an active session if the user is entitled to one.
    ///
    /// Checks, in order: the stream exists and is live, the wallet exists
    /// with a positive balance, and the user's active sessions are below
    /// the stream's cap. Nothing is created if any check fails.
    ///
    /// # Errors
    /// [`StoreError::StreamNotFound`], [`StoreError::StreamNotLive`],
    /// [`StoreError::WalletNotFound`], [`StoreError::InsufficientPoints`],
    /// [`StoreError::CapacityExceeded`].
    pub fn open_session(
        &self,
        user_id: &UserId,
        stream_id: &StreamId,
        ip: &str,
        user_agent: &str,
    ) -> Result<Session, StoreError> {
        let mut tables = self.tables.lock();

        let stream = tables
            .streams
            .get(stream_id)
            .ok_or_else(|| StoreError::StreamNotFound(stream_id.clone()))?;
        if !stream.status.is_playable() {
            return Err(StoreError::StreamNotLive {
                id: stream_id.clone(),
                status: stream.status,
            });
        }
        let limit = stream.max_concurrent_sessions;

        match tables.wallets.get(user_id) {
            None => return Err(StoreError::WalletNotFound(user_id.clone())),
            Some(wallet) if wallet.balance <= 0 => {
                return Err(StoreError::InsufficientPoints(user_id.clone()));
            }
            Some(_) => {}
        }

        if tables.active_sessions_where(|s| &s.user_id == user_id) >= limit as usize {
            return Err(StoreError::CapacityExceeded { limit });
        }

        let session = tables.insert_session(user_id, stream_id, ip, user_agent);
        drop(tables);

        log_session_created(&session);
        Ok(session)
    }

    pub fn get_session(&self, id: &SessionId) -> Option<Session> {
        self.tables.lock().sessions.get(id).cloned()
    }

    /// Overwrites the session's state and bumps `last_seen_at`.
    ///
    /// No legality check: this is the raw primitive. Use
    /// [`transition_session`](Self::transition_session) to enforce the
    /// state machine. Returns `false` if the session is unknown.
    pub fn update_session_state(&self, id: &SessionId, state: SessionState) -> bool {
        let mut tables = self.tables.lock();
        let Some(session) = tables.sessions.get_mut(id) else {
            return false;
        };
        session.state = state;
        session.last_seen_at = Utc::now();
        true
    }

    /// Moves the session to `target` if the state machine allows it.
    ///
    /// Asking a terminal session for the state it is already in is an
    /// idempotent no-op.
    ///
    /// # Errors
    /// - [`StoreError::SessionNotFound`] — unknown id
    /// - [`StoreError::IllegalTransition`] — e.g. `Blocked -> Active`
    pub fn transition_session(
        &self,
        id: &SessionId,
        target: SessionState,
    ) -> Result<Session, StoreError> {
        let (from, session) = {
            let mut tables = self.tables.lock();
            let session = tables
                .sessions
                .get_mut(id)
                .ok_or_else(|| StoreError::SessionNotFound(id.clone()))?;

            let from = session.state;
            if from == target && target.is_terminal() {
                return Ok(session.clone());
            }
            if !from.can_transition_to(target) {
                return Err(StoreError::IllegalTransition { from, to: target });
            }

            session.state = target;
            session.last_seen_at = Utc::now();
            (from, session.clone())
        };

        if from != target {
            tracing::info!(session_id = %id, %from, to = %target, "session state changed");
        }
        Ok(session)
    }

    /// Bumps `last_seen_at`. Returns `false` if the session is unknown.
    pub fn touch_session(&self, id: &SessionId) -> bool {
        let mut tables = self.tables.lock();
        let Some(session) = tables.sessions.get_mut(id) else {
            return false;
        };
        session.last_seen_at = Utc::now();
        true
    }

    // =====================================================================
    // Points
    // =====================================================================

    /// Deducts `amount` points and appends one ledger entry.
    ///
    /// The balance is clamped at zero, never negative. Returns the
    /// remaining balance.
    ///
    /// # Errors
    /// [`StoreError::WalletNotFound`], or [`StoreError::InsufficientPoints`]
    /// if the wallet is already at zero.
    pub fn deduct_points(
        &self,
        user_id: &UserId,
        stream_id: &StreamId,
        session_id: &SessionId,
        amount: i64,
    ) -> Result<i64, StoreError> {
        let (remaining, charged) = self
            .tables
            .lock()
            .deduct(user_id, stream_id, session_id, amount)?;
        tracing::debug!(%user_id, %session_id, charged, remaining, "points deducted");
        Ok(remaining)
    }

    /// Charges one heartbeat for an active session.
    ///
    /// Deduction and state transition are a single unit: the stream's
    /// `points_rate` is deducted from the owner's wallet and, if the
    /// deduction fails or leaves the balance at zero, the session becomes
    /// `Blocked`. Otherwise the session's `last_seen_at` is refreshed.
    ///
    /// # Errors
    /// - [`StoreError::SessionNotFound`] / [`StoreError::StreamNotFound`]
    /// - [`StoreError::SessionNotActive`] — already blocked or stopped;
    ///   nothing is charged
    pub fn charge_heartbeat(&self, session_id: &SessionId) -> Result<HeartbeatCharge, StoreError> {
        let (charge, deduct_error) = {
            let mut tables = self.tables.lock();

            let session = tables
                .sessions
                .get(session_id)
                .ok_or_else(|| StoreError::SessionNotFound(session_id.clone()))?;
            if !session.state.is_active() {
                return Err(StoreError::SessionNotActive {
                    id: session_id.clone(),
                    state: session.state,
                });
            }
            let user_id = session.user_id.clone();
            let stream_id = session.stream_id.clone();

            let rate = tables
                .streams
                .get(&stream_id)
                .ok_or_else(|| StoreError::StreamNotFound(stream_id.clone()))?
                .points_rate;

            let (state, balance, charged, deduct_error) =
                match tables.deduct(&user_id, &stream_id, session_id, i64::from(rate)) {
                    Ok((remaining, charged)) if remaining > 0 => {
                        (SessionState::Active, remaining, charged, None)
                    }
                    Ok((remaining, charged)) => (SessionState::Blocked, remaining, charged, None),
                    Err(e) => {
                        let balance = tables.wallets.get(&user_id).map_or(0, |w| w.balance);
                        (SessionState::Blocked, balance, 0, Some(e))
                    }
                };

            let session = tables
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| StoreError::SessionNotFound(session_id.clone()))?;
            session.state = state;
            session.last_seen_at = Utc::now();

            let charge = HeartbeatCharge {
                session: session.clone(),
                balance,
                charged,
            };
            (charge, deduct_error)
        };

        match &deduct_error {
            Some(e) => tracing::debug!(%session_id, error = %e, "heartbeat deduction failed"),
            None => tracing::debug!(
                %session_id,
                charged = charge.charged,
                remaining = charge.balance,
                "points deducted"
            ),
        }
        if charge.session.state == SessionState::Blocked {
            tracing::info!(
                %session_id,
                user_id = %charge.session.user_id,
                balance = charge.balance,
                "session blocked: balance exhausted"
            );
        }

        Ok(charge)
    }

    // =====================================================================
    // Observability
    // =====================================================================

    pub fn record_error(&self, kind: ErrorKind) {
        *self.tables.lock().errors.entry(kind).or_default() += 1;
    }

    /// Counts by error kind. Every kind is present, zero if never seen.
    pub fn error_summary(&self) -> BTreeMap<ErrorKind, u64> {
        let tables = self.tables.lock();
        ErrorKind::ALL
            .into_iter()
            .map(|kind| (kind, tables.errors.get(&kind).copied().unwrap_or(0)))
            .collect()
    }

    pub fn metrics(&self) -> StoreMetrics {
        let tables = self.tables.lock();
        StoreMetrics {
            users: tables.users.len(),
            streams: tables.streams.len(),
            sessions: tables.sessions.len(),
            active_sessions: tables.active_sessions_where(|_| true),
            ledger_entries: tables.ledger.len(),
        }
    }

    /// Total points deducted at or after `since`, as a positive number.
    pub fn points_spent_since(&self, since: DateTime<Utc>) -> i64 {
        self.tables
            .lock()
            .ledger
            .iter()
            .filter(|entry| entry.created_at >= since)
            .map(|entry| -entry.delta)
            .sum()
    }

    /// Total points deducted within the trailing 60 seconds.
    pub fn points_spent_last_minute(&self) -> i64 {
        self.points_spent_since(Utc::now() - chrono::Duration::seconds(60))
    }

    /// Snapshot of the ledger, oldest first.
    pub fn ledger(&self) -> Vec<LedgerEntry> {
        self.tables.lock().ledger.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
