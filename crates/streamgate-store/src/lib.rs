//! The entitlement store for Streamgate.
//!
//! [`MemoryStore`] owns every user, wallet, stream, playback session, and
//! ledger entry. Each method is atomic with respect to every other, and
//! the compound operations ([`MemoryStore::open_session`],
//! [`MemoryStore::charge_heartbeat`]) do their check and their mutation
//! under one lock.
//!
//! The store knows nothing about tokens or HTTP. Missing entities come
//! back as [`StoreError`] values or `None`; the session engine decides
//! what they mean to a caller.

mod error;
mod metrics;
mod seed;
mod store;

pub use error::StoreError;
pub use metrics::{ErrorKind, StoreMetrics};
pub use seed::DEMO_BALANCE;
pub use store::{HeartbeatCharge, MemoryStore};
