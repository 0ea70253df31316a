//! Lookup hook for user accounts.
//!
//! Streamgate doesn't own credential storage. Login asks a
//! [`UserDirectory`] for the account behind an email and compares the
//! password itself. In development the seeded [`MemoryStore`] doubles as
//! the directory; in production this is where an identity provider or a
//! user database plugs in.

use std::sync::Arc;

use streamgate_protocol::User;
use streamgate_store::MemoryStore;

/// Finds user accounts by email.
///
/// `Send + Sync + 'static` because the engine is shared by every request
/// handler for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use streamgate_protocol::{Role, User, UserId};
/// use streamgate_session::UserDirectory;
///
/// /// A directory with exactly one account.
/// struct SingleUser(User);
///
/// impl UserDirectory for SingleUser {
///     fn find_by_email(&self, email: &str) -> Option<User> {
///         (self.0.email == email).then(|| self.0.clone())
///     }
/// }
///
/// let dir = SingleUser(User {
///     id: UserId::new("u_1"),
///     email: "a@local".into(),
///     password: "pw".into(),
///     role: Role::User,
///     status: "active".into(),
/// });
/// assert!(dir.find_by_email("a@local").is_some());
/// assert!(dir.find_by_email("b@local").is_none());
/// ```
pub trait UserDirectory: Send + Sync + 'static {
    /// Returns the account registered under `email`, if any.
    fn find_by_email(&self, email: &str) -> Option<User>;
}

impl UserDirectory for MemoryStore {
    fn find_by_email(&self, email: &str) -> Option<User> {
        self.find_user_by_email(email)
    }
}

impl<T: UserDirectory + ?Sized> UserDirectory for Arc<T> {
    fn find_by_email(&self, email: &str) -> Option<User> {
        (**self).find_by_email(email)
    }
}
