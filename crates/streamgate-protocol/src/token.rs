//! Stateless signing and verification of identity and playback tokens.
//!
//! Both token kinds are self-contained: checking a signature and an expiry
//! needs nothing but the shared secret and a clock, never a store lookup.
//!
//! - **Identity tokens** are JWT-shaped: `header.claims.signature`, each
//!   segment base64url without padding, signed with HMAC-SHA256 over
//!   `header "." claims`. Claims carry `(sub, rol, exp, typ)`.
//! - **Playback tokens** are compact capabilities for one session:
//!   `play:<session_id>:<exp>:<signature>`, signed over the
//!   `play:<session_id>:<exp>` prefix. They live for seconds, not hours.
//!
//! Every operation takes `now` (unix seconds) explicitly so the expiry
//! boundary is testable; [`now_unix`] supplies wall-clock time.

use std::fmt;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{Role, SessionId, TokenError, UserId};

type HmacSha256 = Hmac<Sha256>;

/// Secret used when none is configured. Fine for local testing only.
pub const DEV_SECRET: &str = "dev-secret-change-me";

const IDENTITY_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;
const PLAYBACK_PREFIX: &str = "play";

/// Current wall-clock time in unix seconds.
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// `now + ttl`, saturating at `i64::MAX` for durations past the end of time.
fn expiry(now: i64, ttl: Duration) -> i64 {
    now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
}

/// Access tokens authorize API calls; refresh tokens only mint new
/// access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by an identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: UserId,
    pub rol: Role,
    /// Expiry, unix seconds.
    pub exp: i64,
    pub typ: TokenKind,
}

impl IdentityClaims {
    /// Builds claims that expire `ttl` after `now`.
    pub fn new(sub: UserId, rol: Role, typ: TokenKind, ttl: Duration, now: i64) -> Self {
        Self {
            sub,
            rol,
            exp: expiry(now, ttl),
            typ,
        }
    }
}

/// Claims carried by a playback token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackClaims {
    pub session_id: SessionId,
    /// Expiry, unix seconds.
    pub exp: i64,
}

impl PlaybackClaims {
    pub fn new(session_id: SessionId, ttl: Duration, now: i64) -> Self {
        Self {
            session_id,
            exp: expiry(now, ttl),
        }
    }
}

/// Signs and verifies tokens with one shared HMAC-SHA256 key.
///
/// Cheap to clone: the keyed MAC state is computed once in [`new`](Self::new)
/// and cloned per operation.
#[derive(Clone)]
pub struct TokenCodec {
    key: HmacSha256,
    dev_secret: bool,
}

impl TokenCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        Self {
            // HMAC accepts keys of any length, so this cannot fail.
            key: HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size"),
            dev_secret: secret == DEV_SECRET.as_bytes(),
        }
    }

    /// A codec keyed with [`DEV_SECRET`].
    pub fn development() -> Self {
        Self::new(DEV_SECRET)
    }

    /// Returns `true` if this codec was built with the development secret.
    pub fn uses_dev_secret(&self) -> bool {
        self.dev_secret
    }

    fn sign(&self, parts: &[&[u8]]) -> String {
        let mut mac = self.key.clone();
        for part in parts {
            mac.update(part);
        }
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    fn check(&self, parts: &[&[u8]], signature: &str) -> Result<(), TokenError> {
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::InvalidFormat)?;
        let mut mac = self.key.clone();
        for part in parts {
            mac.update(part);
        }
        // `verify_slice` compares in constant time.
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)
    }

    // -- Identity tokens --

    /// Encodes and signs identity claims.
    ///
    /// Deterministic: equal claims under the same secret give equal tokens.
    pub fn issue_identity(&self, claims: &IdentityClaims) -> Result<String, TokenError> {
        let header = URL_SAFE_NO_PAD.encode(IDENTITY_HEADER);
        let body = serde_json::to_vec(claims).map_err(TokenError::Encode)?;
        let payload = URL_SAFE_NO_PAD.encode(body);
        let signature = self.sign(&[header.as_bytes(), b".", payload.as_bytes()]);
        Ok(format!("{header}.{payload}.{signature}"))
    }

    /// Verifies an identity token of the `expected` kind at time `now`.
    ///
    /// # Errors
    /// - [`TokenError::InvalidFormat`] — not three segments, bad encoding,
    ///   undecodable claims, or an empty subject
    /// - [`TokenError::InvalidSignature`] — MAC mismatch
    /// - [`TokenError::Expired`] — `exp <= now`
    /// - [`TokenError::WrongKind`] — access/refresh mix-up
    pub fn verify_identity(
        &self,
        token: &str,
        expected: TokenKind,
        now: i64,
    ) -> Result<IdentityClaims, TokenError> {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::InvalidFormat);
        };

        self.check(&[header.as_bytes(), b".", payload.as_bytes()], signature)?;

        let raw = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::InvalidFormat)?;
        let claims: IdentityClaims =
            serde_json::from_slice(&raw).map_err(|_| TokenError::InvalidFormat)?;

        if claims.sub.as_str().is_empty() {
            return Err(TokenError::InvalidFormat);
        }
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }
        if claims.typ != expected {
            return Err(TokenError::WrongKind {
                expected,
                found: claims.typ,
            });
        }
        Ok(claims)
    }

    // -- Playback tokens --

    /// Encodes and signs a playback capability.
    pub fn issue_playback(&self, claims: &PlaybackClaims) -> String {
        let unsigned = format!("{PLAYBACK_PREFIX}:{}:{}", claims.session_id, claims.exp);
        let signature = self.sign(&[unsigned.as_bytes()]);
        format!("{unsigned}:{signature}")
    }

    /// Verifies that `token` authorizes `session_id` at time `now`.
    ///
    /// Checks run in order: shape, signature, session binding, expiry.
    pub fn verify_playback(
        &self,
        token: &str,
        session_id: &SessionId,
        now: i64,
    ) -> Result<PlaybackClaims, TokenError> {
        // Split from the right so the session id itself may contain ':'.
        let (unsigned, signature) = token.rsplit_once(':').ok_or(TokenError::InvalidFormat)?;
        let (head, exp) = unsigned.rsplit_once(':').ok_or(TokenError::InvalidFormat)?;
        let sid = head
            .strip_prefix(PLAYBACK_PREFIX)
            .and_then(|rest| rest.strip_prefix(':'))
            .filter(|sid| !sid.is_empty())
            .ok_or(TokenError::InvalidFormat)?;
        let exp: i64 = exp.parse().map_err(|_| TokenError::InvalidFormat)?;

        self.check(&[unsigned.as_bytes()], signature)?;

        if sid != session_id.as_str() {
            return Err(TokenError::SessionMismatch);
        }
        if exp <= now {
            return Err(TokenError::Expired);
        }
        Ok(PlaybackClaims {
            session_id: SessionId::new(sid),
            exp,
        })
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("dev_secret", &self.dev_secret)
            .finish_non_exhaustive()
    }
}
