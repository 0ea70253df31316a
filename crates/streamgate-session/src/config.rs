//! Engine configuration.

use std::time::Duration;

// ---------------------------------------------------------------------------
// ValidationPolicy
// ---------------------------------------------------------------------------

/// How strictly a playback token is checked before media is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationPolicy {
    /// Token and session checks only. Viewers keep watching through a
    /// stream pause until their session ends.
    Lenient,

    /// Additionally require the session's stream to still be live.
    #[default]
    RequireLiveStream,
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Token lifetimes and playback settings for a
/// [`SessionEngine`](crate::SessionEngine).
///
/// Start from `EngineConfig::default()` and override what you need:
///
/// ```rust
/// use std::time::Duration;
/// use streamgate_session::EngineConfig;
///
/// let config = EngineConfig {
///     playback_ttl: Duration::from_secs(30),
///     ..EngineConfig::default()
/// };
/// assert_eq!(config.access_ttl, Duration::from_secs(15 * 60));
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Lifetime of access tokens. Default: 15 minutes.
    pub access_ttl: Duration,

    /// Lifetime of refresh tokens. Default: 12 hours.
    pub refresh_ttl: Duration,

    /// Lifetime of a playback token. Reissued on every start and renew,
    /// so this bounds how long a viewer can watch without renewing.
    /// Default: 90 seconds.
    pub playback_ttl: Duration,

    /// Base URL of the media edge; play URLs are built on top of it.
    /// Default: `http://localhost:8088`.
    pub play_base_url: String,

    pub validation: ValidationPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(12 * 60 * 60),
            playback_ttl: Duration::from_secs(90),
            play_base_url: "http://localhost:8088".to_string(),
            validation: ValidationPolicy::default(),
        }
    }
}
