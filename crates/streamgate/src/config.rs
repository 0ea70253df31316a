//! Process configuration read from the environment.
//!
//! | Variable                     | Default                 |
//! |------------------------------|-------------------------|
//! | `STREAMGATE_BIND`            | `0.0.0.0:8080`          |
//! | `STREAMGATE_TOKEN_SECRET`    | falls back to `TOKEN_SECRET`, then the development secret |
//! | `STREAMGATE_PLAY_BASE_URL`   | `http://localhost:8088` |
//! | `STREAMGATE_STRICT_PLAYBACK` | `true`                  |

use streamgate_session::{EngineConfig, ValidationPolicy};

use crate::RateLimitConfig;

/// An environment variable held a value that can't be used.
#[derive(Debug, thiserror::Error)]
#[error("invalid value {value:?} for {var}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

/// Everything needed to start a server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// `None` means the development secret.
    pub token_secret: Option<String>,
    pub engine: EngineConfig,
    pub rate_limits: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            token_secret: None,
            engine: EngineConfig::default(),
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable
    /// name to its value. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(bind) = get("STREAMGATE_BIND") {
            config.bind = bind;
        }
        config.token_secret = get("STREAMGATE_TOKEN_SECRET").or_else(|| get("TOKEN_SECRET"));
        if let Some(url) = get("STREAMGATE_PLAY_BASE_URL") {
            config.engine.play_base_url = url;
        }
        if let Some(raw) = get("STREAMGATE_STRICT_PLAYBACK") {
            config.engine.validation = match parse_flag(&raw) {
                Some(true) => ValidationPolicy::RequireLiveStream,
                Some(false) => ValidationPolicy::Lenient,
                None => {
                    return Err(ConfigError {
                        var: "STREAMGATE_STRICT_PLAYBACK",
                        value: raw,
                    });
                }
            };
        }
        Ok(config)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
