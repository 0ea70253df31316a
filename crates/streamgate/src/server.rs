//! `StreamgateServer` builder and serve loop.
//!
//! This is the entry point for running a Streamgate server. It ties the
//! layers together: HTTP routes → session engine → entitlement store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use streamgate_protocol::TokenCodec;
use streamgate_session::{EngineConfig, SessionEngine};
use streamgate_store::MemoryStore;
use tokio::net::TcpListener;

use crate::routes::router;
use crate::{AppState, RateLimitConfig, RateLimits, ServerConfig, StreamgateError};

/// How often idle addresses are dropped from the rate limiters.
const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Builder for configuring and starting a Streamgate server.
///
/// # Example
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), streamgate::StreamgateError> {
/// use streamgate::StreamgateServer;
///
/// let server = StreamgateServer::builder()
///     .bind("127.0.0.1:8080")
///     .token_secret("change-me")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct StreamgateServerBuilder {
    bind_addr: String,
    token_secret: Option<String>,
    engine_config: EngineConfig,
    rate_limits: RateLimitConfig,
    store: Option<Arc<MemoryStore>>,
}

impl StreamgateServerBuilder {
    /// Creates a builder with default settings, bound to `127.0.0.1:8080`.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            token_secret: None,
            engine_config: EngineConfig::default(),
            rate_limits: RateLimitConfig::default(),
            store: None,
        }
    }

    /// Starts from a configuration read with [`ServerConfig::from_env`].
    pub fn from_config(config: ServerConfig) -> Self {
        Self {
            bind_addr: config.bind,
            token_secret: config.token_secret,
            engine_config: config.engine,
            rate_limits: config.rate_limits,
            store: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the token signing secret. Without one the development secret
    /// is used.
    pub fn token_secret(mut self, secret: impl Into<String>) -> Self {
        self.token_secret = Some(secret.into());
        self
    }

    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    pub fn rate_limits(mut self, config: RateLimitConfig) -> Self {
        self.rate_limits = config;
        self
    }

    /// Serves an existing store instead of the seeded development data.
    pub fn store(mut self, store: Arc<MemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Binds the listener and assembles the engine.
    pub async fn build(self) -> Result<StreamgateServer, StreamgateError> {
        let codec = match self.token_secret {
            Some(secret) => TokenCodec::new(secret),
            None => TokenCodec::development(),
        };
        if codec.uses_dev_secret() {
            tracing::warn!("no token secret configured, using the development secret");
        }

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::seeded()));
        let engine = SessionEngine::new(store, codec, self.engine_config);
        let state = Arc::new(AppState::new(engine, RateLimits::new(self.rate_limits)));

        let listener = TcpListener::bind(&self.bind_addr).await?;

        Ok(StreamgateServer { listener, state })
    }
}

impl Default for StreamgateServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Streamgate server.
///
/// Call [`run()`](Self::run) to start serving requests.
pub struct StreamgateServer {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl StreamgateServer {
    /// Creates a new builder.
    pub fn builder() -> StreamgateServerBuilder {
        StreamgateServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The store behind this server.
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(self.state.engine().store())
    }

    /// Serves requests until Ctrl-C.
    pub async fn run(self) -> Result<(), StreamgateError> {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "Streamgate server running");

        let pruner = tokio::spawn(prune_rate_limits(Arc::clone(&self.state)));

        let app = router(self.state).into_make_service_with_connect_info::<SocketAddr>();
        let served = axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        pruner.abort();
        served?;

        tracing::info!("Streamgate server stopped");
        Ok(())
    }
}

async fn prune_rate_limits(state: Arc<AppState>) {
    let mut ticker = tokio::time::interval(RATE_LIMIT_PRUNE_INTERVAL);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        state.limits.retain_recent();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
