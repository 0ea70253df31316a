use streamgate::{ServerConfig, StreamgateError, StreamgateServerBuilder};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), StreamgateError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let server = StreamgateServerBuilder::from_config(config).build().await?;

    tracing::info!(addr = %server.local_addr()?, "listening");
    server.run().await
}
