//! Standalone house price server.
//!
//! Configuration comes from `HOUSE_PRICE_*` environment variables; see
//! `ServerConfig::from_env`.

use anyhow::Result;
use tracing::info;

use server::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,server=debug,pipeline=debug")),
        )
        .init();

    let config = ServerConfig::from_env();
    info!(
        "Serving {}/{} from registry {}",
        config.model_name,
        config.stage,
        config.registry_path.display()
    );

    server::serve(&config).await
}
