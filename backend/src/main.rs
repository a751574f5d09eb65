//! Backend entry-point: wires the sync REST endpoints and OpenAPI docs.

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use backend::server::{ServerConfig, run};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let config = ServerConfig::parse();
    info!(bind_addr = %config.bind_addr, "starting sync backend");

    let server = run(config).await?;
    server.await
}
