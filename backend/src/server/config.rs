//! Server configuration parsed from flags and environment.

use std::net::SocketAddr;

use clap::Parser;

/// Runtime configuration for the sync backend.
///
/// Every flag can also be supplied through the environment, which is how
/// container deployments configure the service.
#[derive(Debug, Clone, Parser)]
#[command(name = "backend", about = "Sync backend for multi-sensor recording clients")]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8080")]
    pub bind_addr: SocketAddr,

    /// PostgreSQL connection string for the entity store.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Maximum connections held by the store pool.
    #[arg(long, env = "DB_POOL_MAX", default_value_t = 10)]
    pub db_pool_max: u32,

    /// Bearer token accepted by the static identity provider. Deployments
    /// front the service with a real identity collaborator; this token is
    /// the development/service-to-service stand-in.
    #[arg(long, env = "API_BEARER_TOKEN")]
    pub api_bearer_token: String,

    /// User id the static token resolves to.
    #[arg(long, env = "API_USER_ID", default_value_t = 1)]
    pub api_user_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_explicit_flags() {
        let config = ServerConfig::try_parse_from([
            "backend",
            "--database-url",
            "postgres://localhost/sync",
            "--api-bearer-token",
            "dev-token",
            "--bind-addr",
            "127.0.0.1:9090",
        ])
        .expect("config parses");

        assert_eq!(config.database_url, "postgres://localhost/sync");
        assert_eq!(config.api_bearer_token, "dev-token");
        assert_eq!(config.bind_addr.port(), 9090);
    }
}
