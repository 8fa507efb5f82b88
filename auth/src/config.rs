use crate::errors::{AuthError, Result};
use log::info;
use std::net::SocketAddr;
use std::time::Duration;
use tokio_postgres::Config;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub bind_addr: SocketAddr,
    pub pg_host: String,
    pub pg_port: u16,
    pub pg_db: String,
    pub pg_user: String,
    pub pg_password: String,
    pub max_attempts: u32,
    pub window: Duration,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: &str) -> Result<T> {
    let raw = env_or(key, default);
    raw.parse::<T>()
        .map_err(|_| AuthError::Config(format!("{} has invalid value '{}'", key, raw)))
}

impl AuthConfig {
    /// Reads the service configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let config = AuthConfig {
            bind_addr: parse_env("AUTH_BIND_ADDR", "0.0.0.0:8080")?,
            pg_host: env_or("POSTGRES_HOST", "127.0.0.1"),
            pg_port: parse_env("POSTGRES_PORT", "5432")?,
            pg_db: env_or("POSTGRES_DB", "sos"),
            pg_user: env_or("POSTGRES_USER", "postgres"),
            pg_password: env_or("POSTGRES_PASSWORD", ""),
            max_attempts: parse_env("AUTH_MAX_ATTEMPTS", "5")?,
            window: Duration::from_secs(parse_env("AUTH_WINDOW_SECS", "300")?),
        };

        if config.max_attempts == 0 {
            return Err(AuthError::Config(
                "AUTH_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        info!(
            "DB Config: Host={}, Port={}, DB={}, User={}",
            config.pg_host, config.pg_port, config.pg_db, config.pg_user
        );
        Ok(config)
    }

    pub fn pg_config(&self) -> Config {
        let mut config = Config::new();
        config
            .host(&self.pg_host)
            .port(self.pg_port)
            .dbname(&self.pg_db)
            .user(&self.pg_user)
            .password(&self.pg_password);
        config.application_name("sos-auth");
        config.connect_timeout(Duration::from_secs(10));
        config
    }
}
