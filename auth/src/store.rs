use crate::config::AuthConfig;
use crate::errors::Result;
use async_trait::async_trait;
use bb8::Pool;
use bb8_postgres::PostgresConnectionManager;
use log::info;
use std::time::Duration;
use tokio_postgres::NoTls;

pub type PgPool = Pool<PostgresConnectionManager<NoTls>>;

/// Looks up the stored password hash for a username.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn password_hash(&self, username: &str) -> Result<Option<String>>;
}

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub async fn connect(config: &AuthConfig) -> Result<Self> {
        info!("Connecting to PostgreSQL database...");
        let manager = PostgresConnectionManager::new(config.pg_config(), NoTls);

        let pool = Pool::builder()
            .max_size(16)
            .min_idle(Some(1))
            .idle_timeout(Some(Duration::from_secs(180)))
            .connection_timeout(Duration::from_secs(15))
            .build(manager)
            .await?;

        let conn = pool.get().await?;
        conn.query_one("SELECT 1", &[]).await?;
        drop(conn);
        info!("Database connection pool initialized successfully.");

        Ok(PgCredentialStore { pool })
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn password_hash(&self, username: &str) -> Result<Option<String>> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt(
                "SELECT password_hash FROM users WHERE username = $1",
                &[&username],
            )
            .await?;
        Ok(row.map(|row| row.get::<_, String>(0)))
    }
}
