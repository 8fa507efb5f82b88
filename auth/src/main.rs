use anyhow::Context;
use dotenv::dotenv;
use log::info;
use sos_auth::config::AuthConfig;
use sos_auth::hashing::hash_password;
use sos_auth::limiter::AttemptLimiter;
use sos_auth::server::{create_routes, AppState};
use sos_auth::store::PgCredentialStore;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("hash-password") {
        let password = args
            .get(2)
            .context("usage: sos-auth hash-password <password>")?;
        println!("{}", hash_password(password)?);
        return Ok(());
    }

    let config = AuthConfig::from_env()?;
    let store = PgCredentialStore::connect(&config)
        .await
        .context("Failed to connect to the credential store")?;

    let state = Arc::new(AppState {
        store: Arc::new(store),
        limiter: AttemptLimiter::new(config.max_attempts, config.window),
    });
    let app = create_routes(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Credential service listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
