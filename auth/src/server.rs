use crate::hashing::verify_stored;
use crate::limiter::AttemptLimiter;
use crate::store::CredentialStore;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub limiter: AttemptLimiter,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LoginResponse {
    fn ok() -> Self {
        LoginResponse {
            success: true,
            message: None,
        }
    }

    fn failure(message: &str) -> Self {
        LoginResponse {
            success: false,
            message: Some(message.to_string()),
        }
    }
}

pub fn create_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn login(State(state): State<Arc<AppState>>, Form(form): Form<LoginForm>) -> Response {
    let username = form.username.trim().to_string();
    if username.is_empty() || form.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(LoginResponse::failure("Missing username or password")),
        )
            .into_response();
    }

    if !state.limiter.try_begin(&username) {
        warn!("Rate limit reached for user '{}'", username);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(LoginResponse::failure(
                "Too many attempts, try again later",
            )),
        )
            .into_response();
    }

    let stored_hash = match state.store.password_hash(&username).await {
        Ok(hash) => hash,
        Err(e) => {
            error!("Credential lookup failed: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(LoginResponse::failure("Credential store unavailable")),
            )
                .into_response();
        }
    };

    let password = form.password;
    let matched =
        tokio::task::spawn_blocking(move || verify_stored(&password, stored_hash.as_deref()))
            .await
            .unwrap_or(false);

    if matched {
        state.limiter.reset(&username);
        info!("User '{}' authenticated", username);
        (StatusCode::OK, Json(LoginResponse::ok())).into_response()
    } else {
        (
            StatusCode::OK,
            Json(LoginResponse::failure("Invalid username or password")),
        )
            .into_response()
    }
}
