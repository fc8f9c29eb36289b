pub mod config;
pub mod error;
pub mod state;
pub mod auth;
pub mod db;
pub mod models;
pub mod middleware;
pub mod routes;
pub mod scheduling;
pub mod analytics;
pub mod chat;
pub mod invoicing;
pub mod clients;
pub mod organizations;
pub mod rate_limit;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, header};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::chat::ChatClient;
use crate::config::Config;
use crate::invoicing::SquareClient;
use crate::rate_limit::{ChatRateLimiter, LoginRateLimiter};
use crate::state::{AppState, SharedState};

pub fn build_app(pool: PgPool, config: Config) -> Router {
    let llm = config.llm.as_ref().and_then(|llm| match ChatClient::new(llm) {
        Ok(client) => {
            tracing::info!(model = %llm.model, "Chat assistant configured");
            Some(client)
        }
        Err(e) => {
            tracing::warn!("Chat assistant not available: {e}");
            None
        }
    });

    let square = config.square.as_ref().and_then(|square| match SquareClient::new(square) {
        Ok(client) => {
            tracing::info!(environment = ?square.environment, "Square invoicing configured");
            Some(client)
        }
        Err(e) => {
            tracing::warn!("Square invoicing not available: {e}");
            None
        }
    });

    let max_body_size = config.max_body_size;
    let cors = cors_layer(&config.cors_origins);
    let chat_limiter = ChatRateLimiter::new(config.chat_rate_limit);

    let state: SharedState = Arc::new(AppState {
        pool,
        config,
        functions: chat::functions::registry(),
        llm,
        square,
        login_limiter: LoginRateLimiter::new(),
        chat_limiter,
    });

    spawn_limiter_sweep(state.clone());

    let router = Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health));
    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state)
}

/// Credentialed CORS for the configured origins, or none when the list is empty.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
    )
}

/// Drop expired rate limiter windows every five minutes.
fn spawn_limiter_sweep(state: SharedState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(300));
        loop {
            ticker.tick().await;
            state.login_limiter.cleanup(Duration::from_secs(15 * 60));
            state.chat_limiter.cleanup(Duration::from_secs(60));
        }
    });
}

async fn health() -> &'static str {
    "ok"
}
