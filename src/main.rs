use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod crypto;
mod error;
mod integrations;
mod models;
mod services;

use config::Config;
use integrations::HttpRpcConnector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tail_toss_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting Tail Toss Backend Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!(
        "Token mint: {} | Lobby wallet: {}",
        config.token_mint_address,
        config.lobby_wallet_address
    );
    tracing::info!(
        "Jackpot odds: {} | Bet range: {}..={} | Cooldown: {}ms",
        config.jackpot_odds,
        config.min_bet,
        config.max_bet,
        config.play_cooldown_ms
    );
    for endpoint in &config.rpc_endpoints {
        tracing::info!("RPC endpoint #{}: {}", endpoint.priority, endpoint.url);
    }

    let app_state = api::AppState::new(config.clone(), Arc::new(HttpRpcConnector::new()));

    // Warm the RPC connection; a failure here is retried on the first request.
    if let Err(e) = app_state.chain.get_connection().await {
        tracing::warn!("Initial RPC connection failed: {}", e);
    }

    // Start background services
    tokio::spawn(services::start_background_services(
        app_state.plays.clone(),
        config.clone(),
    ));

    // Build router
    let app = build_router(app_state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/api/health", get(api::health::health_check))
        // Game
        .route("/api/game/status", get(api::play::game_status))
        .route("/api/play/validate", post(api::play::validate_play))
        .route("/api/play/confirm", post(api::play::confirm_play))
        .route("/api/play/report-error", post(api::play::report_error))
        // Chain lookups
        .route("/api/balance/{wallet}", get(api::wallet::get_balance))
        .route(
            "/api/transaction/verify",
            post(api::wallet::verify_transaction),
        )
        // Admin
        .route("/api/admin/stats", get(api::admin::stats))
        .route(
            "/api/admin/approve-jackpot",
            post(api::admin::approve_jackpot),
        )
        .route("/api/admin/pause", post(api::admin::pause))
        .route("/api/admin/unrestrict", post(api::admin::unrestrict))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_builds_with_all_routes() {
        let (state, _) = api::test_support::state();
        let _router = build_router(state);
    }

    #[test]
    fn cors_accepts_explicit_origin_list() {
        let mut config = Config::for_tests();
        config.cors_allowed_origins = "https://tailtoss.app, https://admin.tailtoss.app".into();
        let _layer = cors_from_config(&config);
    }
}
