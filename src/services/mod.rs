// All service modules
pub mod admin_gateway;
pub mod chain_gateway;
pub mod challenge_guard;
pub mod game_state;
pub mod play_coordinator;
pub mod rate_limiter;

// Re-export for convenience
pub use admin_gateway::AdminGateway;
pub use chain_gateway::ChainGateway;
pub use challenge_guard::ChallengeGuard;
pub use play_coordinator::{PlayCoordinator, PlayRules};

use crate::config::Config;
use std::sync::Arc;

/// Start all background services
pub async fn start_background_services(plays: Arc<PlayCoordinator>, config: Config) {
    tracing::info!("Starting background services...");

    if config.reservation_sweep_interval_secs > 0 {
        plays
            .clone()
            .start_sweeper(config.reservation_sweep_interval_secs)
            .await;
        tracing::info!(
            "Reservation sweeper running every {}s (ttl {}s)",
            config.reservation_sweep_interval_secs,
            config.reservation_ttl_secs
        );
    } else {
        tracing::warn!("Reservation sweeper disabled; expired plays are released lazily only");
    }
}
