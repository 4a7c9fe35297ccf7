use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_ADMIN_SIGNATURE_MAX_AGE_SECS, DEFAULT_JACKPOT_ODDS, DEFAULT_MAX_BET,
    DEFAULT_MAX_PLAYS_PER_WINDOW, DEFAULT_MIN_BET, DEFAULT_PLAY_COOLDOWN_MS,
    DEFAULT_PLAYER_SIGNATURE_MAX_AGE_SECS,
    DEFAULT_RATE_LIMIT_WINDOW_SECS, DEFAULT_RESERVATION_SWEEP_INTERVAL_SECS,
    DEFAULT_RESERVATION_TTL_SECS, DEFAULT_RPC_ENDPOINTS, DEFAULT_RPC_TIMEOUT_MS,
    DEFAULT_SUSPICIOUS_ERROR_THRESHOLD,
};

/// One JSON-RPC endpoint. Lower `priority` is tried first.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RpcEndpoint {
    pub url: String,
    pub priority: u32,
    pub headers: Vec<(String, String)>,
}

impl RpcEndpoint {
    pub fn new(url: impl Into<String>, priority: u32) -> Self {
        Self {
            url: url.into(),
            priority,
            headers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Token / wallets
    pub token_mint_address: String,
    pub lobby_wallet_address: String,
    pub admin_wallets: Vec<String>,

    // RPC
    pub rpc_endpoints: Vec<RpcEndpoint>,
    pub rpc_timeout_ms: u64,

    // Game rules
    pub jackpot_odds: f64,
    pub play_cooldown_ms: i64,
    pub max_plays_per_window: usize,
    pub rate_limit_window_secs: i64,
    pub min_bet: u64,
    pub max_bet: u64,
    pub reservation_ttl_secs: i64,
    pub reservation_sweep_interval_secs: u64,
    pub suspicious_error_threshold: u32,

    // Admin
    pub admin_require_signature: bool,
    pub admin_signature_max_age_secs: i64,

    // Player-signed requests (error reports)
    pub player_signature_max_age_secs: i64,

    // CORS
    pub cors_allowed_origins: String,
}

// Internal helper that parses truthy env flag values.
fn parse_flag(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    normalized == "1" || normalized == "true" || normalized == "yes" || normalized == "on"
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builds the ordered endpoint list. The API key header, when present,
/// is attached to the first (highest priority) endpoint only.
fn build_endpoints(
    urls: Vec<String>,
    api_key: Option<String>,
    api_key_header: &str,
) -> Vec<RpcEndpoint> {
    urls.into_iter()
        .enumerate()
        .map(|(idx, url)| {
            let mut endpoint = RpcEndpoint::new(url, idx as u32 + 1);
            if idx == 0 {
                if let Some(key) = api_key.as_deref().filter(|k| !k.trim().is_empty()) {
                    endpoint
                        .headers
                        .push((api_key_header.to_string(), key.trim().to_string()));
                }
            }
            endpoint
        })
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let lobby_wallet_address = env::var("LOBBY_WALLET_ADDRESS")?;
        let admin_wallets = env::var("ADMIN_WALLETS")
            .map(|raw| split_list(&raw))
            .ok()
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| vec![lobby_wallet_address.clone()]);

        let rpc_urls = env::var("RPC_ENDPOINTS")
            .map(|raw| split_list(&raw))
            .ok()
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| DEFAULT_RPC_ENDPOINTS.iter().map(|s| s.to_string()).collect());
        let api_key_header =
            env::var("RPC_API_KEY_HEADER").unwrap_or_else(|_| "x-api-key".to_string());

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            token_mint_address: env::var("TOKEN_MINT_ADDRESS")?,
            lobby_wallet_address,
            admin_wallets,

            rpc_endpoints: build_endpoints(rpc_urls, env::var("RPC_API_KEY").ok(), &api_key_header),
            rpc_timeout_ms: env::var("RPC_TIMEOUT_MS")
                .unwrap_or_else(|_| DEFAULT_RPC_TIMEOUT_MS.to_string())
                .parse()?,

            jackpot_odds: env::var("JACKPOT_ODDS")
                .unwrap_or_else(|_| DEFAULT_JACKPOT_ODDS.to_string())
                .parse()?,
            play_cooldown_ms: env::var("PLAY_COOLDOWN_MS")
                .unwrap_or_else(|_| DEFAULT_PLAY_COOLDOWN_MS.to_string())
                .parse()?,
            max_plays_per_window: env::var("MAX_PLAYS_PER_WINDOW")
                .unwrap_or_else(|_| DEFAULT_MAX_PLAYS_PER_WINDOW.to_string())
                .parse()?,
            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW_SECS")
                .unwrap_or_else(|_| DEFAULT_RATE_LIMIT_WINDOW_SECS.to_string())
                .parse()?,
            min_bet: env::var("MIN_BET")
                .unwrap_or_else(|_| DEFAULT_MIN_BET.to_string())
                .parse()?,
            max_bet: env::var("MAX_BET")
                .unwrap_or_else(|_| DEFAULT_MAX_BET.to_string())
                .parse()?,
            reservation_ttl_secs: env::var("RESERVATION_TTL_SECS")
                .unwrap_or_else(|_| DEFAULT_RESERVATION_TTL_SECS.to_string())
                .parse()?,
            reservation_sweep_interval_secs: env::var("RESERVATION_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| DEFAULT_RESERVATION_SWEEP_INTERVAL_SECS.to_string())
                .parse()?,
            suspicious_error_threshold: env::var("SUSPICIOUS_ERROR_THRESHOLD")
                .unwrap_or_else(|_| DEFAULT_SUSPICIOUS_ERROR_THRESHOLD.to_string())
                .parse()?,

            admin_require_signature: env::var("ADMIN_REQUIRE_SIGNATURE")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
            admin_signature_max_age_secs: env::var("ADMIN_SIGNATURE_MAX_AGE_SECS")
                .unwrap_or_else(|_| DEFAULT_ADMIN_SIGNATURE_MAX_AGE_SECS.to_string())
                .parse()?,
            player_signature_max_age_secs: env::var("PLAYER_SIGNATURE_MAX_AGE_SECS")
                .unwrap_or_else(|_| DEFAULT_PLAYER_SIGNATURE_MAX_AGE_SECS.to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token_mint_address.trim().is_empty() {
            anyhow::bail!("TOKEN_MINT_ADDRESS is empty");
        }
        if self.lobby_wallet_address.trim().is_empty() {
            anyhow::bail!("LOBBY_WALLET_ADDRESS is empty");
        }
        if self.rpc_endpoints.is_empty() {
            anyhow::bail!("No RPC endpoints configured");
        }
        for endpoint in &self.rpc_endpoints {
            if let Err(e) = url::Url::parse(&endpoint.url) {
                anyhow::bail!("Invalid RPC endpoint URL '{}': {}", endpoint.url, e);
            }
        }
        if !(0.0..=1.0).contains(&self.jackpot_odds) {
            anyhow::bail!("JACKPOT_ODDS must be within [0, 1]");
        }
        if self.min_bet == 0 || self.min_bet > self.max_bet {
            anyhow::bail!("MIN_BET must be > 0 and <= MAX_BET");
        }
        if self.max_plays_per_window == 0 {
            anyhow::bail!("MAX_PLAYS_PER_WINDOW must be > 0");
        }
        if self.reservation_ttl_secs <= 0 {
            anyhow::bail!("RESERVATION_TTL_SECS must be > 0");
        }
        if self.player_signature_max_age_secs <= 0 {
            anyhow::bail!("PLAYER_SIGNATURE_MAX_AGE_SECS must be > 0");
        }

        if self.admin_wallets.is_empty() {
            tracing::warn!("No admin wallets configured; jackpots cannot be approved");
        }
        if !self.admin_require_signature {
            if self.is_production() {
                anyhow::bail!("ADMIN_REQUIRE_SIGNATURE cannot be disabled in production");
            }
            tracing::warn!("Admin signature check disabled; admin headers are trusted as-is");
        }
        if self.jackpot_odds > 0.05 {
            tracing::warn!(
                "JACKPOT_ODDS={} is unusually high for a live game",
                self.jackpot_odds
            );
        }
        if self.reservation_sweep_interval_secs == 0 {
            tracing::warn!("RESERVATION_SWEEP_INTERVAL_SECS is 0; background sweep disabled");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms.max(1))
    }

    /// Baseline config used by unit tests across modules.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            token_mint_address: "CrbhNV4SUon8QVgCyQg7Khgy6GgcEy8ACDjkKvPrpump".to_string(),
            lobby_wallet_address: "EBTvDaV5eHmrumHTMABxcWFXyri9c9VPGSaqYYfsQ64F".to_string(),
            admin_wallets: vec!["EBTvDaV5eHmrumHTMABxcWFXyri9c9VPGSaqYYfsQ64F".to_string()],
            rpc_endpoints: vec![
                RpcEndpoint::new("https://rpc-a.test", 1),
                RpcEndpoint::new("https://rpc-b.test", 2),
            ],
            rpc_timeout_ms: 500,
            jackpot_odds: 0.0,
            play_cooldown_ms: DEFAULT_PLAY_COOLDOWN_MS,
            max_plays_per_window: DEFAULT_MAX_PLAYS_PER_WINDOW,
            rate_limit_window_secs: DEFAULT_RATE_LIMIT_WINDOW_SECS,
            min_bet: DEFAULT_MIN_BET,
            max_bet: DEFAULT_MAX_BET,
            reservation_ttl_secs: DEFAULT_RESERVATION_TTL_SECS,
            reservation_sweep_interval_secs: DEFAULT_RESERVATION_SWEEP_INTERVAL_SECS,
            suspicious_error_threshold: DEFAULT_SUSPICIOUS_ERROR_THRESHOLD,
            admin_require_signature: true,
            admin_signature_max_age_secs: DEFAULT_ADMIN_SIGNATURE_MAX_AGE_SECS,
            player_signature_max_age_secs: DEFAULT_PLAYER_SIGNATURE_MAX_AGE_SECS,
            cors_allowed_origins: "*".to_string(),
        }
    }
}
