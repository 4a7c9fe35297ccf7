/// Application constants

// Game defaults
pub const DEFAULT_JACKPOT_ODDS: f64 = 0.2;
pub const DEFAULT_PLAY_COOLDOWN_MS: i64 = 5_000;
pub const DEFAULT_MAX_PLAYS_PER_WINDOW: usize = 60;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: i64 = 60;
pub const DEFAULT_MIN_BET: u64 = 100;
pub const DEFAULT_MAX_BET: u64 = 100_000;
pub const DEFAULT_RESERVATION_TTL_SECS: i64 = 120;
pub const DEFAULT_RESERVATION_SWEEP_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_SUSPICIOUS_ERROR_THRESHOLD: u32 = 10;

// RPC
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 8_000;
pub const DEFAULT_RPC_ENDPOINTS: [&str; 4] = [
    "https://solana-mainnet.rpc.tatum.io",
    "https://api.mainnet-beta.solana.com",
    "https://solana-api.projectserum.com",
    "https://rpc.ankr.com/solana",
];
pub const RPC_COMMITMENT: &str = "confirmed";

// Admin
pub const ADMIN_WALLET_HEADER: &str = "x-admin-wallet";
pub const ADMIN_SIGNATURE_HEADER: &str = "x-admin-signature";
pub const ADMIN_TIMESTAMP_HEADER: &str = "x-admin-timestamp";
pub const ADMIN_CHALLENGE_PREFIX: &str = "tail-toss-admin";
pub const DEFAULT_ADMIN_SIGNATURE_MAX_AGE_SECS: i64 = 300;

// Player-signed requests
pub const PLAYER_CHALLENGE_PREFIX: &str = "tail-toss-player";
pub const DEFAULT_PLAYER_SIGNATURE_MAX_AGE_SECS: i64 = 120;

// Key sizes
pub const PUBKEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;
