use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Lose,
    Jackpot,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lose => "lose",
            Self::Jackpot => "jackpot",
        }
    }
}

/// Per-wallet play history. Created on the first successful validate, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub wallet: String,
    pub last_play_at: Option<DateTime<Utc>>,
    pub play_count: u64,
    pub total_wagered: u64,
}

impl PlayerRecord {
    pub fn new(wallet: &str) -> Self {
        Self {
            wallet: wallet.to_string(),
            last_play_at: None,
            play_count: 0,
            total_wagered: 0,
        }
    }

    pub fn record_play(&mut self, bet_amount: u64, at: DateTime<Utc>) {
        self.last_play_at = Some(at);
        self.play_count += 1;
        self.total_wagered = self.total_wagered.saturating_add(bet_amount);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingJackpot {
    pub wallet: String,
    pub amount: u64,
    pub won_at: DateTime<Utc>,
}

/// Confirmed play, keyed by transaction signature. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    pub signature: String,
    pub wallet: String,
    pub outcome: Outcome,
    pub bet_amount: u64,
    pub issued_at: DateTime<Utc>,
    pub confirmed_at: DateTime<Utc>,
    pub slot: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingJackpotView {
    pub winner: String,
    pub amount: u64,
    pub timestamp: i64,
}

impl From<&PendingJackpot> for PendingJackpotView {
    fn from(value: &PendingJackpot) -> Self {
        Self {
            winner: value.wallet.clone(),
            amount: value.amount,
            timestamp: value.won_at.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatusResponse {
    pub paused: bool,
    pub reason: Option<String>,
    pub pending_jackpot: Option<PendingJackpotView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub active_players: usize,
    pub pending_games: usize,
    pub total_games: usize,
    pub suspicious_wallets: usize,
}
