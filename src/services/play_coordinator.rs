use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    config::Config,
    error::{AppError, Result},
    models::{AdminStats, GameResult, GameStatusResponse, Outcome, PendingJackpot, PlayerRecord},
    services::{chain_gateway::ChainGateway, game_state::GameState, rate_limiter::RateLimiter},
};

/// Tunables for the play protocol.
#[derive(Debug, Clone)]
pub struct PlayRules {
    pub cooldown: Duration,
    pub min_bet: u64,
    pub max_bet: u64,
    pub jackpot_odds: f64,
    pub rate_limit_window: Duration,
    pub max_plays_per_window: usize,
    pub reservation_ttl: Duration,
    pub suspicious_error_threshold: u32,
}

impl PlayRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cooldown: Duration::milliseconds(config.play_cooldown_ms),
            min_bet: config.min_bet,
            max_bet: config.max_bet,
            jackpot_odds: config.jackpot_odds,
            rate_limit_window: Duration::seconds(config.rate_limit_window_secs),
            max_plays_per_window: config.max_plays_per_window,
            reservation_ttl: Duration::seconds(config.reservation_ttl_secs),
            suspicious_error_threshold: config.suspicious_error_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuedPlay {
    pub outcome: Outcome,
    pub bet_amount: u64,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
enum ReservationState {
    /// Preconditions passed, balance lookup in flight.
    Checking,
    Issued(IssuedPlay),
}

#[derive(Debug, Clone, Copy)]
struct Reservation {
    id: u64,
    state: ReservationState,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmReceipt {
    pub outcome: Outcome,
    pub bet_amount: u64,
    pub duplicate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorReport {
    pub error_count: u32,
    pub restricted: bool,
}

/// All volatile game state. Lives behind a single lock in [`PlayCoordinator`].
pub struct PlayStore {
    players: HashMap<String, PlayerRecord>,
    reservations: HashMap<String, Reservation>,
    results: HashMap<String, GameResult>,
    suspicious: HashSet<String>,
    error_counts: HashMap<String, u32>,
    game_state: GameState,
    rate_limiter: RateLimiter,
    rng: Box<dyn RngCore + Send>,
    next_reservation_id: u64,
}

impl PlayStore {
    fn new(rules: &PlayRules, rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            players: HashMap::new(),
            reservations: HashMap::new(),
            results: HashMap::new(),
            suspicious: HashSet::new(),
            error_counts: HashMap::new(),
            game_state: GameState::new(),
            rate_limiter: RateLimiter::new(rules.rate_limit_window, rules.max_plays_per_window),
            rng,
            next_reservation_id: 0,
        }
    }

    fn paused_error(&self) -> AppError {
        let pending = self.game_state.pending_jackpot();
        AppError::GamePaused {
            reason: self
                .game_state
                .reason()
                .unwrap_or("Game is paused")
                .to_string(),
            winner: pending.map(|j| j.wallet.clone()),
            amount: pending.map(|j| j.amount),
            won_at_ms: pending.map(|j| j.won_at.timestamp_millis()),
        }
    }

    fn release_if_expired(&mut self, wallet: &str, now: DateTime<Utc>) {
        let expired = self
            .reservations
            .get(wallet)
            .is_some_and(|r| now >= r.expires_at);
        if expired {
            self.reservations.remove(wallet);
            tracing::info!(wallet = %wallet, "Released expired reservation");
        }
    }

    // Steps 1-6 of validate; on success the wallet holds a `Checking` reservation.
    fn reserve(
        &mut self,
        rules: &PlayRules,
        wallet: &str,
        bet_amount: u64,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        if self.game_state.is_paused() {
            tracing::warn!(wallet = %wallet, "Play rejected: game paused");
            return Err(self.paused_error());
        }

        if self.suspicious.contains(wallet) {
            tracing::warn!(wallet = %wallet, "Suspicious wallet attempted to play");
            return Err(AppError::AccountRestricted);
        }

        self.release_if_expired(wallet, now);
        if self.reservations.contains_key(wallet) {
            tracing::warn!(wallet = %wallet, "Wallet has pending game");
            return Err(AppError::ActiveGameInProgress);
        }

        if let Some(last_play) = self.players.get(wallet).and_then(|p| p.last_play_at) {
            let elapsed = now - last_play;
            if elapsed < rules.cooldown {
                let remaining_ms = (rules.cooldown - elapsed).num_milliseconds().max(1);
                let wait_seconds = (remaining_ms as u64).div_ceil(1000);
                tracing::warn!(
                    wallet = %wallet,
                    since_last_play_ms = elapsed.num_milliseconds(),
                    "Cooldown hit"
                );
                return Err(AppError::Cooldown { wait_seconds });
            }
        }

        if bet_amount < rules.min_bet || bet_amount > rules.max_bet {
            tracing::warn!(wallet = %wallet, bet_amount, "Invalid bet amount");
            return Err(AppError::InvalidBet {
                min: rules.min_bet,
                max: rules.max_bet,
            });
        }

        self.rate_limiter.check_and_record(wallet, now)?;

        self.next_reservation_id += 1;
        let id = self.next_reservation_id;
        self.reservations.insert(
            wallet.to_string(),
            Reservation {
                id,
                state: ReservationState::Checking,
                expires_at: now + rules.reservation_ttl,
            },
        );
        Ok(id)
    }

    fn rollback(&mut self, wallet: &str, id: u64) {
        if self.reservations.get(wallet).is_some_and(|r| r.id == id) {
            self.reservations.remove(wallet);
        }
    }

    fn issued_play(&self, wallet: &str) -> Option<IssuedPlay> {
        match self.reservations.get(wallet)?.state {
            ReservationState::Issued(play) => Some(play),
            ReservationState::Checking => None,
        }
    }
}

/// Runs the validate/confirm protocol over a shared [`PlayStore`].
pub struct PlayCoordinator {
    rules: PlayRules,
    chain: Arc<ChainGateway>,
    store: Mutex<PlayStore>,
}

impl PlayCoordinator {
    pub fn new(rules: PlayRules, chain: Arc<ChainGateway>) -> Self {
        Self::with_rng(rules, chain, Box::new(StdRng::from_os_rng()))
    }

    /// Same as `new` but with an injected outcome generator.
    pub fn with_rng(
        rules: PlayRules,
        chain: Arc<ChainGateway>,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        let store = PlayStore::new(&rules, rng);
        Self {
            rules,
            chain,
            store: Mutex::new(store),
        }
    }

    #[cfg(test)]
    pub fn rules(&self) -> &PlayRules {
        &self.rules
    }

    pub async fn validate(&self, wallet: &str, bet_amount: u64) -> Result<IssuedPlay> {
        self.validate_at(wallet, bet_amount, Utc::now()).await
    }

    /// Authorizes a bet, draws the outcome and reserves the wallet until confirm.
    ///
    /// The store lock is held for the precondition checks and again for the final
    /// mutation, but not across the balance lookup.
    pub async fn validate_at(
        &self,
        wallet: &str,
        bet_amount: u64,
        now: DateTime<Utc>,
    ) -> Result<IssuedPlay> {
        tracing::info!(wallet = %wallet, bet_amount, "Received play validation request");

        let reservation_id = {
            let mut store = self.store.lock().await;
            store.reserve(&self.rules, wallet, bet_amount, now)?
        };

        let balance = self.chain.get_balance(wallet).await;

        let mut store = self.store.lock().await;
        let balance = match balance {
            Ok(balance) => balance,
            Err(err) => {
                store.rollback(wallet, reservation_id);
                drop(store);
                tracing::error!(wallet = %wallet, error = %err, "Balance check failed");
                self.chain.recover_from(&err).await;
                return Err(err);
            }
        };

        tracing::info!(
            wallet = %wallet,
            balance = balance.ui_amount(),
            bet_amount,
            "Balance check"
        );

        if !balance.covers(bet_amount) {
            store.rollback(wallet, reservation_id);
            return Err(AppError::InsufficientBalance);
        }

        if !store
            .reservations
            .get(wallet)
            .is_some_and(|r| r.id == reservation_id)
        {
            tracing::error!(wallet = %wallet, "Reservation vanished during balance check");
            return Err(AppError::ServiceUnavailable(
                "Play reservation expired, please try again".to_string(),
            ));
        }

        // Another wallet may have hit the jackpot while the balance lookup was in flight.
        if store.game_state.is_paused() {
            store.rollback(wallet, reservation_id);
            return Err(store.paused_error());
        }

        let draw: f64 = store.rng.random();
        let outcome = if draw < self.rules.jackpot_odds {
            Outcome::Jackpot
        } else {
            Outcome::Lose
        };
        let play = IssuedPlay {
            outcome,
            bet_amount,
            issued_at: now,
        };

        if let Some(reservation) = store.reservations.get_mut(wallet) {
            reservation.state = ReservationState::Issued(play);
            reservation.expires_at = now + self.rules.reservation_ttl;
        }

        let record = store
            .players
            .entry(wallet.to_string())
            .or_insert_with(|| PlayerRecord::new(wallet));
        record.record_play(bet_amount, now);
        let play_count = record.play_count;

        if outcome == Outcome::Jackpot {
            store.game_state.set_pending_jackpot(wallet, bet_amount, now);
            tracing::info!(
                wallet = %wallet,
                jackpot_amount = bet_amount,
                "Jackpot won - game paused"
            );
        }

        tracing::info!(
            wallet = %wallet,
            bet_amount,
            outcome = outcome.as_str(),
            play_count,
            "Play validated successfully"
        );

        Ok(play)
    }

    pub async fn confirm(
        &self,
        wallet: &str,
        signature: &str,
        claimed_outcome: Option<Outcome>,
        claimed_bet: Option<u64>,
        claimed_issued_at_ms: Option<i64>,
    ) -> Result<ConfirmReceipt> {
        self.confirm_at(
            wallet,
            signature,
            claimed_outcome,
            claimed_bet,
            claimed_issued_at_ms,
            Utc::now(),
        )
        .await
    }

    /// Finalizes a validated play once its transfer is confirmed on chain.
    ///
    /// The outcome recorded is the one issued by validate; client claims are only
    /// compared and logged.
    pub async fn confirm_at(
        &self,
        wallet: &str,
        signature: &str,
        claimed_outcome: Option<Outcome>,
        claimed_bet: Option<u64>,
        claimed_issued_at_ms: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<ConfirmReceipt> {
        let play = {
            let store = self.store.lock().await;
            if let Some(receipt) = duplicate_receipt(&store, wallet, signature)? {
                return Ok(receipt);
            }

            let Some(play) = store.issued_play(wallet) else {
                tracing::warn!(wallet = %wallet, signature = %signature, "Confirm without active game");
                return Err(AppError::NoActiveGame);
            };

            if let Some(claimed) = claimed_issued_at_ms {
                if claimed != play.issued_at.timestamp_millis() {
                    tracing::warn!(
                        wallet = %wallet,
                        claimed_issued_at_ms = claimed,
                        "Confirm references a different play"
                    );
                    return Err(AppError::NoActiveGame);
                }
            }
            play
        };

        if claimed_outcome.is_some_and(|o| o != play.outcome)
            || claimed_bet.is_some_and(|b| b != play.bet_amount)
        {
            tracing::warn!(
                wallet = %wallet,
                claimed_outcome = ?claimed_outcome,
                claimed_bet = ?claimed_bet,
                issued_outcome = play.outcome.as_str(),
                issued_bet = play.bet_amount,
                "Client claim differs from issued play; using issued values"
            );
        }

        let tx = match self.chain.get_transaction(signature).await {
            Ok(tx) => tx,
            Err(err) => {
                tracing::error!(wallet = %wallet, error = %err, "Transaction lookup failed");
                self.chain.recover_from(&err).await;
                return Err(err);
            }
        };
        let Some(tx) = tx else {
            return Err(AppError::InvalidTransaction(
                "Transaction not found or not yet confirmed".to_string(),
            ));
        };
        if !tx.succeeded() {
            return Err(AppError::InvalidTransaction(
                "Transaction failed on chain".to_string(),
            ));
        }

        let mut store = self.store.lock().await;
        if let Some(receipt) = duplicate_receipt(&store, wallet, signature)? {
            return Ok(receipt);
        }
        if store.issued_play(wallet) != Some(play) {
            tracing::warn!(wallet = %wallet, "Reservation changed while confirming");
            return Err(AppError::NoActiveGame);
        }

        store.results.insert(
            signature.to_string(),
            GameResult {
                signature: signature.to_string(),
                wallet: wallet.to_string(),
                outcome: play.outcome,
                bet_amount: play.bet_amount,
                issued_at: play.issued_at,
                confirmed_at: now,
                slot: tx.slot,
            },
        );
        store.reservations.remove(wallet);

        tracing::info!(
            wallet = %wallet,
            signature = %signature,
            outcome = play.outcome.as_str(),
            slot = tx.slot,
            "Play confirmed"
        );

        Ok(ConfirmReceipt {
            outcome: play.outcome,
            bet_amount: play.bet_amount,
            duplicate: false,
        })
    }

    /// Counts a client-side failure; past the threshold the wallet is restricted.
    pub async fn report_client_error(&self, wallet: &str, message: Option<&str>) -> ErrorReport {
        let threshold = self.rules.suspicious_error_threshold;
        let mut store = self.store.lock().await;
        let count = {
            let counter = store.error_counts.entry(wallet.to_string()).or_insert(0);
            *counter = counter.saturating_add(1);
            *counter
        };
        tracing::warn!(
            wallet = %wallet,
            error_count = count,
            message = message.unwrap_or(""),
            "Client reported game error"
        );
        if count > threshold && store.suspicious.insert(wallet.to_string()) {
            tracing::warn!(wallet = %wallet, "Wallet marked suspicious");
        }
        ErrorReport {
            error_count: count,
            restricted: store.suspicious.contains(wallet),
        }
    }

    /// Lifts a restriction. Returns whether the wallet was restricted.
    pub async fn unrestrict(&self, wallet: &str) -> bool {
        let mut store = self.store.lock().await;
        store.error_counts.remove(wallet);
        store.suspicious.remove(wallet)
    }

    pub async fn pause(&self, reason: &str) {
        self.store.lock().await.game_state.pause(reason);
    }

    pub async fn approve_jackpot(&self) -> Option<PendingJackpot> {
        let cleared = self.store.lock().await.game_state.approve_and_resume();
        match &cleared {
            Some(jackpot) => tracing::info!(
                winner = %jackpot.wallet,
                amount = jackpot.amount,
                "Jackpot approved - game resumed"
            ),
            None => tracing::info!("Game resumed (no pending jackpot)"),
        }
        cleared
    }

    pub async fn game_status(&self) -> GameStatusResponse {
        self.store.lock().await.game_state.status()
    }

    pub async fn stats(&self) -> AdminStats {
        let store = self.store.lock().await;
        AdminStats {
            active_players: store.players.len(),
            pending_games: store.reservations.len(),
            total_games: store.results.len(),
            suspicious_wallets: store.suspicious.len(),
        }
    }

    #[cfg(test)]
    pub async fn player(&self, wallet: &str) -> Option<PlayerRecord> {
        self.store.lock().await.players.get(wallet).cloned()
    }

    #[cfg(test)]
    pub async fn result(&self, signature: &str) -> Option<GameResult> {
        self.store.lock().await.results.get(signature).cloned()
    }

    /// Releases expired reservations and idle rate-limit windows.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut store = self.store.lock().await;
        let before = store.reservations.len();
        store.reservations.retain(|wallet, r| {
            let keep = now < r.expires_at;
            if !keep {
                tracing::info!(wallet = %wallet, "Released expired reservation");
            }
            keep
        });
        store.rate_limiter.prune(now);
        before - store.reservations.len()
    }

    /// Periodic sweep loop.
    pub async fn start_sweeper(self: Arc<Self>, interval_secs: u64) {
        if interval_secs == 0 {
            return;
        }
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                ticker.tick().await;
                let released = self.sweep_expired(Utc::now()).await;
                if released > 0 {
                    tracing::info!("Reservation sweep released {} stale plays", released);
                }
            }
        });
    }
}

// Idempotent retry detection for confirm.
fn duplicate_receipt(
    store: &PlayStore,
    wallet: &str,
    signature: &str,
) -> Result<Option<ConfirmReceipt>> {
    match store.results.get(signature) {
        Some(existing) if existing.wallet == wallet => {
            tracing::info!(wallet = %wallet, signature = %signature, "Duplicate confirm");
            Ok(Some(ConfirmReceipt {
                outcome: existing.outcome,
                bet_amount: existing.bet_amount,
                duplicate: true,
            }))
        }
        Some(_) => {
            tracing::warn!(wallet = %wallet, signature = %signature, "Signature reused by another wallet");
            Err(AppError::InvalidTransaction(
                "Transaction already used for another play".to_string(),
            ))
        }
        None => Ok(None),
    }
}
