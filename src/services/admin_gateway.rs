use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    config::Config,
    crypto::signature::SignatureVerifier,
    error::{AppError, Result},
    models::{AdminStats, PendingJackpot},
    services::{challenge_guard::ChallengeGuard, play_coordinator::PlayCoordinator},
};

/// Identity claimed by an admin request, as read from headers.
#[derive(Debug, Clone, Default)]
pub struct AdminCredentials {
    pub wallet: Option<String>,
    pub signature: Option<String>,
    pub timestamp: Option<i64>,
}

/// Privileged operations, gated by the admin allow-list and a signed challenge.
pub struct AdminGateway {
    admins: HashSet<String>,
    require_signature: bool,
    challenges: ChallengeGuard,
    plays: Arc<PlayCoordinator>,
}

impl AdminGateway {
    pub fn new(
        admins: impl IntoIterator<Item = String>,
        require_signature: bool,
        max_age_secs: i64,
        plays: Arc<PlayCoordinator>,
    ) -> Self {
        Self {
            admins: admins.into_iter().map(|a| a.trim().to_string()).collect(),
            require_signature,
            challenges: ChallengeGuard::new(max_age_secs),
            plays,
        }
    }

    pub fn from_config(config: &Config, plays: Arc<PlayCoordinator>) -> Self {
        Self::new(
            config.admin_wallets.clone(),
            config.admin_require_signature,
            config.admin_signature_max_age_secs,
            plays,
        )
    }

    pub fn is_admin(&self, wallet: &str) -> bool {
        self.admins.contains(wallet.trim())
    }

    pub async fn authorize(&self, credentials: &AdminCredentials, action: &str) -> Result<String> {
        self.authorize_at(credentials, action, Utc::now()).await
    }

    /// Returns the admin wallet once the caller is allow-listed and, when required,
    /// has signed a fresh, unused challenge for `action`.
    pub async fn authorize_at(
        &self,
        credentials: &AdminCredentials,
        action: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let wallet = credentials
            .wallet
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Missing admin wallet header".into()))?;

        if !self.is_admin(wallet) {
            tracing::warn!(wallet = %wallet, action, "Rejected non-admin wallet");
            return Err(AppError::Unauthorized("Wallet is not an admin".into()));
        }

        if !self.require_signature {
            return Ok(wallet.to_string());
        }

        let timestamp = credentials
            .timestamp
            .ok_or_else(|| AppError::Unauthorized("Missing admin timestamp header".into()))?;
        let signature = credentials
            .signature
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Missing admin signature header".into()))?;

        let message = SignatureVerifier::admin_challenge(action, timestamp);
        self.challenges
            .verify_at(wallet, &message, signature, timestamp, now)
            .await
            .inspect_err(|e| {
                tracing::warn!(wallet = %wallet, action, error = %e, "Admin challenge rejected")
            })?;

        tracing::info!(wallet = %wallet, action, "Admin request authorized");
        Ok(wallet.to_string())
    }

    pub async fn stats(&self) -> AdminStats {
        self.plays.stats().await
    }

    /// Clears the pending jackpot and resumes. On-chain payout verification is the
    /// operator's job.
    pub async fn approve_jackpot(&self, admin: &str) -> Option<PendingJackpot> {
        tracing::info!(admin = %admin, "Approving jackpot");
        self.plays.approve_jackpot().await
    }

    pub async fn pause(&self, admin: &str, reason: &str) {
        tracing::warn!(admin = %admin, reason, "Admin paused the game");
        self.plays.pause(reason).await;
    }

    pub async fn unrestrict(&self, admin: &str, wallet: &str) -> bool {
        let removed = self.plays.unrestrict(wallet).await;
        tracing::info!(admin = %admin, wallet = %wallet, removed, "Admin lifted wallet restriction");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::signature::test_keys::{sign, signing_key, wallet_of};
    use crate::services::chain_gateway::mock::{gateway, MockChain};
    use crate::services::play_coordinator::PlayRules;
    use rand::{rngs::StdRng, SeedableRng};

    fn plays() -> Arc<PlayCoordinator> {
        let chain = Arc::new(MockChain::default());
        Arc::new(PlayCoordinator::with_rng(
            PlayRules::from_config(&Config::for_tests()),
            Arc::new(gateway(chain, &["https://rpc-a.test"])),
            Box::new(StdRng::seed_from_u64(1)),
        ))
    }

    fn signed(key_seed: u8, action: &str, timestamp: i64) -> AdminCredentials {
        let key = signing_key(key_seed);
        AdminCredentials {
            wallet: Some(wallet_of(&key)),
            signature: Some(sign(&key, &SignatureVerifier::admin_challenge(action, timestamp))),
            timestamp: Some(timestamp),
        }
    }

    fn admin_gateway(require_signature: bool) -> AdminGateway {
        AdminGateway::new(
            vec![wallet_of(&signing_key(1))],
            require_signature,
            300,
            plays(),
        )
    }

    #[tokio::test]
    async fn signed_challenge_authorizes_admin() {
        let gw = admin_gateway(true);
        let now = Utc::now();
        let creds = signed(1, "stats", now.timestamp());
        let wallet = gw.authorize_at(&creds, "stats", now).await.unwrap();
        assert!(gw.is_admin(&wallet));
    }

    #[tokio::test]
    async fn non_admin_wallet_is_rejected() {
        let gw = admin_gateway(true);
        let now = Utc::now();
        let creds = signed(2, "stats", now.timestamp());
        assert!(matches!(
            gw.authorize_at(&creds, "stats", now).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn bare_wallet_header_is_not_enough() {
        let gw = admin_gateway(true);
        let creds = AdminCredentials {
            wallet: Some(wallet_of(&signing_key(1))),
            ..Default::default()
        };
        assert!(gw.authorize(&creds, "approve-jackpot").await.is_err());
    }

    #[tokio::test]
    async fn signature_for_other_action_is_rejected() {
        let gw = admin_gateway(true);
        let now = Utc::now();
        let creds = signed(1, "stats", now.timestamp());
        assert!(gw.authorize_at(&creds, "approve-jackpot", now).await.is_err());
    }

    #[tokio::test]
    async fn stale_and_replayed_challenges_are_rejected() {
        let gw = admin_gateway(true);
        let now = Utc::now();

        let stale = signed(1, "stats", now.timestamp() - 301);
        assert!(gw.authorize_at(&stale, "stats", now).await.is_err());

        let fresh = signed(1, "stats", now.timestamp());
        gw.authorize_at(&fresh, "stats", now).await.unwrap();
        match gw.authorize_at(&fresh, "stats", now).await {
            Err(AppError::Unauthorized(msg)) => assert!(msg.contains("already used")),
            other => panic!("expected replay rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn overflowing_timestamp_header_is_rejected() {
        let gw = admin_gateway(true);
        let now = Utc::now();
        for timestamp in [i64::MIN, i64::MAX] {
            let creds = signed(1, "stats", timestamp);
            assert!(matches!(
                gw.authorize_at(&creds, "stats", now).await,
                Err(AppError::Unauthorized(_))
            ));
        }
    }

    #[tokio::test]
    async fn allow_list_only_mode_for_local_development() {
        let gw = admin_gateway(false);
        let creds = AdminCredentials {
            wallet: Some(wallet_of(&signing_key(1))),
            ..Default::default()
        };
        assert!(gw.authorize(&creds, "stats").await.is_ok());
        assert!(gw
            .authorize(&AdminCredentials::default(), "stats")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn admin_operations_drive_game_state() {
        let gw = admin_gateway(false);
        gw.pause("admin", "maintenance").await;
        assert!(gw.plays.game_status().await.paused);
        assert!(gw.approve_jackpot("admin").await.is_none());
        assert!(!gw.plays.game_status().await.paused);
        assert!(!gw.unrestrict("admin", "nobody").await);
        assert_eq!(gw.stats().await.total_games, 0);
    }
}
