use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::{
    crypto::signature::SignatureVerifier,
    error::{AppError, Result},
};

/// Freshness and single-use checks for wallet-signed challenges.
///
/// A challenge names its own unix timestamp; it is accepted once, and only while that
/// timestamp is within `max_age_secs` of the server clock.
pub struct ChallengeGuard {
    max_age_secs: u64,
    // signature -> challenge timestamp, kept until it falls out of the freshness window
    used: Mutex<HashMap<String, i64>>,
}

impl ChallengeGuard {
    pub fn new(max_age_secs: i64) -> Self {
        Self {
            max_age_secs: max_age_secs.max(0).unsigned_abs(),
            used: Mutex::new(HashMap::new()),
        }
    }

    fn is_fresh(&self, timestamp: i64, now_secs: i64) -> bool {
        // abs_diff cannot overflow, even for i64::MIN from a hostile header.
        now_secs.abs_diff(timestamp) <= self.max_age_secs
    }

    pub async fn verify(
        &self,
        wallet: &str,
        message: &str,
        signature: &str,
        timestamp: i64,
    ) -> Result<()> {
        self.verify_at(wallet, message, signature, timestamp, Utc::now())
            .await
    }

    pub async fn verify_at(
        &self,
        wallet: &str,
        message: &str,
        signature: &str,
        timestamp: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let now_secs = now.timestamp();
        if !self.is_fresh(timestamp, now_secs) {
            return Err(AppError::Unauthorized("Signed challenge expired".into()));
        }

        SignatureVerifier::verify_wallet_signature(wallet, message, signature)?;

        let mut used = self.used.lock().await;
        used.retain(|_, ts| self.is_fresh(*ts, now_secs));
        if used.insert(signature.to_string(), timestamp).is_some() {
            tracing::warn!(wallet = %wallet, "Replayed signed challenge");
            return Err(AppError::Unauthorized("Signature already used".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::signature::test_keys::{sign, signing_key, wallet_of};

    #[tokio::test]
    async fn extreme_timestamps_are_rejected_without_overflow() {
        let guard = ChallengeGuard::new(300);
        let key = signing_key(1);
        let now = Utc::now();
        for timestamp in [i64::MIN, i64::MAX] {
            let message = SignatureVerifier::admin_challenge("stats", timestamp);
            let result = guard
                .verify_at(&wallet_of(&key), &message, &sign(&key, &message), timestamp, now)
                .await;
            match result {
                Err(AppError::Unauthorized(msg)) => assert!(msg.contains("expired")),
                other => panic!("expected expiry, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn window_is_symmetric_around_now() {
        let guard = ChallengeGuard::new(300);
        let now = Utc::now().timestamp();
        assert!(guard.is_fresh(now - 300, now));
        assert!(guard.is_fresh(now + 300, now));
        assert!(!guard.is_fresh(now - 301, now));
        assert!(!guard.is_fresh(now + 301, now));
    }

    #[tokio::test]
    async fn accepted_signature_cannot_be_replayed() {
        let guard = ChallengeGuard::new(300);
        let key = signing_key(2);
        let now = Utc::now();
        let message = SignatureVerifier::player_challenge("report-error", now.timestamp());
        let signature = sign(&key, &message);

        guard
            .verify_at(&wallet_of(&key), &message, &signature, now.timestamp(), now)
            .await
            .unwrap();
        assert!(guard
            .verify_at(&wallet_of(&key), &message, &signature, now.timestamp(), now)
            .await
            .is_err());
    }
}
