use ed25519_dalek::{Signature, VerifyingKey};

use crate::constants::{ADMIN_CHALLENGE_PREFIX, PLAYER_CHALLENGE_PREFIX};
use crate::crypto::address::{decode_signature, decode_wallet};
use crate::error::{AppError, Result};

/// Verifies ed25519 signatures produced by Solana wallets (`signMessage`).
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Message an admin wallet signs to authorize `action` at `timestamp` (unix seconds).
    pub fn admin_challenge(action: &str, timestamp: i64) -> String {
        format!("{ADMIN_CHALLENGE_PREFIX}:{action}:{timestamp}")
    }

    /// Message a player wallet signs to prove ownership for `action`.
    pub fn player_challenge(action: &str, timestamp: i64) -> String {
        format!("{PLAYER_CHALLENGE_PREFIX}:{action}:{timestamp}")
    }

    /// Checks that `signature` (base58) is a valid signature of `message`
    /// by the key behind `wallet` (base58).
    pub fn verify_wallet_signature(wallet: &str, message: &str, signature: &str) -> Result<()> {
        if wallet.trim().is_empty() || signature.trim().is_empty() {
            return Err(AppError::Unauthorized(
                "Wallet or signature cannot be empty".into(),
            ));
        }

        let key_bytes = decode_wallet(wallet)
            .map_err(|_| AppError::Unauthorized("Invalid signer wallet".into()))?;
        let sig_bytes = decode_signature(signature)
            .map_err(|_| AppError::Unauthorized("Malformed signature".into()))?;

        let verifying_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|_| AppError::Unauthorized("Signer wallet is not an ed25519 key".into()))?;
        let signature = Signature::from_bytes(&sig_bytes);

        verifying_key
            .verify_strict(message.as_bytes(), &signature)
            .map_err(|_| AppError::Unauthorized("Signature verification failed".into()))?;

        tracing::debug!("Verified wallet signature for {}", wallet);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_keys {
    use ed25519_dalek::{Signer, SigningKey};

    pub fn signing_key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    pub fn wallet_of(key: &SigningKey) -> String {
        bs58::encode(key.verifying_key().to_bytes()).into_string()
    }

    pub fn sign(key: &SigningKey, message: &str) -> String {
        bs58::encode(key.sign(message.as_bytes()).to_bytes()).into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::test_keys::{sign, signing_key, wallet_of};
    use super::*;

    #[test]
    fn challenge_format_is_stable() {
        assert_eq!(
            SignatureVerifier::admin_challenge("approve-jackpot", 1_700_000_000),
            "tail-toss-admin:approve-jackpot:1700000000"
        );
    }

    #[test]
    fn player_and_admin_challenges_differ() {
        assert_eq!(
            SignatureVerifier::player_challenge("report-error", 5),
            "tail-toss-player:report-error:5"
        );
        assert_ne!(
            SignatureVerifier::player_challenge("stats", 5),
            SignatureVerifier::admin_challenge("stats", 5)
        );
    }

    #[test]
    fn valid_signature_verifies() {
        let key = signing_key(9);
        let message = SignatureVerifier::admin_challenge("stats", 42);
        let sig = sign(&key, &message);
        assert!(SignatureVerifier::verify_wallet_signature(&wallet_of(&key), &message, &sig).is_ok());
    }

    #[test]
    fn signature_from_other_key_is_rejected() {
        let key = signing_key(9);
        let other = signing_key(10);
        let message = SignatureVerifier::admin_challenge("stats", 42);
        let sig = sign(&other, &message);
        let result = SignatureVerifier::verify_wallet_signature(&wallet_of(&key), &message, &sig);
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn tampered_message_is_rejected() {
        let key = signing_key(3);
        let sig = sign(&key, &SignatureVerifier::admin_challenge("stats", 1));
        let result = SignatureVerifier::verify_wallet_signature(
            &wallet_of(&key),
            &SignatureVerifier::admin_challenge("approve-jackpot", 1),
            &sig,
        );
        assert!(result.is_err());
    }

    #[test]
    fn empty_inputs_are_rejected() {
        match SignatureVerifier::verify_wallet_signature("", "hello", "") {
            Err(AppError::Unauthorized(msg)) => assert!(msg.contains("cannot be empty")),
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }
}
