use crate::{
    constants::{PUBKEY_LEN, SIGNATURE_LEN},
    error::{AppError, Result},
};

fn decode_fixed<const N: usize>(value: &str) -> Option<[u8; N]> {
    let bytes = bs58::decode(value.trim()).into_vec().ok()?;
    bytes.try_into().ok()
}

/// Decodes a base58 wallet address into its 32-byte public key.
pub fn decode_wallet(address: &str) -> Result<[u8; PUBKEY_LEN]> {
    decode_fixed::<PUBKEY_LEN>(address)
        .ok_or_else(|| AppError::BadRequest("Invalid wallet address".to_string()))
}

/// Returns the trimmed wallet string once it decodes to a valid public key.
pub fn normalize_wallet(address: &str) -> Result<String> {
    decode_wallet(address)?;
    Ok(address.trim().to_string())
}

/// Transaction signatures are base58 encoded 64-byte ed25519 signatures.
pub fn decode_signature(signature: &str) -> Result<[u8; SIGNATURE_LEN]> {
    decode_fixed::<SIGNATURE_LEN>(signature)
        .ok_or_else(|| AppError::BadRequest("Invalid transaction signature".to_string()))
}

pub fn normalize_signature(signature: &str) -> Result<String> {
    decode_signature(signature)?;
    Ok(signature.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOBBY: &str = "EBTvDaV5eHmrumHTMABxcWFXyri9c9VPGSaqYYfsQ64F";

    #[test]
    fn accepts_real_wallet_address() {
        assert_eq!(normalize_wallet(&format!(" {LOBBY} ")).unwrap(), LOBBY);
    }

    #[test]
    fn rejects_non_base58_and_wrong_length() {
        assert!(matches!(
            normalize_wallet("0xabc"),
            Err(AppError::BadRequest(_))
        ));
        let short = bs58::encode([1u8; 16]).into_string();
        assert!(normalize_wallet(&short).is_err());
    }

    #[test]
    fn signature_requires_64_bytes() {
        let sig = bs58::encode([7u8; 64]).into_string();
        assert!(normalize_signature(&sig).is_ok());
        assert!(normalize_signature(LOBBY).is_err());
    }
}
