use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{ApiJson, AppState};
use crate::{
    crypto::address::{normalize_signature, normalize_wallet},
    error::{AppError, Result},
};

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub wallet: String,
    pub balance: f64,
}

#[derive(Debug, Deserialize)]
pub struct VerifyTransactionRequest {
    pub signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTransactionResponse {
    pub status: String,
    pub slot: u64,
    pub confirmation_status: Option<String>,
}

/// GET /api/balance/{wallet}
pub async fn get_balance(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> Result<Json<BalanceResponse>> {
    let wallet = normalize_wallet(&wallet)?;
    let balance = match state.chain.get_balance(&wallet).await {
        Ok(balance) => balance,
        Err(err) => {
            tracing::error!(wallet = %wallet, error = %err, "Balance lookup failed");
            state.chain.recover_from(&err).await;
            return Err(err);
        }
    };

    Ok(Json(BalanceResponse {
        wallet,
        balance: balance.ui_amount(),
    }))
}

/// POST /api/transaction/verify
pub async fn verify_transaction(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyTransactionRequest>,
) -> Result<Json<VerifyTransactionResponse>> {
    let signature = normalize_signature(&req.signature)?;
    let status = match state.chain.get_transaction_status(&signature).await {
        Ok(status) => status,
        Err(err) => {
            tracing::error!(signature = %signature, error = %err, "Signature status lookup failed");
            state.chain.recover_from(&err).await;
            return Err(err);
        }
    };

    let status = status.ok_or_else(|| {
        AppError::InvalidTransaction("Transaction not found".to_string())
    })?;

    if status.err.is_some() {
        return Err(AppError::InvalidTransaction(
            "Transaction failed on chain".to_string(),
        ));
    }
    if !status.is_confirmed() {
        return Err(AppError::InvalidTransaction(
            "Transaction not yet confirmed".to_string(),
        ));
    }

    Ok(Json(VerifyTransactionResponse {
        status: "confirmed".to_string(),
        slot: status.slot,
        confirmation_status: status.confirmation_status,
    }))
}
