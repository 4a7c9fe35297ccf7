use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::{ApiJson, AppState};
use crate::{
    crypto::{
        address::{normalize_signature, normalize_wallet},
        signature::SignatureVerifier,
    },
    error::{AppError, Result},
    models::{GameStatusResponse, Outcome},
};

const REPORT_ERROR_ACTION: &str = "report-error";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePlayRequest {
    pub wallet: String,
    pub bet_amount: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePlayResponse {
    pub validated: bool,
    pub outcome: Outcome,
    pub timestamp: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPlayRequest {
    pub wallet: String,
    pub signature: String,
    pub outcome: Option<Outcome>,
    pub bet_amount: Option<u64>,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPlayResponse {
    pub confirmed: bool,
    pub outcome: Outcome,
    pub bet_amount: u64,
}

/// Error report signed by the reporting wallet over
/// `tail-toss-player:report-error:{timestamp}`.
#[derive(Debug, Deserialize)]
pub struct ReportErrorRequest {
    pub wallet: String,
    pub message: Option<String>,
    pub timestamp: Option<i64>,
    pub signature: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportErrorResponse {
    pub error_count: u32,
    pub restricted: bool,
}

/// POST /api/play/validate
pub async fn validate_play(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ValidatePlayRequest>,
) -> Result<Json<ValidatePlayResponse>> {
    let wallet = normalize_wallet(&req.wallet)?;
    let play = state.plays.validate(&wallet, req.bet_amount).await?;
    Ok(Json(ValidatePlayResponse {
        validated: true,
        outcome: play.outcome,
        timestamp: play.issued_at.timestamp_millis(),
    }))
}

/// POST /api/play/confirm
pub async fn confirm_play(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ConfirmPlayRequest>,
) -> Result<Json<ConfirmPlayResponse>> {
    let wallet = normalize_wallet(&req.wallet)?;
    let signature = normalize_signature(&req.signature)?;
    let receipt = state
        .plays
        .confirm(&wallet, &signature, req.outcome, req.bet_amount, req.timestamp)
        .await?;
    Ok(Json(ConfirmPlayResponse {
        confirmed: true,
        outcome: receipt.outcome,
        bet_amount: receipt.bet_amount,
    }))
}

/// POST /api/play/report-error
pub async fn report_error(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ReportErrorRequest>,
) -> Result<Json<ReportErrorResponse>> {
    let wallet = normalize_wallet(&req.wallet)?;

    // Reports count toward a restriction, so only the wallet's owner may file them.
    let (Some(timestamp), Some(signature)) = (req.timestamp, req.signature.as_deref()) else {
        tracing::warn!(wallet = %wallet, "Unsigned error report rejected");
        return Err(AppError::Unauthorized(
            "Error reports must be signed by the reporting wallet".to_string(),
        ));
    };
    let challenge = SignatureVerifier::player_challenge(REPORT_ERROR_ACTION, timestamp);
    state
        .player_challenges
        .verify(&wallet, &challenge, signature.trim(), timestamp)
        .await?;
    let message = req.message.as_deref().map(|m| {
        // Keep log lines bounded; clients send raw error strings.
        let end = m.char_indices().nth(200).map(|(i, _)| i).unwrap_or(m.len());
        &m[..end]
    });
    let report = state.plays.report_client_error(&wallet, message).await;
    Ok(Json(ReportErrorResponse {
        error_count: report.error_count,
        restricted: report.restricted,
    }))
}

/// GET /api/game/status
pub async fn game_status(State(state): State<AppState>) -> Json<GameStatusResponse> {
    Json(state.plays.game_status().await)
}
