use super::{admin_credentials, ApiJson, AppState};
use crate::{
    crypto::address::normalize_wallet,
    error::{AppError, Result},
    models::AdminStats,
};
use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct PauseRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnrestrictRequest {
    pub wallet: String,
}

#[derive(Debug, Serialize)]
pub struct AdminActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<bool>,
}

impl AdminActionResponse {
    fn ok() -> Self {
        Self {
            success: true,
            message: None,
            removed: None,
        }
    }
}

/// GET /api/admin/stats
pub async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AdminStats>> {
    state
        .admin
        .authorize(&admin_credentials(&headers), "stats")
        .await?;
    Ok(Json(state.admin.stats().await))
}

/// POST /api/admin/approve-jackpot
pub async fn approve_jackpot(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AdminActionResponse>> {
    let admin = state
        .admin
        .authorize(&admin_credentials(&headers), "approve-jackpot")
        .await?;

    let message = match state.admin.approve_jackpot(&admin).await {
        Some(jackpot) => format!(
            "Jackpot of {} for {} approved. Game resumed.",
            jackpot.amount, jackpot.wallet
        ),
        None => "No pending jackpot. Game resumed.".to_string(),
    };

    Ok(Json(AdminActionResponse {
        message: Some(message),
        ..AdminActionResponse::ok()
    }))
}

/// POST /api/admin/pause
pub async fn pause(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AdminActionResponse>> {
    let admin = state
        .admin
        .authorize(&admin_credentials(&headers), "pause")
        .await?;

    // The body is optional; an empty POST pauses with the default reason.
    let req: PauseRequest = if body.is_empty() {
        PauseRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid pause request: {}", e)))?
    };
    let reason = req
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("Paused by admin");
    state.admin.pause(&admin, reason).await;

    Ok(Json(AdminActionResponse::ok()))
}

/// POST /api/admin/unrestrict
pub async fn unrestrict(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<UnrestrictRequest>,
) -> Result<Json<AdminActionResponse>> {
    let admin = state
        .admin
        .authorize(&admin_credentials(&headers), "unrestrict")
        .await?;

    let wallet = normalize_wallet(&req.wallet)?;
    let removed = state.admin.unrestrict(&admin, &wallet).await;

    Ok(Json(AdminActionResponse {
        removed: Some(removed),
        ..AdminActionResponse::ok()
    }))
}
