use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Game is paused: {reason}")]
    GamePaused {
        reason: String,
        winner: Option<String>,
        amount: Option<u64>,
        won_at_ms: Option<i64>,
    },

    #[error("Account restricted")]
    AccountRestricted,

    #[error("Active game in progress")]
    ActiveGameInProgress,

    #[error("Please wait {wait_seconds} seconds before playing again")]
    Cooldown { wait_seconds: u64 },

    #[error("Invalid bet amount: must be between {min} and {max}")]
    InvalidBet { min: u64, max: u64 },

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Service temporarily unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("All RPC endpoints are unavailable")]
    AllEndpointsUnavailable,

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("No active game for wallet")]
    NoActiveGame,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Blockchain RPC error: {0}")]
    BlockchainRPC(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Transport-level faults that should rotate the RPC endpoint.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AppError::ServiceUnavailable(_) | AppError::AllEndpointsUnavailable
        )
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            AppError::GamePaused {
                ref reason,
                ref winner,
                amount,
                won_at_ms,
            } => (
                StatusCode::FORBIDDEN,
                "GAME_PAUSED",
                format!("Game is paused: {reason}"),
                Some(json!({
                    "isPendingJackpot": winner.is_some(),
                    "winner": winner,
                    "amount": amount,
                    "timestamp": won_at_ms,
                    "reason": reason,
                })),
            ),
            AppError::AccountRestricted => (
                StatusCode::FORBIDDEN,
                "ACCOUNT_RESTRICTED",
                "This wallet is restricted. Contact support to lift the restriction.".to_string(),
                None,
            ),
            AppError::ActiveGameInProgress => (
                StatusCode::TOO_MANY_REQUESTS,
                "ACTIVE_GAME_IN_PROGRESS",
                "Finish your current game before starting another one".to_string(),
                None,
            ),
            AppError::Cooldown { wait_seconds } => (
                StatusCode::TOO_MANY_REQUESTS,
                "COOLDOWN",
                format!("Please wait {wait_seconds} seconds before playing again"),
                Some(json!({ "waitSeconds": wait_seconds })),
            ),
            AppError::InvalidBet { min, max } => (
                StatusCode::BAD_REQUEST,
                "INVALID_BET",
                format!("Bet amount must be between {min} and {max}"),
                Some(json!({ "minBet": min, "maxBet": max })),
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Too many plays. Please try again in a minute.".to_string(),
                None,
            ),
            AppError::InsufficientBalance => (
                StatusCode::BAD_REQUEST,
                "INSUFFICIENT_BALANCE",
                "Insufficient token balance for this bet".to_string(),
                None,
            ),
            AppError::ServiceUnavailable(_) | AppError::AllEndpointsUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Service temporarily unavailable, please try again".to_string(),
                None,
            ),
            AppError::InvalidTransaction(ref msg) => (
                StatusCode::BAD_REQUEST,
                "INVALID_TRANSACTION",
                msg.clone(),
                None,
            ),
            AppError::NoActiveGame => (
                StatusCode::CONFLICT,
                "NO_ACTIVE_GAME",
                "No active game found for this wallet; it may already be confirmed or expired"
                    .to_string(),
                None,
            ),
            AppError::Unauthorized(ref msg) => {
                (StatusCode::FORBIDDEN, "UNAUTHORIZED", msg.clone(), None)
            }
            AppError::BadRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
            AppError::BlockchainRPC(ref msg) => {
                tracing::error!("Blockchain RPC error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "BLOCKCHAIN_RPC_ERROR",
                    "The blockchain node rejected the request".to_string(),
                    None,
                )
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    format!(
                        "Server error. Contact support with this error ID: {}",
                        chrono::Utc::now().timestamp_millis()
                    ),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        });

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
