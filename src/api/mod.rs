// src/api/mod.rs

pub mod admin;
pub mod health;
pub mod play;
pub mod wallet;

use axum::{extract::FromRequest, http::HeaderMap};
use std::sync::Arc;

use crate::config::Config;
use crate::constants::{ADMIN_SIGNATURE_HEADER, ADMIN_TIMESTAMP_HEADER, ADMIN_WALLET_HEADER};
use crate::error::AppError;
use crate::services::{
    admin_gateway::AdminCredentials, chain_gateway::RpcConnector, AdminGateway, ChainGateway,
    ChallengeGuard, PlayCoordinator, PlayRules,
};

/// `Json` extractor whose rejections use the API error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

// AppState definition
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub chain: Arc<ChainGateway>,
    pub plays: Arc<PlayCoordinator>,
    pub admin: Arc<AdminGateway>,
    pub player_challenges: Arc<ChallengeGuard>,
}

impl AppState {
    pub fn new(config: Config, connector: Arc<dyn RpcConnector>) -> Self {
        let chain = Arc::new(ChainGateway::from_config(&config, connector));
        let plays = Arc::new(PlayCoordinator::new(
            PlayRules::from_config(&config),
            chain.clone(),
        ));
        Self::assemble(config, chain, plays)
    }

    fn assemble(config: Config, chain: Arc<ChainGateway>, plays: Arc<PlayCoordinator>) -> Self {
        let admin = Arc::new(AdminGateway::from_config(&config, plays.clone()));
        let player_challenges =
            Arc::new(ChallengeGuard::new(config.player_signature_max_age_secs));
        Self {
            config,
            chain,
            plays,
            admin,
            player_challenges,
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn admin_credentials(headers: &HeaderMap) -> AdminCredentials {
    AdminCredentials {
        wallet: header_str(headers, ADMIN_WALLET_HEADER).map(str::to_string),
        signature: header_str(headers, ADMIN_SIGNATURE_HEADER).map(str::to_string),
        timestamp: header_str(headers, ADMIN_TIMESTAMP_HEADER).and_then(|v| v.parse().ok()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::services::chain_gateway::mock::{MockChain, MockConnector};
    use rand::{rngs::StdRng, SeedableRng};

    pub fn wallet(seed: u8) -> String {
        bs58::encode([seed; 32]).into_string()
    }

    pub fn tx_signature(seed: u8) -> String {
        bs58::encode([seed; 64]).into_string()
    }

    pub fn state_with(config: Config) -> (AppState, Arc<MockChain>) {
        let chain = Arc::new(MockChain::default());
        let gateway = Arc::new(ChainGateway::from_config(
            &config,
            Arc::new(MockConnector {
                chain: chain.clone(),
            }),
        ));
        let plays = Arc::new(PlayCoordinator::with_rng(
            PlayRules::from_config(&config),
            gateway.clone(),
            Box::new(StdRng::seed_from_u64(11)),
        ));
        (AppState::assemble(config, gateway, plays), chain)
    }

    pub fn state() -> (AppState, Arc<MockChain>) {
        state_with(Config::for_tests())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{HeaderValue, Request, StatusCode},
        response::IntoResponse,
    };
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct BetBody {
        bet_amount: u64,
    }

    fn json_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn malformed_json_body_uses_error_envelope() {
        for body in [r#"{"betAmount": -5}"#, "{", r#"{"other": 1}"#] {
            let err = ApiJson::<BetBody>::from_request(json_request(body), &())
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "body {body}");

            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
                .await
                .unwrap();
            let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(json["success"], false);
            assert_eq!(json["error"]["code"], "BAD_REQUEST");
        }
    }

    #[tokio::test]
    async fn well_formed_json_body_is_extracted() {
        let request = json_request(r#"{"betAmount": 500}"#);
        let ApiJson(body) = ApiJson::<BetBody>::from_request(request, &())
            .await
            .unwrap();
        assert_eq!(body.bet_amount, 500);
    }

    #[test]
    fn admin_credentials_read_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_WALLET_HEADER, HeaderValue::from_static(" admin "));
        headers.insert(ADMIN_SIGNATURE_HEADER, HeaderValue::from_static("sig"));
        headers.insert(ADMIN_TIMESTAMP_HEADER, HeaderValue::from_static("1700000000"));

        let creds = admin_credentials(&headers);
        assert_eq!(creds.wallet.as_deref(), Some("admin"));
        assert_eq!(creds.signature.as_deref(), Some("sig"));
        assert_eq!(creds.timestamp, Some(1_700_000_000));
    }

    #[test]
    fn malformed_timestamp_is_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_TIMESTAMP_HEADER, HeaderValue::from_static("soon"));
        let creds = admin_credentials(&headers);
        assert!(creds.timestamp.is_none());
        assert!(creds.wallet.is_none());
    }
}
