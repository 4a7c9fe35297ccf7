use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    config::RpcEndpoint,
    constants::RPC_COMMITMENT,
    error::{AppError, Result},
    services::chain_gateway::{RpcConnection, RpcConnector},
};

fn rpc_request(method: &str, params: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    })
}

fn transport_error(url: &str, err: impl std::fmt::Display) -> AppError {
    AppError::ServiceUnavailable(format!("{url}: {err}"))
}

fn build_headers(endpoint: &RpcEndpoint) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &endpoint.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!("Skipping invalid header '{}' for {}", name, endpoint.url),
        }
    }
    headers
}

/// Token balance in base units plus the mint's decimal exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenBalance {
    pub amount: u128,
    pub decimals: u8,
}

impl TokenBalance {
    pub fn zero(decimals: u8) -> Self {
        Self {
            amount: 0,
            decimals,
        }
    }

    /// Whether the balance covers `display_amount` whole tokens.
    pub fn covers(&self, display_amount: u64) -> bool {
        let scale = 10u128.saturating_pow(u32::from(self.decimals));
        self.amount >= u128::from(display_amount).saturating_mul(scale)
    }

    pub fn ui_amount(&self) -> f64 {
        self.amount as f64 / 10f64.powi(i32::from(self.decimals))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmations: Option<u64>,
    pub err: Option<serde_json::Value>,
    pub confirmation_status: Option<String>,
}

impl SignatureStatus {
    pub fn is_confirmed(&self) -> bool {
        self.err.is_none()
            && matches!(
                self.confirmation_status.as_deref(),
                Some("confirmed") | Some("finalized")
            )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedTransaction {
    pub slot: u64,
    pub block_time: Option<i64>,
    #[serde(default)]
    pub meta: Option<TransactionMeta>,
}

impl ConfirmedTransaction {
    pub fn succeeded(&self) -> bool {
        self.meta.as_ref().map(|m| m.err.is_none()).unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    pub err: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ContextValue<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct KeyedTokenAccount {
    account: TokenAccountData,
}

#[derive(Debug, Deserialize)]
struct TokenAccountData {
    data: ParsedData,
}

#[derive(Debug, Deserialize)]
struct ParsedData {
    parsed: ParsedInfo,
}

#[derive(Debug, Deserialize)]
struct ParsedInfo {
    info: TokenAccountInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenAccountInfo {
    token_amount: UiTokenAmount,
}

#[derive(Debug, Deserialize)]
struct UiTokenAmount {
    amount: String,
    decimals: u8,
}

fn sum_token_accounts(accounts: Vec<KeyedTokenAccount>) -> Result<TokenBalance> {
    let mut total = TokenBalance::zero(0);
    for keyed in accounts {
        let token_amount = keyed.account.data.parsed.info.token_amount;
        let amount = token_amount.amount.parse::<u128>().map_err(|e| {
            AppError::BlockchainRPC(format!("Invalid token amount '{}': {}", token_amount.amount, e))
        })?;
        total.decimals = token_amount.decimals;
        total.amount = total.amount.saturating_add(amount);
    }
    Ok(total)
}

/// Solana JSON-RPC client bound to a single endpoint.
pub struct SolanaRpcClient {
    endpoint: RpcEndpoint,
    headers: HeaderMap,
    client: reqwest::Client,
}

impl SolanaRpcClient {
    pub fn new(endpoint: RpcEndpoint, client: reqwest::Client) -> Self {
        Self {
            headers: build_headers(&endpoint),
            endpoint,
            client,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>> {
        let request = rpc_request(method, params);
        let url = self.endpoint.url.as_str();

        let response = self
            .client
            .post(url)
            .headers(self.headers.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(transport_error(url, format!("HTTP {status}")));
        }

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| transport_error(url, e))?;

        if let Some(err) = body.error {
            return Err(AppError::BlockchainRPC(format!(
                "{method} failed ({}): {}",
                err.code, err.message
            )));
        }
        Ok(body.result)
    }
}

#[async_trait]
impl RpcConnection for SolanaRpcClient {
    fn endpoint_url(&self) -> &str {
        &self.endpoint.url
    }

    async fn get_slot(&self) -> Result<u64> {
        self.call::<u64>("getSlot", serde_json::json!([{ "commitment": RPC_COMMITMENT }]))
            .await?
            .ok_or_else(|| transport_error(&self.endpoint.url, "empty getSlot result"))
    }

    async fn get_token_balance(&self, owner: &str, mint: &str) -> Result<TokenBalance> {
        let result: Option<ContextValue<Vec<KeyedTokenAccount>>> = self
            .call(
                "getTokenAccountsByOwner",
                serde_json::json!([
                    owner,
                    { "mint": mint },
                    { "encoding": "jsonParsed", "commitment": RPC_COMMITMENT }
                ]),
            )
            .await?;
        match result {
            Some(ctx) => sum_token_accounts(ctx.value),
            None => Ok(TokenBalance::zero(0)),
        }
    }

    async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>> {
        let result: Option<ContextValue<Vec<Option<SignatureStatus>>>> = self
            .call(
                "getSignatureStatuses",
                serde_json::json!([[signature], { "searchTransactionHistory": true }]),
            )
            .await?;
        Ok(result.and_then(|ctx| ctx.value.into_iter().next().flatten()))
    }

    async fn get_transaction(&self, signature: &str) -> Result<Option<ConfirmedTransaction>> {
        self.call(
            "getTransaction",
            serde_json::json!([
                signature,
                {
                    "commitment": RPC_COMMITMENT,
                    "encoding": "json",
                    "maxSupportedTransactionVersion": 0
                }
            ]),
        )
        .await
    }
}

/// Opens reqwest-backed connections; one shared HTTP client for all endpoints.
pub struct HttpRpcConnector {
    client: reqwest::Client,
}

impl HttpRpcConnector {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRpcConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl RpcConnector for HttpRpcConnector {
    fn connect(&self, endpoint: &RpcEndpoint) -> Arc<dyn RpcConnection> {
        Arc::new(SolanaRpcClient::new(endpoint.clone(), self.client.clone()))
    }
}
