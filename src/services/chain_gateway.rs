use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::{
    config::{Config, RpcEndpoint},
    error::{AppError, Result},
    integrations::solana_rpc::{ConfirmedTransaction, SignatureStatus, TokenBalance},
};

/// A live connection to one RPC endpoint.
#[async_trait]
pub trait RpcConnection: Send + Sync {
    fn endpoint_url(&self) -> &str;

    /// Liveness probe.
    async fn get_slot(&self) -> Result<u64>;

    async fn get_token_balance(&self, owner: &str, mint: &str) -> Result<TokenBalance>;

    async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>>;

    async fn get_transaction(&self, signature: &str) -> Result<Option<ConfirmedTransaction>>;
}

/// Builds connection handles for endpoints.
pub trait RpcConnector: Send + Sync {
    fn connect(&self, endpoint: &RpcEndpoint) -> Arc<dyn RpcConnection>;
}

struct Cursor {
    next_index: usize,
    current: Option<Arc<dyn RpcConnection>>,
}

/// Connection manager with priority-ordered endpoint failover.
///
/// The first endpoint that answers `getSlot` is cached until a caller reports a
/// transport fault through [`ChainGateway::reset_connection`], which rewinds to the
/// highest priority endpoint and probes again. Balances are never cached.
pub struct ChainGateway {
    endpoints: Vec<RpcEndpoint>,
    connector: Arc<dyn RpcConnector>,
    token_mint: String,
    timeout: Duration,
    cursor: Mutex<Cursor>,
}

impl ChainGateway {
    pub fn new(
        mut endpoints: Vec<RpcEndpoint>,
        connector: Arc<dyn RpcConnector>,
        token_mint: String,
        timeout: Duration,
    ) -> Self {
        endpoints.sort_by_key(|e| e.priority);
        Self {
            endpoints,
            connector,
            token_mint,
            timeout,
            cursor: Mutex::new(Cursor {
                next_index: 0,
                current: None,
            }),
        }
    }

    pub fn from_config(config: &Config, connector: Arc<dyn RpcConnector>) -> Self {
        Self::new(
            config.rpc_endpoints.clone(),
            connector,
            config.token_mint_address.clone(),
            config.rpc_timeout(),
        )
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::ServiceUnavailable(format!(
                "RPC call timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    // Walks endpoints from the cursor; caller holds the lock.
    async fn probe_from_cursor(&self, cursor: &mut Cursor) -> Result<Arc<dyn RpcConnection>> {
        while cursor.next_index < self.endpoints.len() {
            let endpoint = &self.endpoints[cursor.next_index];
            let connection = self.connector.connect(endpoint);
            match self.bounded(connection.get_slot()).await {
                Ok(slot) => {
                    tracing::info!("Connected to RPC endpoint: {} (slot {})", endpoint.url, slot);
                    cursor.current = Some(connection.clone());
                    return Ok(connection);
                }
                Err(e) => {
                    tracing::error!("Failed to connect to {}: {}", endpoint.url, e);
                    cursor.next_index += 1;
                }
            }
        }
        // Rewind so the next request gets a full rotation.
        cursor.next_index = 0;
        cursor.current = None;
        tracing::error!("All RPC endpoints failed");
        Err(AppError::AllEndpointsUnavailable)
    }

    /// Returns the cached connection, probing endpoints if none is cached.
    pub async fn get_connection(&self) -> Result<Arc<dyn RpcConnection>> {
        let mut cursor = self.cursor.lock().await;
        if let Some(current) = cursor.current.as_ref() {
            return Ok(current.clone());
        }
        self.probe_from_cursor(&mut cursor).await
    }

    /// Drops the cached connection and reprobes from the highest priority endpoint.
    pub async fn reset_connection(&self) -> Result<Arc<dyn RpcConnection>> {
        let mut cursor = self.cursor.lock().await;
        tracing::warn!("Resetting RPC connection");
        cursor.next_index = 0;
        cursor.current = None;
        self.probe_from_cursor(&mut cursor).await
    }

    pub async fn current_endpoint(&self) -> Option<String> {
        let cursor = self.cursor.lock().await;
        cursor.current.as_ref().map(|c| c.endpoint_url().to_string())
    }

    /// Balance of the configured token mint held by `wallet`.
    pub async fn get_balance(&self, wallet: &str) -> Result<TokenBalance> {
        let connection = self.get_connection().await?;
        self.bounded(connection.get_token_balance(wallet, &self.token_mint))
            .await
    }

    pub async fn get_transaction_status(&self, signature: &str) -> Result<Option<SignatureStatus>> {
        let connection = self.get_connection().await?;
        self.bounded(connection.get_signature_status(signature)).await
    }

    pub async fn get_transaction(&self, signature: &str) -> Result<Option<ConfirmedTransaction>> {
        let connection = self.get_connection().await?;
        self.bounded(connection.get_transaction(signature)).await
    }

    /// Rotates endpoints after a transport fault. Failures are logged only;
    /// the caller still reports the error it got.
    pub async fn recover_from(&self, err: &AppError) {
        if !err.is_transport() {
            return;
        }
        // A full rotation just failed and rewound the cursor; reprobing here would
        // walk the list twice in one request.
        if matches!(err, AppError::AllEndpointsUnavailable) {
            tracing::warn!("All RPC endpoints down; next request reprobes from the top");
            return;
        }
        tracing::warn!("RPC transport error, attempting to reset connection: {}", err);
        if let Err(reset_err) = self.reset_connection().await {
            tracing::error!("Connection reset failed: {}", reset_err);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{gateway, MockChain};
    use super::*;

    const A: &str = "https://rpc-a.test";
    const B: &str = "https://rpc-b.test";
    const C: &str = "https://rpc-c.test";

    #[tokio::test]
    async fn first_live_endpoint_is_cached() {
        let chain = Arc::new(MockChain::default());
        let gw = gateway(chain.clone(), &[A, B]);

        let conn = gw.get_connection().await.unwrap();
        assert_eq!(conn.endpoint_url(), A);
        gw.get_connection().await.unwrap();
        assert_eq!(chain.probes(), vec![A.to_string()]);
        assert_eq!(gw.current_endpoint().await.as_deref(), Some(A));
    }

    #[tokio::test]
    async fn fails_over_when_primary_probe_fails() {
        let chain = Arc::new(MockChain::default());
        chain.set_down(A, true);
        let gw = gateway(chain.clone(), &[A, B, C]);

        let conn = gw.get_connection().await.unwrap();
        assert_eq!(conn.endpoint_url(), B);
        assert_eq!(chain.probes(), vec![A.to_string(), B.to_string()]);
    }

    #[tokio::test]
    async fn reset_rewinds_to_primary() {
        let chain = Arc::new(MockChain::default());
        chain.set_down(A, true);
        let gw = gateway(chain.clone(), &[A, B]);
        assert_eq!(gw.get_connection().await.unwrap().endpoint_url(), B);

        chain.set_down(A, false);
        let conn = gw.reset_connection().await.unwrap();
        assert_eq!(conn.endpoint_url(), A);
        assert_eq!(
            chain.probes(),
            vec![A.to_string(), B.to_string(), A.to_string()]
        );
    }

    #[tokio::test]
    async fn all_endpoints_down_then_recovery() {
        let chain = Arc::new(MockChain::default());
        chain.set_down(A, true);
        chain.set_down(B, true);
        let gw = gateway(chain.clone(), &[A, B]);

        assert!(matches!(
            gw.get_connection().await,
            Err(AppError::AllEndpointsUnavailable)
        ));
        assert!(gw.current_endpoint().await.is_none());

        chain.set_down(B, false);
        assert_eq!(gw.get_connection().await.unwrap().endpoint_url(), B);
    }

    #[tokio::test]
    async fn full_rotation_failure_does_not_reprobe() {
        let chain = Arc::new(MockChain::default());
        chain.set_down(A, true);
        chain.set_down(B, true);
        let gw = gateway(chain.clone(), &[A, B]);

        let err = gw.get_balance("wallet").await.unwrap_err();
        assert!(matches!(err, AppError::AllEndpointsUnavailable));
        gw.recover_from(&err).await;
        assert_eq!(chain.probes(), vec![A.to_string(), B.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_call_times_out_as_service_unavailable() {
        let chain = Arc::new(MockChain::default());
        chain.set_balance("wallet", 10);
        *chain.stall_balance.lock().unwrap() = true;
        let gw = gateway(chain.clone(), &[A]);

        match gw.get_balance("wallet").await {
            Err(AppError::ServiceUnavailable(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(gw.get_balance("wallet").await.unwrap_err().is_transport());

        *chain.stall_balance.lock().unwrap() = false;
        assert!(gw.get_balance("wallet").await.unwrap().covers(10));
    }

    #[tokio::test]
    async fn endpoints_are_sorted_by_priority() {
        let chain = Arc::new(MockChain::default());
        let gw = ChainGateway::new(
            vec![RpcEndpoint::new(B, 2), RpcEndpoint::new(A, 1)],
            Arc::new(mock::MockConnector {
                chain: chain.clone(),
            }),
            "mint".into(),
            Duration::from_millis(200),
        );
        assert_eq!(gw.get_connection().await.unwrap().endpoint_url(), A);
    }

    #[tokio::test]
    async fn balance_and_transaction_lookups_use_current_endpoint() {
        let chain = Arc::new(MockChain::default());
        chain.set_balance("wallet", 500);
        chain.add_transaction("sig", false);
        let gw = gateway(chain.clone(), &[A]);

        assert!(gw.get_balance("wallet").await.unwrap().covers(500));
        assert!(!gw.get_balance("other").await.unwrap().covers(1));
        assert!(gw.get_transaction("sig").await.unwrap().is_some());
        assert!(gw.get_transaction("missing").await.unwrap().is_none());
        let status = gw.get_transaction_status("sig").await.unwrap().unwrap();
        assert!(status.is_confirmed());
    }

    #[tokio::test]
    async fn recover_from_ignores_business_errors() {
        let chain = Arc::new(MockChain::default());
        let gw = gateway(chain.clone(), &[A]);
        gw.get_connection().await.unwrap();

        gw.recover_from(&AppError::InvalidTransaction("nope".into()))
            .await;
        assert_eq!(chain.probes().len(), 1);

        gw.recover_from(&AppError::ServiceUnavailable("reset".into()))
            .await;
        assert_eq!(chain.probes().len(), 2);
    }
}
