//! Node client abstraction.
//!
//! The pipeline only needs two things from a node: the sender's current
//! account state and a sync broadcast. Both connectivity modes implement
//! [`ChainClient`]; which one is used is fixed at startup.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

pub use super::rest_client::RestChainClient;
pub use super::rpc_client::RpcChainClient;
use crate::blockchain::models::{AccountState, BroadcastResult, ChainError};
use crate::config::{Config, Connectivity};

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Reads account number and sequence for `address` from the node at `node_address`.
    async fn account(&self, node_address: &str, address: &str) -> Result<AccountState, ChainError>;

    /// Submits encoded `TxRaw` bytes in sync mode.
    ///
    /// A non-zero response code is returned as [`ChainError::Rejected`].
    async fn broadcast(&self, node_address: &str, tx_bytes: &[u8]) -> Result<BroadcastResult, ChainError>;
}

/// Shared HTTP client with the fixed per-call deadline.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Builds the client for the configured connectivity mode.
pub fn create_chain_client(config: &Config) -> Result<Arc<dyn ChainClient>> {
    let http = http_client(Duration::from_secs(config.request_timeout_secs))?;
    let client: Arc<dyn ChainClient> = match config.connectivity {
        Connectivity::Rest => Arc::new(RestChainClient::new(http)),
        Connectivity::Rpc => Arc::new(RpcChainClient::new(http)),
    };
    Ok(client)
}

/// Joins a node base URL and a path without doubling slashes.
pub(crate) fn endpoint(node_address: &str, path: &str) -> String {
    format!(
        "{}/{}",
        node_address.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
