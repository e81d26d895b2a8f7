// src/blockchain/rpc_client.rs

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64STD, Engine};
use cosmrs::proto::cosmos::auth::v1beta1::{QueryAccountRequest, QueryAccountResponse};
use prost::Message;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use crate::blockchain::{
    client::{endpoint, ChainClient},
    models::{AccountState, BroadcastResult, ChainError},
    registry::TypeRegistry,
};

const ACCOUNT_QUERY_PATH: &str = "/cosmos.auth.v1beta1.Query/Account";

/// Talks to the Tendermint JSON-RPC endpoint of the requested node.
#[derive(Clone)]
pub struct RpcChainClient {
    http: Client,
}

impl RpcChainClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    async fn call(&self, node_address: &str, method: &str, params: Value) -> Result<(Value, String), ChainError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let res = self
            .http
            .post(endpoint(node_address, ""))
            .json(&payload)
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;

        if status != StatusCode::OK {
            return Err(ChainError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let response: Value = serde_json::from_str(&body)
            .map_err(|e| ChainError::Decode(format!("{}: {}", e, body)))?;
        if let Some(error) = response.get("error") {
            return Err(ChainError::Rpc(error.to_string()));
        }
        let result = response
            .get("result")
            .cloned()
            .ok_or_else(|| ChainError::Decode(format!("missing result in {}", body)))?;
        Ok((result, body))
    }
}

// Response codes are uint32; anything else is a malformed reply, never success.
fn parse_code(code: &Value) -> Result<u32, ChainError> {
    code.as_u64()
        .and_then(|c| u32::try_from(c).ok())
        .ok_or_else(|| ChainError::Decode(format!("invalid response code {}", code)))
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn account(&self, node_address: &str, address: &str) -> Result<AccountState, ChainError> {
        let request = QueryAccountRequest {
            address: address.to_string(),
        };
        debug!("ABCI account query for {} at {}", address, node_address);

        let (result, _) = self
            .call(
                node_address,
                "abci_query",
                json!({
                    "path": ACCOUNT_QUERY_PATH,
                    "data": hex::encode(request.encode_to_vec()),
                    "prove": false,
                }),
            )
            .await?;

        let response = &result["response"];
        // ABCI query results omit a zero code.
        let code = match response.get("code") {
            None => 0,
            Some(code) => parse_code(code)?,
        };
        if code != 0 {
            let log = response["log"].as_str().unwrap_or_default();
            if log.contains("not found") {
                return Err(ChainError::AccountNotFound(address.to_string()));
            }
            return Err(ChainError::Decode(format!(
                "account query failed with code {}: {}",
                code, log
            )));
        }

        let value = match response["value"].as_str() {
            Some(v) if !v.is_empty() => v,
            _ => return Err(ChainError::AccountNotFound(address.to_string())),
        };
        let bytes = BASE64STD
            .decode(value)
            .map_err(|e| ChainError::Decode(format!("invalid query value: {}", e)))?;
        let account = QueryAccountResponse::decode(bytes.as_slice())
            .map_err(|e| ChainError::Decode(format!("invalid QueryAccountResponse: {}", e)))?
            .account
            .ok_or_else(|| ChainError::AccountNotFound(address.to_string()))?;

        TypeRegistry::global()
            .decode_account(&account)
            .map_err(|e| ChainError::Decode(e.to_string()))
    }

    async fn broadcast(&self, node_address: &str, tx_bytes: &[u8]) -> Result<BroadcastResult, ChainError> {
        let (result, body) = self
            .call(
                node_address,
                "broadcast_tx_sync",
                json!({ "tx": BASE64STD.encode(tx_bytes) }),
            )
            .await?;

        BroadcastResult {
            tx_hash: result["hash"].as_str().unwrap_or_default().to_string(),
            code: parse_code(result.get("code").unwrap_or(&Value::Null))?,
            raw_log: result["log"].as_str().unwrap_or_default().to_string(),
        }
        .ensure_accepted(&body)
    }
}
