// src/blockchain/rest_client.rs

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64STD, Engine};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::blockchain::{
    client::{endpoint, ChainClient},
    models::{AccountState, BroadcastResult, ChainError, TxBroadcastRequest, TxBroadcastResponse},
};

const ACCOUNTS_PATH: &str = "cosmos/auth/v1beta1/accounts";
const TXS_PATH: &str = "cosmos/tx/v1beta1/txs";
const BROADCAST_MODE_SYNC: &str = "BROADCAST_MODE_SYNC";

/// Talks to the Cosmos REST gateway of the requested node.
#[derive(Clone)]
pub struct RestChainClient {
    http: Client,
}

impl RestChainClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChainClient for RestChainClient {
    async fn account(&self, node_address: &str, address: &str) -> Result<AccountState, ChainError> {
        let url = endpoint(node_address, &format!("{}/{}", ACCOUNTS_PATH, address));
        debug!("Querying account {} at {}", address, url);

        let res = self.http.get(&url).send().await?;
        let status = res.status();
        let body = res.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(ChainError::AccountNotFound(address.to_string()));
        }
        if status != StatusCode::OK {
            return Err(ChainError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| ChainError::Decode(format!("account response is not JSON: {}", e)))?;
        parse_account(&value)
    }

    async fn broadcast(&self, node_address: &str, tx_bytes: &[u8]) -> Result<BroadcastResult, ChainError> {
        let url = endpoint(node_address, TXS_PATH);
        let payload = TxBroadcastRequest {
            tx_bytes: BASE64STD.encode(tx_bytes),
            mode: BROADCAST_MODE_SYNC.to_string(),
        };

        let res = self.http.post(&url).json(&payload).send().await?;
        let status = res.status();
        let body = res.text().await?;

        if status != StatusCode::OK {
            return Err(ChainError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TxBroadcastResponse = serde_json::from_str(&body)
            .map_err(|e| ChainError::Decode(format!("{}: {}", e, body)))?;
        BroadcastResult::from(parsed.tx_response).ensure_accepted(&body)
    }
}

/// Reads `{"account": {...}}` as returned by `/cosmos/auth/v1beta1/accounts/{address}`.
///
/// Vesting accounts nest the base account one or two levels down.
pub fn parse_account(value: &Value) -> Result<AccountState, ChainError> {
    let account = value
        .get("account")
        .ok_or_else(|| ChainError::Decode("missing 'account' field".to_string()))?;

    let base = if let Some(base) = account.get("base_account") {
        base
    } else if let Some(base) = account
        .get("base_vesting_account")
        .and_then(|v| v.get("base_account"))
    {
        base
    } else {
        account
    };

    let address = base["address"]
        .as_str()
        .ok_or_else(|| ChainError::Decode("missing address".to_string()))?
        .to_string();

    let pub_key = match base.get("pub_key").and_then(|k| k.get("key")).and_then(Value::as_str) {
        Some(key) => Some(
            BASE64STD
                .decode(key)
                .map_err(|e| ChainError::Decode(format!("invalid pub_key: {}", e)))?,
        ),
        None => None,
    };

    Ok(AccountState {
        address,
        account_number: numeric_field(base, "account_number")?,
        sequence: numeric_field(base, "sequence")?,
        pub_key,
    })
}

// The gateway renders uint64 as strings; tolerate bare numbers too.
fn numeric_field(value: &Value, key: &str) -> Result<u64, ChainError> {
    match value.get(key) {
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| ChainError::Decode(format!("{} is not a number: {}", key, s))),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| ChainError::Decode(format!("{} is not an unsigned integer", key))),
        _ => Err(ChainError::Decode(format!("missing {}", key))),
    }
}
