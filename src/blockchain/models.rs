// src/blockchain/models.rs
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Error types for node operations ---

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("node request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("node returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("node rejected transaction with code {code}: {raw}")]
    Rejected { code: u32, raw_log: String, raw: String },
    #[error("node RPC error: {0}")]
    Rpc(String),
    #[error("account {0} not found on chain")]
    AccountNotFound(String),
    #[error("unexpected node response: {0}")]
    Decode(String),
}

// --- Transfer Models ---

/// A validated `make_tx` request. Amounts are in base units of the configured denom.
#[derive(Debug)]
pub struct MakeTxRequest {
    pub node_address: String,
    pub from: String,
    pub to: String,
    pub chain_id: String,
    pub passphrase: SecretString,
    pub amount: u64,
    pub gas_limit: u64,
    pub fee_amount: u64,
    pub memo: String,
}

// --- Account Models ---

/// Sender account state, read fresh for every transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub address: String,
    pub account_number: u64,
    pub sequence: u64,
    /// Compressed secp256k1 key, absent until the account has signed once.
    pub pub_key: Option<Vec<u8>>,
}

// --- Broadcast Models ---

/// What the node reported after a sync broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastResult {
    pub tx_hash: String,
    pub code: u32,
    pub raw_log: String,
}

impl BroadcastResult {
    /// Fails on a non-zero code or a missing hash.
    ///
    /// `raw` is the full response payload and is carried in the error so the
    /// operator sees exactly what the node said.
    pub fn ensure_accepted(self, raw: &str) -> Result<Self, ChainError> {
        if self.code != 0 {
            return Err(ChainError::Rejected {
                code: self.code,
                raw_log: self.raw_log,
                raw: raw.to_string(),
            });
        }
        if self.tx_hash.is_empty() {
            return Err(ChainError::Decode(format!("missing tx hash in {}", raw)));
        }
        Ok(self)
    }
}

// --- REST gateway wire types ---

/// Body of `POST /cosmos/tx/v1beta1/txs`.
#[derive(Debug, Serialize)]
pub struct TxBroadcastRequest {
    pub tx_bytes: String,
    pub mode: String,
}

#[derive(Debug, Deserialize)]
pub struct TxBroadcastResponse {
    pub tx_response: TxResponse,
}

#[derive(Debug, Deserialize)]
pub struct TxResponse {
    #[serde(default)]
    pub txhash: String,
    pub code: u32,
    #[serde(default)]
    pub raw_log: String,
}

impl From<TxResponse> for BroadcastResult {
    fn from(res: TxResponse) -> Self {
        BroadcastResult {
            tx_hash: res.txhash,
            code: res.code,
            raw_log: res.raw_log,
        }
    }
}
