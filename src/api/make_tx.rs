use std::io;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    blockchain::{
        models::MakeTxRequest,
        services::transactions::{make_transfer, TxError},
    },
    utils::{get_str, value_to_u64},
    AppState,
};

#[derive(Error, Debug)]
pub enum MakeTxError {
    #[error("{0}")]
    Validation(String),
    #[error("don't have private key for {sender}")]
    KeyUnavailable {
        sender: String,
        #[source]
        source: io::Error,
    },
    #[error("something went wrong")]
    Internal(#[source] TxError),
}

impl MakeTxError {
    pub fn status(&self) -> StatusCode {
        match self {
            MakeTxError::Validation(_) => StatusCode::BAD_REQUEST,
            MakeTxError::KeyUnavailable { .. } => StatusCode::NOT_FOUND,
            MakeTxError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TxError> for MakeTxError {
    fn from(err: TxError) -> Self {
        if err.is_client_error() {
            MakeTxError::Validation(err.to_string())
        } else {
            MakeTxError::Internal(err)
        }
    }
}

impl IntoResponse for MakeTxError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct MakeTxResponse {
    pub tx_hash: String,
}

fn required_str(data: &Value, key: &str) -> Result<String, MakeTxError> {
    get_str(data, key)
        .map(str::to_string)
        .ok_or_else(|| MakeTxError::Validation(format!("{} field not string", key)))
}

fn required_u64(data: &Value, key: &str) -> Result<u64, MakeTxError> {
    data.get(key)
        .and_then(value_to_u64)
        .ok_or_else(|| MakeTxError::Validation(format!("{} field not a non-negative integer", key)))
}

/// Type-checks a raw `make_tx` payload. Fields are checked in a fixed order
/// and the first bad one is reported.
pub fn validate_body(data: &Value) -> Result<MakeTxRequest, MakeTxError> {
    if !data.is_object() {
        return Err(MakeTxError::Validation("wrong request body".to_string()));
    }

    let node_address = required_str(data, "node_address")?;
    match url::Url::parse(&node_address) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => {
            return Err(MakeTxError::Validation(
                "node_address field not an http(s) URL".to_string(),
            ))
        }
    }

    let from = required_str(data, "from")?;
    let to = required_str(data, "to")?;
    let chain_id = required_str(data, "chain_id")?;
    let passphrase = SecretString::new(required_str(data, "passphrase")?);
    let amount = required_u64(data, "amount")?;
    let gas_limit = required_u64(data, "gas_limit")?;
    let fee_amount = required_u64(data, "fee_amount")?;

    let memo = match data.get("memo") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(memo)) => memo.clone(),
        Some(_) => return Err(MakeTxError::Validation("memo field not string".to_string())),
    };

    Ok(MakeTxRequest {
        node_address,
        from,
        to,
        chain_id,
        passphrase,
        amount,
        gas_limit,
        fee_amount,
        memo,
    })
}

/// Validates, loads the sender's key and runs the transfer pipeline.
pub async fn make_tx(state: &AppState, data: &Value) -> Result<String, MakeTxError> {
    let body = validate_body(data)?;

    let key_bytes = state.key_store.read(&body.from).await.map_err(|e| {
        warn!("Key file for {} unavailable: {}", body.from, e);
        MakeTxError::KeyUnavailable {
            sender: body.from.clone(),
            source: e,
        }
    })?;

    match make_transfer(
        state.chain_client.as_ref(),
        &state.config.native_denom,
        &body,
        &key_bytes,
    )
    .await
    {
        Ok(tx_hash) => {
            info!("Transfer from {} accepted: {}", body.from, tx_hash);
            Ok(tx_hash)
        }
        Err(e) => {
            error!("Transfer from {} failed: {:#}", body.from, e);
            Err(e.into())
        }
    }
}

pub async fn make_tx_handler(
    State(state): State<AppState>,
    Json(data): Json<Value>,
) -> Result<Json<MakeTxResponse>, MakeTxError> {
    let tx_hash = make_tx(&state, &data).await?;
    Ok(Json(MakeTxResponse { tx_hash }))
}
