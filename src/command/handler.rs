// src/command/handler.rs

use serde_json::{json, Value};
use tracing::debug;

use crate::{
    api::make_tx::{make_tx, MakeTxError},
    command::protocol::{error_codes, Request, Response},
    AppState,
};

/// Commands this service answers to, with a one-line description each.
pub const COMMANDS: &[(&str, &str)] = &[(
    "make_tx",
    "Make new transaction with type /cosmos.bank.v1beta1.MsgSend",
)];

/// Dispatches one command request. Notifications are refused by the caller.
pub async fn handle_command(req: Request, state: AppState) -> Response {
    debug!("Dispatching command {}", req.method);

    match req.method.as_str() {
        "make_tx" => {
            let params = req.params.unwrap_or(Value::Null);
            match make_tx(&state, &params).await {
                Ok(tx_hash) => Response::success(req.id, json!({ "tx_hash": tx_hash })),
                Err(e) => Response::error(req.id, error_code(&e), e.to_string()),
            }
        }
        "list_commands" => {
            let commands: Vec<Value> = COMMANDS
                .iter()
                .map(|(name, description)| json!({ "name": name, "description": description }))
                .collect();
            Response::success(req.id, Value::Array(commands))
        }
        other => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Unknown command: {}", other),
        ),
    }
}

fn error_code(err: &MakeTxError) -> i32 {
    match err {
        MakeTxError::Validation(_) => error_codes::INVALID_PARAMS,
        MakeTxError::KeyUnavailable { .. } => error_codes::KEY_UNAVAILABLE,
        MakeTxError::Internal(_) => error_codes::INTERNAL_ERROR,
    }
}
