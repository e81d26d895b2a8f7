// src/command/protocol.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound command call. `id` is absent for notifications.
#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
}

pub const JSONRPC_VERSION: &str = "2.0";

impl Request {
    pub fn is_notification(&self) -> bool {
        self.id.is_null()
    }

    /// Checks the envelope before dispatch.
    pub fn envelope_error(&self) -> Option<Response> {
        if self.is_notification() {
            return Some(Response::error(
                Value::Null,
                error_codes::INVALID_REQUEST,
                "Notifications are not supported over HTTP".into(),
            ));
        }
        if self.jsonrpc != JSONRPC_VERSION {
            return Some(Response::error(
                self.id.clone(),
                error_codes::INVALID_REQUEST,
                format!("Unsupported jsonrpc version '{}'", self.jsonrpc),
            ));
        }
        None
    }
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i32, message: String) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(ErrorObject { code, message }),
        }
    }
}

// Standard JSON-RPC error codes, plus the server-defined ones this service uses.
pub mod error_codes {
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const KEY_UNAVAILABLE: i32 = -32001;
}
