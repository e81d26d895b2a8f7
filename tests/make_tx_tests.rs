//! End-to-end tests for the make_tx surface against stub nodes

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64STD, Engine};
use cosmrs::proto::cosmos::auth::v1beta1::{BaseAccount, QueryAccountResponse};
use mockito::{Matcher, Server};
use prost::Message;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use cosmos_tx_relay::{
    api::create_router,
    config::{Config, Connectivity},
    keys::{encryption::seal_private_key, Keyring},
    AppState,
};

const SENDER_KEY: &str = "0101010101010101010101010101010101010101010101010101010101010101";
const RECEIVER_KEY: &str = "0202020202020202020202020202020202020202020202020202020202020202";

fn address_of(key_hex: &str) -> String {
    Keyring::from_hex(key_hex)
        .unwrap()
        .account_id("cosmos")
        .unwrap()
        .to_string()
}

struct TestApp {
    router: Router,
    // Keeps the key directory alive for the duration of the test
    _keys: TempDir,
}

fn create_test_app(connectivity: Connectivity, with_sender_key: bool) -> TestApp {
    let keys = tempfile::tempdir().unwrap();
    if with_sender_key {
        let sealed = seal_private_key(SENDER_KEY, "pw").unwrap();
        std::fs::write(keys.path().join(address_of(SENDER_KEY)), sealed).unwrap();
    }

    let mut config = Config::default();
    config.connectivity = connectivity;
    config.key_dir = keys.path().to_path_buf();

    let state = AppState::new(config).unwrap();
    TestApp {
        router: create_router(state),
        _keys: keys,
    }
}

fn transfer_payload(node_address: &str) -> Value {
    json!({
        "node_address": node_address,
        "from": address_of(SENDER_KEY),
        "to": address_of(RECEIVER_KEY),
        "chain_id": "test-1",
        "passphrase": "pw",
        "amount": 100,
        "gas_limit": 200000,
        "fee_amount": 500,
        "memo": ""
    })
}

async fn post(router: Router, uri: &str, body: &Value) -> (StatusCode, Vec<u8>) {
    let response = router
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_vec(body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn account_path() -> String {
    format!("/cosmos/auth/v1beta1/accounts/{}", address_of(SENDER_KEY))
}

fn account_body() -> String {
    json!({
        "account": {
            "@type": "/cosmos.auth.v1beta1.BaseAccount",
            "address": address_of(SENDER_KEY),
            "pub_key": null,
            "account_number": "42",
            "sequence": "5"
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_transfer_returns_node_hash() {
    let mut node = Server::new_async().await;
    let account = node
        .mock("GET", account_path().as_str())
        .with_status(200)
        .with_body(account_body())
        .expect(1)
        .create_async()
        .await;
    let broadcast = node
        .mock("POST", "/cosmos/tx/v1beta1/txs")
        .match_body(Matcher::PartialJson(json!({"mode": "BROADCAST_MODE_SYNC"})))
        .with_status(200)
        .with_body(r#"{"tx_response":{"height":"0","txhash":"E2E0HASH","code":0,"raw_log":""}}"#)
        .expect(1)
        .create_async()
        .await;

    let app = create_test_app(Connectivity::Rest, true);
    let (status, body) = post(app.router, "/api/make_tx", &transfer_payload(&node.url())).await;

    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(response["tx_hash"], "E2E0HASH");
    account.assert_async().await;
    broadcast.assert_async().await;
}

#[tokio::test]
async fn test_missing_key_names_sender() {
    let mut node = Server::new_async().await;
    let account = node
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let app = create_test_app(Connectivity::Rest, false);
    let (status, body) = post(app.router, "/api/make_tx", &transfer_payload(&node.url())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        format!("don't have private key for {}", address_of(SENDER_KEY))
    );
    account.assert_async().await;
}

#[tokio::test]
async fn test_malformed_amount_makes_no_network_call() {
    let mut node = Server::new_async().await;
    let account = node
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let mut payload = transfer_payload(&node.url());
    payload["amount"] = json!("100");

    let app = create_test_app(Connectivity::Rest, true);
    let (status, body) = post(app.router, "/api/make_tx", &payload).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8(body).unwrap().contains("amount"));
    account.assert_async().await;
}

#[tokio::test]
async fn test_invalid_receiver_is_bad_request() {
    let mut node = Server::new_async().await;
    let account = node
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let mut payload = transfer_payload(&node.url());
    payload["to"] = json!("addr2");

    let app = create_test_app(Connectivity::Rest, true);
    let (status, _) = post(app.router, "/api/make_tx", &payload).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    account.assert_async().await;
}

#[tokio::test]
async fn test_rejected_transaction_is_generic_internal_error() {
    let mut node = Server::new_async().await;
    node.mock("GET", account_path().as_str())
        .with_status(200)
        .with_body(account_body())
        .create_async()
        .await;
    node.mock("POST", "/cosmos/tx/v1beta1/txs")
        .with_status(200)
        .with_body(r#"{"tx_response":{"txhash":"X","code":32,"raw_log":"account sequence mismatch, expected 6, got 5"}}"#)
        .create_async()
        .await;

    let app = create_test_app(Connectivity::Rest, true);
    let (status, body) = post(app.router, "/api/make_tx", &transfer_payload(&node.url())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = String::from_utf8(body).unwrap();
    assert_eq!(body, "something went wrong");
    assert!(!body.contains("sequence"));
}

#[tokio::test]
async fn test_unknown_account_is_internal_error() {
    let mut node = Server::new_async().await;
    node.mock("GET", account_path().as_str())
        .with_status(404)
        .with_body(r#"{"code":5,"message":"not found"}"#)
        .create_async()
        .await;
    let broadcast = node
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let app = create_test_app(Connectivity::Rest, true);
    let (status, _) = post(app.router, "/api/make_tx", &transfer_payload(&node.url())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    broadcast.assert_async().await;
}

#[tokio::test]
async fn test_rpc_connectivity_end_to_end() {
    let base = BaseAccount {
        address: address_of(SENDER_KEY),
        pub_key: None,
        account_number: 42,
        sequence: 5,
    };
    let query = QueryAccountResponse {
        account: Some(cosmrs::Any {
            type_url: "/cosmos.auth.v1beta1.BaseAccount".to_string(),
            value: base.encode_to_vec(),
        }),
    };

    let mut node = Server::new_async().await;
    let account = node
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "abci_query"})))
        .with_status(200)
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"response": {"code": 0, "value": BASE64STD.encode(query.encode_to_vec())}}
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let broadcast = node
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "broadcast_tx_sync"})))
        .with_status(200)
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":{"code":0,"data":"","log":"[]","hash":"RPCHASH"}}"#)
        .expect(1)
        .create_async()
        .await;

    let app = create_test_app(Connectivity::Rpc, true);
    let (status, body) = post(app.router, "/api/make_tx", &transfer_payload(&node.url())).await;

    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(response["tx_hash"], "RPCHASH");
    account.assert_async().await;
    broadcast.assert_async().await;
}

#[tokio::test]
async fn test_json_rpc_command_dispatch() {
    let node = Server::new_async().await;
    let app = create_test_app(Connectivity::Rest, false);

    let (status, body) = post(
        app.router.clone(),
        "/api/rpc",
        &json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "make_tx",
            "params": transfer_payload(&node.url())
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(response["id"], 7);
    assert_eq!(response["error"]["code"], -32001);

    let (_, body) = post(
        app.router.clone(),
        "/api/rpc",
        &json!({"jsonrpc": "2.0", "id": 8, "method": "make_tx", "params": {"node_address": 1}}),
    )
    .await;
    let response: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(response["error"]["code"], -32602);

    let (_, body) = post(
        app.router.clone(),
        "/api/rpc",
        &json!({"jsonrpc": "2.0", "id": 9, "method": "list_commands"}),
    )
    .await;
    let response: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(response["result"][0]["name"], "make_tx");

    let (_, body) = post(
        app.router,
        "/api/rpc",
        &json!({"jsonrpc": "2.0", "id": 10, "method": "drop_tables"}),
    )
    .await;
    let response: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn test_health() {
    let app = create_test_app(Connectivity::Rpc, false);
    let response = app
        .router
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["connectivity"], "rpc");
    assert_eq!(health["denom"], "uatom");
}
