//! Secret upload flow against a mocked chain and DON gateway.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::collections::BTreeSet;
use tokio_test::assert_err;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use alpaca_functions::config::AppConfig;
use alpaca_functions::secrets::{list_secrets, upload_secrets};

use crate::mock_chain::{don_key, start_chain};

const TEST_PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Config whose secrets come from env vars unique to `tag`.
fn config(tag: &str, rpc_url: &str, gateway_url: &str, alpaca_secret: &str) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.functions.gateway_urls = vec![gateway_url.to_string()];

    let env = |name: &str| format!("ALPACA_FUNCTIONS_IT_{tag}_{name}");
    cfg.environment.alpaca_key_env = env("KEY");
    cfg.environment.alpaca_secret_env = env("SECRET");
    cfg.environment.private_key_env = env("PRIVATE_KEY");
    cfg.environment.rpc_url_env = env("RPC");

    std::env::set_var(env("KEY"), "PKTEST");
    std::env::set_var(env("SECRET"), alpaca_secret);
    std::env::set_var(env("PRIVATE_KEY"), TEST_PRIVATE_KEY);
    std::env::set_var(env("RPC"), rpc_url);
    cfg
}

fn gateway_reply(nodes: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "id": "1", "jsonrpc": "2.0",
        "result": { "body": { "payload": { "success": true, "node_responses": nodes } } }
    }))
}

#[tokio::test]
async fn test_upload_secrets_reports_version() {
    let (_, public) = don_key();
    let chain = start_chain(public).await;

    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "method": "secrets_set",
            "params": { "body": { "don_id": "fun-ethereum-sepolia-1", "payload": { "slot_id": 0 } } }
        })))
        .respond_with(gateway_reply(serde_json::json!([
            { "body": { "payload": { "success": true } } },
            { "body": { "payload": { "success": true } } }
        ])))
        .expect(2)
        .mount(&gateway)
        .await;

    let cfg = config("OK", &chain.uri(), &gateway.uri(), "shh");
    let before = chrono::Utc::now().timestamp() as u64;

    let first = upload_secrets(&cfg).await.unwrap();
    let second = upload_secrets(&cfg).await.unwrap();
    assert!(first >= before);
    assert!(second >= first);

    // Both uploads went to slot 0.
    let slots: BTreeSet<u64> = gateway
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["params"]["body"]["payload"]["slot_id"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(slots, BTreeSet::from([0]));
}

#[tokio::test]
async fn test_uploaded_payload_is_threshold_ciphertext() {
    let (_, public) = don_key();
    let chain = start_chain(public).await;

    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(gateway_reply(serde_json::json!([
            { "body": { "payload": { "success": true } } }
        ])))
        .expect(1)
        .mount(&gateway)
        .await;

    let cfg = config("TDH2", &chain.uri(), &gateway.uri(), "shh");
    upload_secrets(&cfg).await.unwrap();

    let requests = gateway.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let payload = body["params"]["body"]["payload"]["payload"].as_str().unwrap();
    let sealed: serde_json::Value = serde_json::from_slice(&BASE64.decode(payload).unwrap()).unwrap();

    let keys: BTreeSet<&str> = sealed.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, BTreeSet::from(["Nonce", "SymCtxt", "TDH2Ctxt"]));
    assert_eq!(BASE64.decode(sealed["Nonce"].as_str().unwrap()).unwrap().len(), 12);
}

#[tokio::test]
async fn test_upload_rejected_by_node_fails_with_message() {
    let (_, public) = don_key();
    let chain = start_chain(public).await;

    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(gateway_reply(serde_json::json!([
            { "body": { "payload": { "success": false, "error_message": "expiration in the past" } } }
        ])))
        .mount(&gateway)
        .await;

    let cfg = config("REJECT", &chain.uri(), &gateway.uri(), "shh");
    let err = upload_secrets(&cfg).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to upload secrets: node 0: expiration in the past"
    );
}

#[tokio::test]
async fn test_upload_empty_secret_fails_before_network() {
    let chain = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&chain)
        .await;
    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&gateway)
        .await;

    let cfg = config("EMPTY", &chain.uri(), &gateway.uri(), "");
    let err = upload_secrets(&cfg).await.unwrap_err();
    assert_eq!(err.to_string(), "Secret 'alpacaSecret' is empty");
}

#[tokio::test]
async fn test_upload_without_private_key_fails() {
    let mut cfg = config("NOKEY", "http://127.0.0.1:1", "http://127.0.0.1:1", "shh");
    cfg.environment.private_key_env = "ALPACA_FUNCTIONS_IT_NOKEY_UNSET".into();
    assert_err!(upload_secrets(&cfg).await);
}

#[tokio::test]
async fn test_list_secrets_per_node() {
    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({ "method": "secrets_list" })))
        .respond_with(gateway_reply(serde_json::json!([
            { "body": { "payload": { "success": true, "rows": [
                { "slot_id": 0, "version": 1760000000u64, "expiration": 1760086400000i64 }
            ] } } },
            { "body": { "payload": { "success": true, "rows": [] } } }
        ])))
        .expect(1)
        .mount(&gateway)
        .await;

    let cfg = config("LIST", "http://127.0.0.1:1", &gateway.uri(), "shh");
    let listing = list_secrets(&cfg).await.unwrap();
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0].rows[0].slot_id, 0);
    assert!(listing[1].rows.is_empty());
}
