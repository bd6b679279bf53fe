//! Mock JSON-RPC node answering the router and coordinator calls.

use alloy::hex;
use alloy::primitives::{Address, Bytes};
use alloy::sol_types::{SolCall, SolValue};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use alpaca_functions::secrets::contracts::{IFunctionsCoordinator, IFunctionsRouter};

fn coordinator() -> Address {
    Address::repeat_byte(0x42)
}

/// Answers `eth_call` by function selector, echoing the request id.
struct EthCallResponder {
    answers: Vec<(String, String)>,
}

impl Respond for EthCallResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let raw = String::from_utf8_lossy(&request.body);
        let result = self
            .answers
            .iter()
            .find(|(selector, _)| raw.contains(selector.as_str()))
            .map(|(_, result)| result.clone());

        match result {
            Some(result) => ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": body["id"], "result": result
            })),
            None => ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": body["id"],
                "error": { "code": -32601, "message": "method not mocked" }
            })),
        }
    }
}

/// A DON keypair; the public half in the 64-byte on-chain form.
pub fn don_key() -> (SecretKey, Bytes) {
    let secret = SecretKey::random(&mut rand::thread_rng());
    let point = secret.public_key().to_encoded_point(false);
    (secret, Bytes::copy_from_slice(&point.as_bytes()[1..]))
}

/// A threshold public key in the coordinator's JSON form.
pub fn threshold_key() -> Bytes {
    let encode = |secret: p256::SecretKey| {
        BASE64.encode(secret.public_key().to_encoded_point(false).as_bytes())
    };
    let json = serde_json::json!({
        "Group": "P256",
        "G_bar": encode(p256::SecretKey::random(&mut rand::thread_rng())),
        "H": encode(p256::SecretKey::random(&mut rand::thread_rng())),
        "HArray": [],
    });
    Bytes::from(json.to_string().into_bytes())
}

/// Start a node that resolves any DON id to a fixed coordinator and serves
/// both DON keys from it.
pub async fn start_chain(don_public_key: Bytes) -> MockServer {
    let server = MockServer::start().await;
    let answers = vec![
        (
            hex::encode(IFunctionsRouter::getContractByIdCall::SELECTOR),
            hex::encode_prefixed(coordinator().abi_encode()),
        ),
        (
            hex::encode(IFunctionsCoordinator::getDONPublicKeyCall::SELECTOR),
            hex::encode_prefixed(don_public_key.abi_encode()),
        ),
        (
            hex::encode(IFunctionsCoordinator::getThresholdPublicKeyCall::SELECTOR),
            hex::encode_prefixed(threshold_key().abi_encode()),
        ),
    ];
    Mock::given(method("POST"))
        .respond_with(EthCallResponder { answers })
        .mount(&server)
        .await;
    server
}
