//! DON gateway client.
//!
//! Gateways accept signed JSON-RPC messages and fan them out to the DON's
//! nodes, returning one response per node. Gateways are tried in order and
//! the first well-formed answer wins; nothing is retried.
//!
//! Message signature: EIP-191 over `message_id(128) || method(64) ||
//! don_id(64) || receiver(42) || payload_json`, each fixed field left-aligned
//! and zero-padded.

use alloy::hex;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use anyhow::{anyhow, Context, Result};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::SecretsRow;

// ---------------------------------------------------------------------------
// Protocol constants
// ---------------------------------------------------------------------------

pub const METHOD_SECRETS_SET: &str = "secrets_set";
pub const METHOD_SECRETS_LIST: &str = "secrets_list";

const MESSAGE_ID_LEN: usize = 128;
const METHOD_LEN: usize = 64;
const DON_ID_LEN: usize = 64;
const RECEIVER_LEN: usize = 42;

const REQUEST_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GatewayRequest<'a, P> {
    id: &'a str,
    jsonrpc: &'static str,
    method: &'a str,
    params: GatewayParams<'a, P>,
}

#[derive(Serialize)]
struct GatewayParams<'a, P> {
    body: MessageBody<'a, P>,
    signature: String,
}

#[derive(Serialize)]
struct MessageBody<'a, P> {
    message_id: &'a str,
    method: &'a str,
    don_id: &'a str,
    receiver: &'a str,
    payload: &'a P,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    result: Option<GatewayResult>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct GatewayResult {
    body: ResponseBody<ResponsePayload>,
}

#[derive(Debug, Deserialize)]
struct ResponseBody<P> {
    payload: P,
}

/// Aggregated answer from the gateway.
#[derive(Debug, Default, Deserialize)]
pub struct ResponsePayload {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub node_responses: Vec<NodeResponse>,
}

#[derive(Debug, Deserialize)]
pub struct NodeResponse {
    body: ResponseBody<NodePayload>,
}

impl NodeResponse {
    pub fn payload(&self) -> &NodePayload {
        &self.body.payload
    }
}

/// One node's answer.
#[derive(Debug, Default, Deserialize)]
pub struct NodePayload {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub rows: Vec<SecretsRow>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Sends signed messages to a DON's gateways.
pub struct GatewayClient {
    http: Client,
    don_id: String,
}

impl GatewayClient {
    pub fn new(don_id: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("alpaca-functions/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for DON gateways")?;

        Ok(Self {
            http,
            don_id: don_id.to_string(),
        })
    }

    /// Sign `payload` and send it to the first gateway that answers.
    pub async fn send<P: Serialize + Sync>(
        &self,
        signer: &PrivateKeySigner,
        gateway_urls: &[String],
        method: &str,
        payload: &P,
    ) -> Result<ResponsePayload> {
        if gateway_urls.is_empty() {
            return Err(anyhow!("No gateway URLs configured"));
        }

        let message_id = rand::thread_rng().gen::<u32>().to_string();
        let payload_json = serde_json::to_string(payload).context("Failed to serialize gateway payload")?;

        let digest_input = signing_input(&message_id, method, &self.don_id, "", &payload_json);
        let signature = signer
            .sign_message(&digest_input)
            .await
            .map_err(|e| anyhow!("Gateway message signing failed: {e}"))?;

        let request = GatewayRequest {
            id: &message_id,
            jsonrpc: "2.0",
            method,
            params: GatewayParams {
                body: MessageBody {
                    message_id: &message_id,
                    method,
                    don_id: &self.don_id,
                    receiver: "",
                    payload,
                },
                signature: hex::encode_prefixed(signature.as_bytes()),
            },
        };

        let mut last_error = None;
        for url in gateway_urls {
            match self.post(url, &request).await {
                Ok(payload) => return Ok(payload),
                Err(e) => {
                    warn!(gateway = %url, method, error = %e, "Gateway request failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("No gateway responded"))
            .context(format!("All {} gateways failed for {method}", gateway_urls.len())))
    }

    async fn post<P: Serialize>(
        &self,
        url: &str,
        request: &GatewayRequest<'_, P>,
    ) -> Result<ResponsePayload> {
        debug!(gateway = %url, method = request.method, message_id = request.id, "Sending gateway message");

        let resp = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .context("Gateway request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Gateway error {status}: {body}");
        }

        let parsed: GatewayResponse = resp
            .json()
            .await
            .context("Failed to parse gateway response")?;

        if let Some(err) = parsed.error {
            anyhow::bail!("Gateway RPC error {}: {}", err.code, err.message);
        }

        parsed
            .result
            .map(|r| r.body.payload)
            .ok_or_else(|| anyhow!("Gateway response has neither result nor error"))
    }
}

/// Bytes the gateway message signature covers.
fn signing_input(message_id: &str, method: &str, don_id: &str, receiver: &str, payload_json: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(MESSAGE_ID_LEN + METHOD_LEN + DON_ID_LEN + RECEIVER_LEN + payload_json.len());
    out.extend_from_slice(&left_aligned(message_id, MESSAGE_ID_LEN));
    out.extend_from_slice(&left_aligned(method, METHOD_LEN));
    out.extend_from_slice(&left_aligned(don_id, DON_ID_LEN));
    out.extend_from_slice(&left_aligned(receiver, RECEIVER_LEN));
    out.extend_from_slice(payload_json.as_bytes());
    out
}

/// Copy into a zero-filled buffer of `len` bytes, truncating overflow.
fn left_aligned(value: &str, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    let raw = value.as_bytes();
    let n = raw.len().min(len);
    buf[..n].copy_from_slice(&raw[..n]);
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
