//! Secrets manager: encrypts secrets for a DON and stores them on its nodes.
//!
//! Lifecycle is strictly linear: `new` → `initialize` (fetch the DON key) →
//! `encrypt_secrets` → `upload_encrypted_secrets_to_don`. Uploading to a
//! slot that already holds secrets overwrites them.

use alloy::hex;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::contracts::{DonKeySource, DonKeys};
use super::{ecies, tdh2};
use super::gateway::{GatewayClient, ResponsePayload, METHOD_SECRETS_LIST, METHOD_SECRETS_SET};
use crate::config::FunctionsSettings;
use crate::types::{
    EncryptedSecrets, EncryptedSecretsBundle, FunctionsError, NodeListing, SecretsMap,
    UploadResult,
};

/// Key of the DON-key-encrypted entry in the secrets envelope.
const DON_KEY_ENTRY: &str = "0x0";

// ---------------------------------------------------------------------------
// Signed payloads
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SignedSecrets<'a> {
    message: &'a str,
    signature: String,
}

/// What the storage signature covers. Field order is part of the format.
#[derive(Serialize)]
struct StorageMessage<'a> {
    address: String,
    slotid: u32,
    payload: &'a str,
    version: u64,
    expiration: i64,
}

#[derive(Serialize)]
struct SecretsSetPayload<'a> {
    slot_id: u32,
    version: u64,
    payload: &'a str,
    expiration: i64,
    signature: String,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Reject an empty mapping or any empty value. Runs before any I/O.
pub fn validate_secrets(secrets: &SecretsMap) -> Result<(), FunctionsError> {
    if secrets.is_empty() {
        return Err(FunctionsError::EmptySecret("<none>".into()));
    }
    for name in secrets.names() {
        let empty = secrets
            .get(name)
            .map(|v| v.expose_secret().is_empty())
            .unwrap_or(true);
        if empty {
            return Err(FunctionsError::EmptySecret(name.to_string()));
        }
    }
    Ok(())
}

/// Turn an upload result into its version, or the provider's error.
pub fn ensure_uploaded(result: &UploadResult) -> Result<u64, FunctionsError> {
    if result.success {
        Ok(result.version)
    } else {
        Err(FunctionsError::UploadFailed(
            result
                .error_message
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

pub struct SecretsManager {
    signer: PrivateKeySigner,
    key_source: Box<dyn DonKeySource>,
    settings: FunctionsSettings,
    gateway: GatewayClient,
    keys: Option<DonKeys>,
}

impl SecretsManager {
    pub fn new(
        signer: PrivateKeySigner,
        key_source: Box<dyn DonKeySource>,
        settings: FunctionsSettings,
    ) -> Result<Self> {
        let gateway = GatewayClient::new(&settings.don_id)?;
        Ok(Self {
            signer,
            key_source,
            settings,
            gateway,
            keys: None,
        })
    }

    /// Fetch the DON and threshold keys. Must succeed before encrypting.
    pub async fn initialize(&mut self) -> Result<()> {
        let keys = self
            .key_source
            .don_keys()
            .await
            .context("Failed to initialize secrets manager")?;
        self.keys = Some(keys);
        info!(
            router = %self.settings.router_address,
            don_id = %self.settings.don_id,
            "Secrets manager initialized"
        );
        Ok(())
    }

    /// Sign the secrets as JSON, encrypt `{message, signature}` to the DON
    /// key inside the `{"0x0": base64}` envelope, then threshold-encrypt the
    /// envelope so only a quorum of nodes can open it.
    pub async fn encrypt_secrets(&self, secrets: &SecretsMap) -> Result<EncryptedSecrets> {
        validate_secrets(secrets)?;
        let keys = self.keys.as_ref().ok_or(FunctionsError::NotInitialized)?;

        let message = secrets
            .to_exposed_json()
            .context("Failed to serialize secrets")?;
        let signature = self
            .signer
            .sign_message(message.as_bytes())
            .await
            .map_err(|e| anyhow!("Secrets signing failed: {e}"))?;
        let signed = serde_json::to_string(&SignedSecrets {
            message: &message,
            signature: hex::encode_prefixed(signature.as_bytes()),
        })
        .context("Failed to serialize signed secrets")?;

        let mut rng = rand::thread_rng();
        let ciphertext = ecies::encrypt(&mut rng, &keys.don_public_key, signed.as_bytes())?;

        let mut envelope = BTreeMap::new();
        envelope.insert(DON_KEY_ENTRY, BASE64.encode(ciphertext));
        let envelope = serde_json::to_string(&envelope).context("Failed to serialize envelope")?;

        let sealed = tdh2::encrypt(&mut rng, &keys.threshold_public_key, envelope.as_bytes())?;

        info!(secrets = secrets.len(), "Secrets encrypted");
        Ok(EncryptedSecrets {
            hex_payload: hex::encode_prefixed(sealed.as_bytes()),
        })
    }

    /// Bundle an encrypted payload with the configured gateways, slot, and
    /// expiration. The version is the current unix time in seconds.
    pub fn bundle(&self, encrypted: EncryptedSecrets) -> Result<EncryptedSecretsBundle> {
        let version = u64::try_from(Utc::now().timestamp()).context("System clock is before 1970")?;
        Ok(EncryptedSecretsBundle {
            hex_payload: encrypted.hex_payload,
            version,
            gateway_urls: self.settings.gateway_urls.clone(),
            slot_id: self.settings.slot_id,
            expiration_minutes: self.settings.expiration_minutes,
        })
    }

    /// Store the bundle on the DON. Success requires every responding node
    /// to report success.
    pub async fn upload_encrypted_secrets_to_don(
        &self,
        bundle: &EncryptedSecretsBundle,
    ) -> Result<UploadResult> {
        let raw = hex::decode(&bundle.hex_payload).context("Encrypted secrets are not valid hex")?;
        let payload_b64 = BASE64.encode(raw);

        let now = Utc::now();
        let version = bundle.version;
        let expiration_ms = i64::try_from(bundle.expiration_minutes)
            .ok()
            .and_then(|m| m.checked_mul(60_000))
            .and_then(|ms| now.timestamp_millis().checked_add(ms))
            .ok_or_else(|| anyhow!("Expiration of {} minutes is out of range", bundle.expiration_minutes))?;

        let storage_message = serde_json::to_string(&StorageMessage {
            address: self.signer.address().to_checksum(None),
            slotid: bundle.slot_id,
            payload: &payload_b64,
            version,
            expiration: expiration_ms,
        })
        .context("Failed to serialize storage message")?;
        let storage_signature = self
            .signer
            .sign_message(storage_message.as_bytes())
            .await
            .map_err(|e| anyhow!("Storage signing failed: {e}"))?;

        let payload = SecretsSetPayload {
            slot_id: bundle.slot_id,
            version,
            payload: &payload_b64,
            expiration: expiration_ms,
            signature: BASE64.encode(storage_signature.as_bytes()),
        };

        info!(
            slot_id = bundle.slot_id,
            version,
            expiration_minutes = bundle.expiration_minutes,
            gateways = bundle.gateway_urls.len(),
            "Uploading encrypted secrets"
        );

        let response = self
            .gateway
            .send(&self.signer, &bundle.gateway_urls, METHOD_SECRETS_SET, &payload)
            .await?;

        Ok(summarize_upload(version, response))
    }

    /// Ask every node what it stores for this signer.
    pub async fn list_don_hosted_secrets(&self, gateway_urls: &[String]) -> Result<Vec<NodeListing>> {
        let response = self
            .gateway
            .send(&self.signer, gateway_urls, METHOD_SECRETS_LIST, &serde_json::Map::new())
            .await?;

        if response.node_responses.is_empty() {
            return Err(anyhow!(
                "Gateway returned no node responses: {}",
                response.error_message.as_deref().unwrap_or("no error message")
            ));
        }

        Ok(response
            .node_responses
            .iter()
            .enumerate()
            .map(|(node_index, node)| {
                let payload = node.payload();
                NodeListing {
                    node_index,
                    success: payload.success,
                    rows: payload.rows.clone(),
                    error_message: payload.error_message.clone(),
                }
            })
            .collect())
    }
}

/// Collapse per-node responses into one result.
fn summarize_upload(version: u64, response: ResponsePayload) -> UploadResult {
    let node_count = response.node_responses.len();

    if node_count == 0 {
        return UploadResult {
            success: false,
            version,
            error_message: Some(
                response
                    .error_message
                    .unwrap_or_else(|| "no node responses".to_string()),
            ),
            node_count,
        };
    }

    let failures: Vec<String> = response
        .node_responses
        .iter()
        .enumerate()
        .filter(|(_, node)| !node.payload().success)
        .map(|(i, node)| {
            format!(
                "node {i}: {}",
                node.payload().error_message.as_deref().unwrap_or("unknown error")
            )
        })
        .collect();

    if failures.is_empty() {
        UploadResult {
            success: true,
            version,
            error_message: None,
            node_count,
        }
    } else {
        warn!(failed = failures.len(), nodes = node_count, "Some DON nodes rejected the upload");
        UploadResult {
            success: false,
            version,
            error_message: Some(failures.join("; ")),
            node_count,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
