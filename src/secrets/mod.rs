//! DON-hosted secrets: encrypt the Alpaca credentials and store them on the
//! DON so requests can reference them by slot and version.

pub mod contracts;
pub mod ecies;
pub mod gateway;
pub mod manager;
pub mod signer;
pub mod tdh2;

use anyhow::Result;
use tracing::info;

use crate::brokerage::alpaca::{KEY_SECRET_NAME, SECRET_SECRET_NAME};
use crate::config::AppConfig;
use crate::types::{NodeListing, SecretsMap};
use contracts::OnChainKeySource;
use manager::{ensure_uploaded, validate_secrets, SecretsManager};
use signer::FunctionsSigner;

/// Collect the Alpaca credentials from the environment.
pub fn alpaca_secrets(cfg: &AppConfig) -> SecretsMap {
    let mut secrets = SecretsMap::new();
    secrets.insert(
        KEY_SECRET_NAME,
        AppConfig::resolve_secret_or_empty(&cfg.environment.alpaca_key_env),
    );
    secrets.insert(
        SECRET_SECRET_NAME,
        AppConfig::resolve_secret_or_empty(&cfg.environment.alpaca_secret_env),
    );
    secrets
}

fn build_manager(cfg: &AppConfig) -> Result<SecretsManager> {
    let private_key = AppConfig::resolve_env(&cfg.environment.private_key_env)?;
    let rpc_url = AppConfig::resolve_env(&cfg.environment.rpc_url_env)?;
    let signer = FunctionsSigner::new(&private_key, &rpc_url)?;

    let key_source = OnChainKeySource::new(
        signer.provider().clone(),
        cfg.functions.router_address,
        &cfg.functions.don_id,
    )?;

    SecretsManager::new(
        signer.signer().clone(),
        Box::new(key_source),
        cfg.functions.clone(),
    )
}

/// Encrypt the Alpaca credentials and upload them to the configured slot.
/// Returns the stored version.
///
/// Secrets are checked before any key, RPC, or gateway work happens.
pub async fn upload_secrets(cfg: &AppConfig) -> Result<u64> {
    let secrets = alpaca_secrets(cfg);
    validate_secrets(&secrets)?;

    let mut manager = build_manager(cfg)?;
    manager.initialize().await?;

    let encrypted = manager.encrypt_secrets(&secrets).await?;
    let bundle = manager.bundle(encrypted)?;
    let result = manager.upload_encrypted_secrets_to_don(&bundle).await?;
    let version = ensure_uploaded(&result)?;

    info!(
        slot_id = bundle.slot_id,
        version,
        nodes = result.node_count,
        "Secrets uploaded to DON"
    );
    Ok(version)
}

/// List what each DON node stores for the configured signer.
pub async fn list_secrets(cfg: &AppConfig) -> Result<Vec<NodeListing>> {
    let manager = build_manager(cfg)?;
    manager
        .list_don_hosted_secrets(&cfg.functions.gateway_urls)
        .await
}
