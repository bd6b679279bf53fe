//! Signing identity for DON gateway requests.
//!
//! Private keys come only from the environment and are never logged.

use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{anyhow, Context, Result};
use tracing::info;

/// A local private-key signer paired with a read-only RPC provider.
#[derive(Clone)]
pub struct FunctionsSigner {
    signer: PrivateKeySigner,
    provider: DynProvider,
}

impl FunctionsSigner {
    /// Build from a hex private key (with or without `0x`) and an RPC URL.
    pub fn new(private_key_hex: &str, rpc_url: &str) -> Result<Self> {
        let signer = parse_private_key(private_key_hex)?;

        let url: url::Url = rpc_url
            .trim()
            .parse()
            .with_context(|| format!("Invalid RPC URL '{rpc_url}'"))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        info!(address = %signer.address(), "Signer initialized");

        Ok(Self { signer, provider })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }
}

/// Parse a hex private key. The error never echoes the input.
pub fn parse_private_key(private_key_hex: &str) -> Result<PrivateKeySigner> {
    let trimmed = private_key_hex.trim();
    let key_hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if key_hex.is_empty() {
        return Err(anyhow!("Private key is empty"));
    }
    key_hex
        .parse::<PrivateKeySigner>()
        .map_err(|_| anyhow!("Invalid private key format"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
