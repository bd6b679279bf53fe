//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! field has a default matching the Sepolia deployment and Alpaca paper
//! trading, so a missing file or section still yields a usable config.
//! Secrets are referenced by env-var name and resolved at runtime.

use alloy::primitives::{address, Address};
use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

use crate::types::{FunctionsError, ReturnType};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const SEPOLIA_ROUTER_ADDRESS: Address = address!("0xb83E47C2bC239B3bf370bc41e1459A34b41238D0");
const SEPOLIA_DON_ID: &str = "fun-ethereum-sepolia-1";
const SEPOLIA_GATEWAY_URLS: [&str; 2] = [
    "https://01.functions-gateway.testnet.chain.link/",
    "https://02.functions-gateway.testnet.chain.link/",
];

/// Slot the uploader writes to. Re-uploading overwrites it.
pub const DEFAULT_SLOT_ID: u32 = 0;
/// One day.
pub const DEFAULT_EXPIRATION_MINUTES: u64 = 1440;

const ALPACA_PAPER_URL: &str = "https://paper-api.alpaca.markets";
const DEFAULT_SOURCE_PATH: &str = "functions/sources/alpaca-balance.js";

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub functions: FunctionsSettings,
    pub alpaca: AlpacaConfig,
    pub simulation: SimulationConfig,
    pub environment: EnvironmentConfig,
}

/// On-chain and gateway identifiers for the target DON.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FunctionsSettings {
    /// Functions router contract. Must be a 0x-prefixed 20-byte hex string;
    /// mixed-case input must carry a valid EIP-55 checksum.
    #[serde(deserialize_with = "deserialize_address")]
    pub router_address: Address,
    pub don_id: String,
    pub gateway_urls: Vec<String>,
    pub slot_id: u32,
    pub expiration_minutes: u64,
}

impl Default for FunctionsSettings {
    fn default() -> Self {
        Self {
            router_address: SEPOLIA_ROUTER_ADDRESS,
            don_id: SEPOLIA_DON_ID.to_string(),
            gateway_urls: SEPOLIA_GATEWAY_URLS.iter().map(|u| u.to_string()).collect(),
            slot_id: DEFAULT_SLOT_ID,
            expiration_minutes: DEFAULT_EXPIRATION_MINUTES,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlpacaConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        Self {
            base_url: ALPACA_PAPER_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulationConfig {
    /// Path to the script submitted to the DON.
    pub source_path: String,
    pub expected_return_type: ReturnType,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            source_path: DEFAULT_SOURCE_PATH.to_string(),
            expected_return_type: ReturnType::Uint256,
        }
    }
}

/// Names of the environment variables holding secrets.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub alpaca_key_env: String,
    pub alpaca_secret_env: String,
    pub private_key_env: String,
    pub rpc_url_env: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            alpaca_key_env: "ALPACA_API_KEY".to_string(),
            alpaca_secret_env: "ALPACA_API_SECRET".to_string(),
            private_key_env: "PRIVATE_KEY".to_string(),
            rpc_url_env: "SEPOLIA_RPC_URL".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to built-in defaults.
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            warn!(path, "Config file not found, using Sepolia defaults");
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if self.functions.gateway_urls.is_empty() {
            return Err(FunctionsError::Config("functions.gateway_urls must not be empty".into()).into());
        }
        for url in &self.functions.gateway_urls {
            url::Url::parse(url)
                .map_err(|e| FunctionsError::Config(format!("invalid gateway URL '{url}': {e}")))?;
        }
        if self.functions.don_id.len() > 31 {
            return Err(FunctionsError::InvalidDonId(self.functions.don_id.clone()).into());
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Resolve a secret, treating an unset variable as an empty value.
    ///
    /// Empty secrets are rejected later by credential validation, before any
    /// request is made.
    pub fn resolve_secret_or_empty(env_name: &str) -> SecretString {
        match std::env::var(env_name) {
            Ok(value) => SecretString::new(value),
            Err(_) => {
                warn!(env = env_name, "Secret environment variable not set");
                SecretString::new(String::new())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Address validation
// ---------------------------------------------------------------------------

/// Parse a 0x-prefixed 20-byte address. All-lowercase and all-uppercase
/// hex are accepted as-is; mixed case must match the EIP-55 checksum.
pub fn parse_address(value: &str) -> Result<Address, FunctionsError> {
    let invalid = |reason: &str| FunctionsError::InvalidAddress {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let hex = value.strip_prefix("0x").ok_or_else(|| invalid("missing 0x prefix"))?;
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid("expected 40 hex characters"));
    }

    let address = Address::from_str(value).map_err(|e| invalid(&e.to_string()))?;

    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    if has_upper && has_lower && address.to_checksum(None) != value {
        return Err(invalid("EIP-55 checksum mismatch"));
    }

    Ok(address)
}

fn deserialize_address<'de, D>(deserializer: D) -> std::result::Result<Address, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_address(&raw).map_err(serde::de::Error::custom)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
