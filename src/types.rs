//! Core domain types shared across the balance, simulation, and upload flows.
//!
//! Request configuration, simulation outcomes, upload results, and the
//! domain error enum. Secret values are held as `SecretString` so they never
//! show up in `Debug` output or logs.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Request configuration enums
// ---------------------------------------------------------------------------

/// Where code or secrets live for a Functions request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    Inline,
    Remote,
    #[serde(rename = "DONHosted")]
    DonHosted,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Inline => write!(f, "Inline"),
            Location::Remote => write!(f, "Remote"),
            Location::DonHosted => write!(f, "DONHosted"),
        }
    }
}

/// Source language of the sandboxed script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeLanguage {
    JavaScript,
}

/// ABI type the consumer contract expects the script to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    Uint256,
    Int256,
    String,
    Bytes,
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::Uint256 => write!(f, "uint256"),
            ReturnType::Int256 => write!(f, "int256"),
            ReturnType::String => write!(f, "string"),
            ReturnType::Bytes => write!(f, "bytes"),
        }
    }
}

impl FromStr for ReturnType {
    type Err = FunctionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uint256" => Ok(ReturnType::Uint256),
            "int256" => Ok(ReturnType::Int256),
            "string" => Ok(ReturnType::String),
            "bytes" => Ok(ReturnType::Bytes),
            other => Err(FunctionsError::Config(format!("unknown return type: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// Named secret values handed to a script or encrypted for the DON.
///
/// Ordered by name so the serialized form is stable.
#[derive(Debug, Default)]
pub struct SecretsMap(BTreeMap<String, SecretString>);

impl SecretsMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: SecretString) {
        self.0.insert(name.into(), value);
    }

    /// Builder-style insert from a plain string.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, SecretString::new(value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&SecretString> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Serialize to a JSON object with the secret values exposed.
    /// Only the encryption path should call this.
    pub fn to_exposed_json(&self) -> serde_json::Result<String> {
        let exposed: BTreeMap<&str, &str> = self
            .0
            .iter()
            .map(|(k, v)| (k.as_str(), v.expose_secret().as_str()))
            .collect();
        serde_json::to_string(&exposed)
    }
}

// ---------------------------------------------------------------------------
// Request config
// ---------------------------------------------------------------------------

/// A Functions request as the DON (or the local sandbox) receives it.
///
/// Built once per invocation and never mutated afterwards.
#[derive(Debug)]
pub struct RequestConfig {
    pub source: String,
    pub code_location: Location,
    pub secrets: SecretsMap,
    pub secrets_location: Location,
    pub args: Vec<String>,
    pub language: CodeLanguage,
    pub expected_return_type: ReturnType,
}

// ---------------------------------------------------------------------------
// Simulation outcome
// ---------------------------------------------------------------------------

/// Result of running a script in a sandbox: either response bytes or the
/// error string the script raised. Never both, never neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationOutcome {
    /// `0x`-prefixed hex of the returned bytes.
    Response { bytes_hex: String },
    Error { message: String },
}

// ---------------------------------------------------------------------------
// Upload types
// ---------------------------------------------------------------------------

/// Hex-encoded encrypted secrets, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedSecrets {
    pub hex_payload: String,
}

/// Everything needed to place an encrypted payload on the DON.
#[derive(Debug, Clone)]
pub struct EncryptedSecretsBundle {
    pub hex_payload: String,
    /// Unix seconds at bundling time; the DON keeps the highest per slot.
    pub version: u64,
    pub gateway_urls: Vec<String>,
    pub slot_id: u32,
    pub expiration_minutes: u64,
}

/// What the DON gateway reported for an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub success: bool,
    pub version: u64,
    pub error_message: Option<String>,
    pub node_count: usize,
}

/// One stored secrets entry as reported by a DON node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretsRow {
    pub slot_id: u32,
    pub version: u64,
    pub expiration: i64,
}

/// Secrets stored on one DON node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeListing {
    pub node_index: usize,
    pub success: bool,
    pub rows: Vec<SecretsRow>,
    pub error_message: Option<String>,
}

/// One line per stored row, or a single line for an empty or failed node.
impl fmt::Display for NodeListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.success {
            return write!(
                f,
                "node {}: error: {}",
                self.node_index,
                self.error_message.as_deref().unwrap_or("unknown error")
            );
        }
        if self.rows.is_empty() {
            return write!(f, "node {}: no secrets", self.node_index);
        }
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "node {}: slot {} version {} expires {}",
                self.node_index, row.slot_id, row.version, row.expiration
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum FunctionsError {
    #[error("Alpaca API key and secret are required")]
    MissingCredentials,

    #[error("Secret '{0}' is empty")]
    EmptySecret(String),

    #[error("Invalid address '{value}': {reason}")]
    InvalidAddress { value: String, reason: String },

    #[error("Invalid DON id '{0}': must be at most 31 bytes")]
    InvalidDonId(String),

    #[error("Portfolio value {0} is negative and cannot be encoded as uint256")]
    NegativeBalance(rust_decimal::Decimal),

    #[error("Portfolio value {0} is too large to encode in cents")]
    BalanceOutOfRange(rust_decimal::Decimal),

    #[error("Failed to decode {return_type} result: {message}")]
    Decode { return_type: ReturnType, message: String },

    #[error("No local runtime for this source (keccak {0})")]
    UnsupportedSource(String),

    #[error("Secrets manager is not initialized; call initialize() first")]
    NotInitialized,

    #[error("Failed to upload secrets: {0}")]
    UploadFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
