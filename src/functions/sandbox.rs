//! Script sandboxes.
//!
//! The `Sandbox` trait is the "simulate" capability: take a request config,
//! run its script once, and report either response bytes or the script's
//! error. `LocalSandbox` runs requests off-chain against native ports of
//! known scripts.

use alloy::hex;
use alloy::primitives::{keccak256, B256};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::FunctionScript;
use crate::types::{FunctionsError, Location, RequestConfig, SimulationOutcome};

/// Executes a Functions request.
///
/// `Ok` carries the script's own outcome (including a thrown error);
/// `Err` means the sandbox itself could not run the request.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn simulate(&self, config: &RequestConfig) -> Result<SimulationOutcome>;
}

/// Runs requests in-process, dispatching on the keccak-256 of the source.
#[derive(Default)]
pub struct LocalSandbox {
    scripts: HashMap<B256, Arc<dyn FunctionScript>>,
}

impl LocalSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native port. A later registration for the same source
    /// replaces the earlier one.
    pub fn register(&mut self, script: Arc<dyn FunctionScript>) -> &mut Self {
        let hash = keccak256(script.source().as_bytes());
        if self.scripts.insert(hash, script).is_some() {
            warn!(source_hash = %hash, "Replaced registered script");
        }
        self
    }

    pub fn with_script(mut self, script: Arc<dyn FunctionScript>) -> Self {
        self.register(script);
        self
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn simulate(&self, config: &RequestConfig) -> Result<SimulationOutcome> {
        if config.code_location != Location::Inline {
            bail!(
                "Local simulation only supports inline source, got {}",
                config.code_location
            );
        }

        let hash = keccak256(config.source.as_bytes());
        let script = self
            .scripts
            .get(&hash)
            .ok_or_else(|| FunctionsError::UnsupportedSource(hash.to_string()))?;

        info!(
            script = script.name(),
            language = ?config.language,
            secrets = config.secrets.len(),
            secrets_location = %config.secrets_location,
            args = config.args.len(),
            "Simulating request"
        );

        let outcome = match script.run(&config.secrets, &config.args).await {
            Ok(bytes) => SimulationOutcome::Response {
                bytes_hex: hex::encode_prefixed(&bytes),
            },
            Err(e) => SimulationOutcome::Error {
                message: format!("{e:#}"),
            },
        };

        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
