//! Chainlink Functions request handling.
//!
//! Defines the `FunctionScript` trait for native ports of sandboxed scripts,
//! plus result encoding, the local sandbox, and the simulation runner.

pub mod balance;
pub mod encoding;
pub mod sandbox;
pub mod simulator;

use alloy::primitives::Bytes;
use anyhow::Result;
use async_trait::async_trait;

use crate::types::SecretsMap;

/// A native port of a script the DON executes.
///
/// `source()` is the exact script text submitted on-chain; the local sandbox
/// matches requests to ports by hashing it.
#[async_trait]
pub trait FunctionScript: Send + Sync {
    /// Script name for logging.
    fn name(&self) -> &str;

    /// The script text this port stands in for.
    fn source(&self) -> &str;

    /// Run once with the request's secrets and args, returning the ABI
    /// encoded response bytes. An error here is the script "throwing".
    async fn run(&self, secrets: &SecretsMap, args: &[String]) -> Result<Bytes>;
}
