//! Native port of the Alpaca balance script.
//!
//! Validates the two credentials, makes one account request, and encodes
//! the portfolio value in cents as a uint256. Nothing is retried: a failed
//! request fails the script.

use alloy::hex;
use alloy::primitives::{Bytes, U256};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use super::encoding::{encode_uint256, to_cents};
use super::FunctionScript;
use crate::brokerage::alpaca::AlpacaCredentials;
use crate::brokerage::Brokerage;
use crate::types::SecretsMap;

/// Script text submitted to the DON for this request.
pub const ALPACA_BALANCE_SOURCE: &str = include_str!("../../functions/sources/alpaca-balance.js");

/// One balance reading, before and after encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceReading {
    pub portfolio_value: Decimal,
    pub cents: U256,
    pub encoded: Bytes,
}

/// Fetch and encode the portfolio value.
///
/// Credentials are validated first; when either is empty this returns
/// `FunctionsError::MissingCredentials` without touching the brokerage.
pub async fn fetch_encoded_balance(
    brokerage: &dyn Brokerage,
    secrets: &SecretsMap,
) -> Result<BalanceReading> {
    let credentials = AlpacaCredentials::from_secrets(secrets)?;

    let portfolio_value = brokerage.portfolio_value(&credentials).await?;
    let cents = to_cents(portfolio_value)?;
    let encoded = encode_uint256(cents);

    info!(
        brokerage = brokerage.name(),
        portfolio_value = %portfolio_value,
        cents = %cents,
        encoded = %hex::encode_prefixed(&encoded),
        "Portfolio balance fetched"
    );

    Ok(BalanceReading {
        portfolio_value,
        cents,
        encoded,
    })
}

/// The balance script as a `FunctionScript`.
pub struct BalanceScript {
    brokerage: Arc<dyn Brokerage>,
}

impl BalanceScript {
    pub fn new(brokerage: Arc<dyn Brokerage>) -> Self {
        Self { brokerage }
    }
}

#[async_trait]
impl FunctionScript for BalanceScript {
    fn name(&self) -> &str {
        "alpaca-balance"
    }

    fn source(&self) -> &str {
        ALPACA_BALANCE_SOURCE
    }

    async fn run(&self, secrets: &SecretsMap, _args: &[String]) -> Result<Bytes> {
        let reading = fetch_encoded_balance(self.brokerage.as_ref(), secrets).await?;
        Ok(reading.encoded)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
