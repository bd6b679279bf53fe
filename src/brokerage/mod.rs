//! Brokerage integrations.
//!
//! Defines the `Brokerage` trait used by the balance script and provides the
//! Alpaca implementation.

pub mod alpaca;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use alpaca::AlpacaCredentials;

/// Read access to a brokerage account.
///
/// Implementors issue exactly one request per call and never retry; any
/// transport or status failure is returned to the caller as-is.
#[async_trait]
pub trait Brokerage: Send + Sync {
    /// Current total portfolio value in account currency.
    async fn portfolio_value(&self, credentials: &AlpacaCredentials) -> Result<Decimal>;

    /// Brokerage name for logging.
    fn name(&self) -> &str;
}
