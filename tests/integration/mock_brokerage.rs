//! Mock brokerage for integration testing.
//!
//! Provides a deterministic `Brokerage` that returns a fixed portfolio
//! value and counts how often it was asked, all in-memory.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alpaca_functions::brokerage::alpaca::AlpacaCredentials;
use alpaca_functions::brokerage::Brokerage;

pub struct MockBrokerage {
    portfolio_value: Decimal,
    calls: Arc<AtomicUsize>,
    /// If set, every call fails with this message.
    force_error: Mutex<Option<String>>,
}

impl MockBrokerage {
    pub fn new(portfolio_value: Decimal) -> Self {
        Self {
            portfolio_value,
            calls: Arc::new(AtomicUsize::new(0)),
            force_error: Mutex::new(None),
        }
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Brokerage for MockBrokerage {
    async fn portfolio_value(&self, _credentials: &AlpacaCredentials) -> Result<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(anyhow!(msg));
        }
        Ok(self.portfolio_value)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
