//! Alpaca brokerage account integration.
//!
//! Reads the account summary to get the current portfolio value.
//!
//! API docs: https://docs.alpaca.markets/reference/getaccount-1
//! Base URL (paper): https://paper-api.alpaca.markets
//! Auth: `APCA-API-KEY-ID` and `APCA-API-SECRET-KEY` headers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::Brokerage;
use crate::types::{FunctionsError, SecretsMap};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BROKERAGE_NAME: &str = "alpaca";
const ACCOUNT_PATH: &str = "/v2/account";

pub const KEY_ID_HEADER: &str = "APCA-API-KEY-ID";
pub const SECRET_KEY_HEADER: &str = "APCA-API-SECRET-KEY";

/// Secret names the balance script reads.
pub const KEY_SECRET_NAME: &str = "alpacaKey";
pub const SECRET_SECRET_NAME: &str = "alpacaSecret";

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Validated Alpaca API credentials. Both parts are guaranteed non-empty.
#[derive(Debug)]
pub struct AlpacaCredentials {
    key_id: SecretString,
    secret_key: SecretString,
}

impl AlpacaCredentials {
    pub fn new(key_id: SecretString, secret_key: SecretString) -> Result<Self, FunctionsError> {
        if key_id.expose_secret().is_empty() || secret_key.expose_secret().is_empty() {
            return Err(FunctionsError::MissingCredentials);
        }
        Ok(Self { key_id, secret_key })
    }

    /// Pull `alpacaKey` / `alpacaSecret` out of a script's secrets.
    /// A missing entry is treated the same as an empty one.
    pub fn from_secrets(secrets: &SecretsMap) -> Result<Self, FunctionsError> {
        let key_id = secrets
            .get(KEY_SECRET_NAME)
            .ok_or(FunctionsError::MissingCredentials)?;
        let secret_key = secrets
            .get(SECRET_SECRET_NAME)
            .ok_or(FunctionsError::MissingCredentials)?;
        Self::new(
            SecretString::new(key_id.expose_secret().clone()),
            SecretString::new(secret_key.expose_secret().clone()),
        )
    }
}

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// Subset of the `/v2/account` response. Alpaca sends `portfolio_value`
/// as a JSON string; numbers are accepted as well.
#[derive(Debug, Deserialize)]
struct AlpacaAccount {
    portfolio_value: Decimal,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// The sandbox HTTP helper nests the body under `data`; a direct call
/// returns it bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccountBody {
    Wrapped { data: AlpacaAccount },
    Bare(AlpacaAccount),
}

impl AccountBody {
    fn into_account(self) -> AlpacaAccount {
        match self {
            AccountBody::Wrapped { data } => data,
            AccountBody::Bare(account) => account,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Alpaca trading API client.
pub struct AlpacaClient {
    http: Client,
    base_url: String,
}

impl AlpacaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("alpaca-functions/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for Alpaca")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Brokerage for AlpacaClient {
    async fn portfolio_value(&self, credentials: &AlpacaCredentials) -> Result<Decimal> {
        let url = format!("{}{ACCOUNT_PATH}", self.base_url);
        debug!(url = %url, "Fetching Alpaca account");

        let resp = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(KEY_ID_HEADER, credentials.key_id.expose_secret().as_str())
            .header(SECRET_KEY_HEADER, credentials.secret_key.expose_secret().as_str())
            .send()
            .await
            .context("Alpaca account request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Alpaca API error {status}: {body}");
        }

        let account = resp
            .json::<AccountBody>()
            .await
            .context("Failed to parse Alpaca account response")?
            .into_account();

        debug!(
            currency = account.currency.as_deref().unwrap_or("?"),
            status = account.status.as_deref().unwrap_or("?"),
            "Alpaca account fetched"
        );

        Ok(account.portfolio_value)
    }

    fn name(&self) -> &str {
        BROKERAGE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
