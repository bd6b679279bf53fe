//! Simulation flow: request config → sandbox → one output line.

use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use alpaca_functions::brokerage::alpaca::AlpacaClient;
use alpaca_functions::config::AppConfig;
use alpaca_functions::functions::balance::{BalanceScript, ALPACA_BALANCE_SOURCE};
use alpaca_functions::functions::sandbox::LocalSandbox;
use alpaca_functions::functions::simulator::{alpaca_request_config, emit, run_simulation, ReportLine};
use alpaca_functions::types::{CodeLanguage, Location, RequestConfig, ReturnType, SecretsMap};

use crate::mock_brokerage::MockBrokerage;

fn request(secrets: SecretsMap) -> RequestConfig {
    RequestConfig {
        source: ALPACA_BALANCE_SOURCE.to_string(),
        code_location: Location::Inline,
        secrets,
        secrets_location: Location::DonHosted,
        args: Vec::new(),
        language: CodeLanguage::JavaScript,
        expected_return_type: ReturnType::Uint256,
    }
}

fn credentials() -> SecretsMap {
    SecretsMap::new()
        .with("alpacaKey", "PKTEST")
        .with("alpacaSecret", "shh")
}

#[tokio::test]
async fn test_simulate_against_alpaca_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/account"))
        .and(header("APCA-API-KEY-ID", "PKTEST"))
        .and(header("APCA-API-SECRET-KEY", "shh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "acct-1",
            "currency": "USD",
            "portfolio_value": "1234.5"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = AlpacaClient::new(&server.uri(), 5).unwrap();
    let sandbox = LocalSandbox::new().with_script(Arc::new(BalanceScript::new(Arc::new(client))));
    let config = request(credentials());

    let first = run_simulation(&sandbox, &config).await.unwrap();
    let second = run_simulation(&sandbox, &config).await.unwrap();
    assert_eq!(first, ReportLine::Stdout("Response returned by script: 123450".into()));
    assert_eq!(first, second);

    let mut out = Vec::new();
    let mut err = Vec::new();
    assert_ok!(emit(&first, &mut out, &mut err));
    assert_eq!(String::from_utf8(out).unwrap(), "Response returned by script: 123450\n");
    assert!(err.is_empty());
}

#[tokio::test]
async fn test_simulate_upstream_failure_is_script_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/account"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    let client = AlpacaClient::new(&server.uri(), 5).unwrap();
    let sandbox = LocalSandbox::new().with_script(Arc::new(BalanceScript::new(Arc::new(client))));

    let line = run_simulation(&sandbox, &request(credentials())).await.unwrap();
    match line {
        ReportLine::Stderr(text) => {
            assert!(text.starts_with("Error returned by script: "), "{text}");
            assert!(text.contains("403"), "{text}");
        }
        other => panic!("expected stderr line, got {other:?}"),
    }
}

#[tokio::test]
async fn test_simulate_missing_secret_never_calls_brokerage() {
    let brokerage = Arc::new(MockBrokerage::new(dec!(1234.5)));
    let sandbox = LocalSandbox::new().with_script(Arc::new(BalanceScript::new(brokerage.clone())));

    let secrets = SecretsMap::new().with("alpacaKey", "PKTEST").with("alpacaSecret", "");
    let line = run_simulation(&sandbox, &request(secrets)).await.unwrap();

    assert_eq!(
        line,
        ReportLine::Stderr("Error returned by script: Alpaca API key and secret are required".into())
    );
    assert_eq!(brokerage.calls(), 0);
}

#[tokio::test]
async fn test_simulate_brokerage_error_message_is_reported() {
    let brokerage = Arc::new(MockBrokerage::new(dec!(0)));
    brokerage.set_error("connection reset");
    let sandbox = LocalSandbox::new().with_script(Arc::new(BalanceScript::new(brokerage.clone())));

    let line = run_simulation(&sandbox, &request(credentials())).await.unwrap();
    assert_eq!(line, ReportLine::Stderr("Error returned by script: connection reset".into()));
    assert_eq!(brokerage.calls(), 1);
}

#[tokio::test]
async fn test_simulate_unknown_source_is_call_failure() {
    let sandbox = LocalSandbox::new()
        .with_script(Arc::new(BalanceScript::new(Arc::new(MockBrokerage::new(dec!(1))))));
    let mut config = request(credentials());
    config.source = "return Functions.encodeUint256(1)".into();

    assert_err!(run_simulation(&sandbox, &config).await);
}

#[tokio::test]
async fn test_request_config_from_file_and_env() {
    let source_path = concat!(env!("CARGO_MANIFEST_DIR"), "/functions/sources/alpaca-balance.js");
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[simulation]
source_path = "{source_path}"

[environment]
alpaca_key_env = "ALPACA_FUNCTIONS_IT_SIM_KEY"
alpaca_secret_env = "ALPACA_FUNCTIONS_IT_SIM_SECRET"
"#
        ),
    )
    .unwrap();
    std::env::set_var("ALPACA_FUNCTIONS_IT_SIM_KEY", "PKTEST");
    std::env::set_var("ALPACA_FUNCTIONS_IT_SIM_SECRET", "shh");

    let cfg = AppConfig::load(config_path.to_str().unwrap()).unwrap();
    let config = alpaca_request_config(&cfg).unwrap();

    // The file on disk is the script the sandbox knows.
    assert_eq!(config.source, ALPACA_BALANCE_SOURCE);

    let brokerage = Arc::new(MockBrokerage::new(dec!(1.005)));
    let sandbox = LocalSandbox::new().with_script(Arc::new(BalanceScript::new(brokerage)));
    let line = run_simulation(&sandbox, &config).await.unwrap();
    assert_eq!(line, ReportLine::Stdout("Response returned by script: 101".into()));
}

#[tokio::test]
async fn test_simulate_oversized_balance_is_script_error() {
    let brokerage = Arc::new(MockBrokerage::new(rust_decimal::Decimal::MAX));
    let sandbox = LocalSandbox::new().with_script(Arc::new(BalanceScript::new(brokerage)));

    let line = run_simulation(&sandbox, &request(credentials())).await.unwrap();
    match line {
        ReportLine::Stderr(text) => assert!(text.contains("too large to encode"), "{text}"),
        other => panic!("expected stderr line, got {other:?}"),
    }
}
