//! Local simulation runner.
//!
//! Builds the Alpaca request config, runs it through a `Sandbox` once, and
//! turns the outcome into exactly one line of output: the decoded value on
//! stdout, or the script's error on stderr.

use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use tracing::info;

use super::encoding::decode_result;
use super::sandbox::Sandbox;
use crate::config::AppConfig;
use crate::secrets::alpaca_secrets;
use crate::types::{
    CodeLanguage, FunctionsError, Location, RequestConfig, ReturnType, SimulationOutcome,
};

/// The single line a simulation produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    Stdout(String),
    Stderr(String),
}

/// Build the balance request: source from disk, Alpaca credentials from the
/// environment, DON-hosted secrets, uint256 result by default.
pub fn alpaca_request_config(cfg: &AppConfig) -> Result<RequestConfig> {
    let path = &cfg.simulation.source_path;
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read Functions source: {path}"))?;

    Ok(RequestConfig {
        source,
        code_location: Location::Inline,
        secrets: alpaca_secrets(cfg),
        secrets_location: Location::DonHosted,
        args: Vec::new(),
        language: CodeLanguage::JavaScript,
        expected_return_type: cfg.simulation.expected_return_type,
    })
}

/// Turn a sandbox outcome into its output line. A response that does not
/// decode as `return_type` is an error, not a line.
pub fn render(outcome: &SimulationOutcome, return_type: ReturnType) -> Result<ReportLine, FunctionsError> {
    match outcome {
        SimulationOutcome::Response { bytes_hex } => {
            let value = decode_result(bytes_hex, return_type)?;
            Ok(ReportLine::Stdout(format!("Response returned by script: {value}")))
        }
        SimulationOutcome::Error { message } => {
            Ok(ReportLine::Stderr(format!("Error returned by script: {message}")))
        }
    }
}

/// Run the request once and render the result.
pub async fn run_simulation(sandbox: &dyn Sandbox, config: &RequestConfig) -> Result<ReportLine> {
    let outcome = sandbox
        .simulate(config)
        .await
        .context("Simulation call failed")?;

    let line = render(&outcome, config.expected_return_type)?;
    info!(
        succeeded = matches!(line, ReportLine::Stdout(_)),
        return_type = %config.expected_return_type,
        "Simulation finished"
    );
    Ok(line)
}

/// Write the line to the matching stream.
pub fn emit(line: &ReportLine, out: &mut impl Write, err: &mut impl Write) -> io::Result<()> {
    match line {
        ReportLine::Stdout(text) => writeln!(out, "{text}"),
        ReportLine::Stderr(text) => writeln!(err, "{text}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
