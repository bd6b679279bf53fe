//! alpaca-functions: Alpaca portfolio balance for Chainlink Functions.
//!
//! Entry point. Loads `.env` and configuration, initialises structured
//! logging on stderr, and dispatches to one of the flows. Results go to
//! stdout; any error that escapes a flow exits with status 1.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use alpaca_functions::brokerage::alpaca::AlpacaClient;
use alpaca_functions::config::AppConfig;
use alpaca_functions::functions::balance::{fetch_encoded_balance, BalanceScript};
use alpaca_functions::functions::sandbox::LocalSandbox;
use alpaca_functions::functions::simulator::{alpaca_request_config, emit, run_simulation};
use alpaca_functions::secrets;
use alpaca_functions::types::ReturnType;

#[derive(Parser)]
#[command(name = "alpaca-functions", version, about = "Alpaca balance oracle tooling for Chainlink Functions")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the portfolio value and print it as an encoded uint256 (cents)
    Balance,
    /// Run the balance request locally and print the decoded response
    Simulate {
        /// Decode the response as this type instead of the configured one
        #[arg(long)]
        return_type: Option<ReturnType>,
    },
    /// Encrypt the Alpaca credentials and upload them to the DON
    UploadSecrets,
    /// List the secrets each DON node stores for this signer
    ListSecrets,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    init_logging();

    let mut cfg = AppConfig::load_or_default(&cli.config)?;

    match cli.command {
        Command::Balance => {
            let client = AlpacaClient::new(&cfg.alpaca.base_url, cfg.alpaca.timeout_secs)?;
            let reading = fetch_encoded_balance(&client, &secrets::alpaca_secrets(&cfg)).await?;
            println!("{}", alloy::hex::encode_prefixed(&reading.encoded));
        }
        Command::Simulate { return_type } => {
            if let Some(return_type) = return_type {
                cfg.simulation.expected_return_type = return_type;
            }
            let client = AlpacaClient::new(&cfg.alpaca.base_url, cfg.alpaca.timeout_secs)?;
            let sandbox = LocalSandbox::new().with_script(Arc::new(BalanceScript::new(Arc::new(client))));
            let request = alpaca_request_config(&cfg)?;
            let line = run_simulation(&sandbox, &request).await?;
            emit(&line, &mut std::io::stdout().lock(), &mut std::io::stderr().lock())?;
        }
        Command::UploadSecrets => {
            let version = secrets::upload_secrets(&cfg).await?;
            println!("Secrets uploaded to DON, version: {version}");
        }
        Command::ListSecrets => {
            for node in secrets::list_secrets(&cfg).await? {
                println!("{node}");
            }
        }
    }

    info!("Done");
    Ok(())
}

/// Initialise tracing on stderr.
///
/// Uses `RUST_LOG` when set, defaulting to `alpaca_functions=info`. Set
/// `FUNCTIONS_LOG_JSON` for JSON output.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("alpaca_functions=info"));

    let json_logging = std::env::var("FUNCTIONS_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
