#![cfg(not(tarpaulin_include))]

use payslip_signer::app;
use payslip_signer::config::Config;

/// Main entry point for the signing web application
///
/// Configuration comes from the environment (see `Config::from_env`); log
/// verbosity from `RUST_LOG`, `info` by default.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    log::info!(
        "Starting payslip signer for spreadsheet {} (range {})",
        config.spreadsheet_id,
        config.roster_range
    );

    app::run(config).await
}
