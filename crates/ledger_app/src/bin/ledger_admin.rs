//! Ledger administration CLI
//!
//! # Usage
//!
//! ```bash
//! # Create the schema and seed the standard chart
//! LEDGER_BACKEND=postgres LEDGER_DATABASE__URL=postgres://... ledger-admin migrate
//! ledger-admin --backend postgres seed-chart
//!
//! # Reports
//! ledger-admin --backend postgres trial-balance --as-of 2024-06-30
//! ledger-admin --backend postgres profit-loss --from 2024-04-01 --to 2024-06-30 --compare
//! ```
//!
//! Output is pretty-printed JSON on stdout; failures print an error body on
//! stderr and exit non-zero.

use clap::Parser;

use core_kernel::UserId;
use ledger_app::cli::{self, Cli};
use ledger_app::config::AppConfig;
use ledger_app::telemetry::init_tracing;
use ledger_app::LedgerApp;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Cli::parse();
    let config = AppConfig::load(args.config.as_deref())?.with_backend(args.backend);
    init_tracing(&config.log_level, config.log_format);

    let user = args.user.unwrap_or_else(UserId::new_v7);
    let result = async {
        let app = LedgerApp::connect(&config).await?;
        cli::run(&app, args.command, user).await
    }
    .await;

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => {
            eprintln!("{}", serde_json::to_string_pretty(&err.response())?);
            Err(err.into())
        }
    }
}
