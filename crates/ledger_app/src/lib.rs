//! Ledger application layer
//!
//! Everything around the domain that a running process needs:
//!
//! - **Config**: layered settings from defaults, `ledger.toml` and `LEDGER_*`
//!   environment variables
//! - **Telemetry**: `tracing` subscriber setup
//! - **Bootstrap**: choosing and connecting the store backend
//! - **Error Handling**: one serialisable error body for every failure
//! - **CLI**: the `ledger-admin` commands
//!
//! # Example
//!
//! ```rust,ignore
//! use ledger_app::{bootstrap::LedgerApp, config::AppConfig};
//!
//! let config = AppConfig::load(None)?;
//! let app = LedgerApp::connect(&config).await?;
//! let trial = app.ledger().trial_balance(None).await?;
//! ```

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod telemetry;

pub use bootstrap::LedgerApp;
pub use config::{AppConfig, LogFormat, StoreBackend};
pub use error::{AppError, ErrorResponse};
