//! `ledger-admin` commands
//!
//! Each command runs against a connected [`LedgerApp`] and returns its
//! result as JSON; the binary prints it.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tracing::instrument;

use core_kernel::UserId;
use domain_ledger::reports::DateRange;
use domain_ledger::AccountQuery;

use crate::bootstrap::LedgerApp;
use crate::config::StoreBackend;
use crate::error::AppError;

#[derive(Debug, Parser)]
#[command(name = "ledger-admin", version, about = "Administer and report on the ledger")]
pub struct Cli {
    /// Config file; defaults to ./ledger.toml when present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides the configured store backend
    #[arg(long, global = true, value_enum)]
    pub backend: Option<StoreBackend>,

    /// Acting user recorded on created records
    #[arg(long, global = true, env = "LEDGER_USER_ID")]
    pub user: Option<UserId>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Create the standard chart of accounts, skipping codes already present
    SeedChart,
    /// List accounts by code, or as a tree
    Accounts {
        #[arg(long)]
        tree: bool,
    },
    /// Trial balance as of a date (default today)
    TrialBalance {
        #[arg(long)]
        as_of: Option<NaiveDate>,
        /// Group lines by account type
        #[arg(long)]
        grouped: bool,
    },
    /// Trial balance with abnormal-balance and drift warnings
    ValidateTrialBalance {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Account ledger with running balance (default year to date)
    Ledger {
        code: String,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Opening, activity and closing for every non-header account
    LedgerSummary {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        show_zero: bool,
    },
    /// Profit and loss, optionally against a prior period
    ProfitLoss {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long, requires = "prior_to")]
        prior_from: Option<NaiveDate>,
        #[arg(long, requires = "prior_from")]
        prior_to: Option<NaiveDate>,
        /// Compare with the equally long period just before
        #[arg(long, conflicts_with = "prior_from")]
        compare: bool,
    },
    /// Accounts whose stored balance differs from their posted lines
    Reconcile,
    /// Store health
    Health,
}

/// Runs `command` and returns its JSON output
///
/// # Errors
///
/// Returns the ledger, database or argument error that stopped the command
#[instrument(skip(app))]
pub async fn run(app: &LedgerApp, command: Command, user: UserId) -> Result<Value, AppError> {
    let ledger = app.ledger();
    let output = match command {
        Command::Migrate => {
            app.migrate().await?;
            serde_json::json!({ "migrated": true })
        }
        Command::SeedChart => {
            let created = ledger.accounts().seed_standard_chart(user).await?;
            serde_json::to_value(created)?
        }
        Command::Accounts { tree } => {
            if tree {
                serde_json::to_value(ledger.accounts().account_tree().await?)?
            } else {
                serde_json::to_value(ledger.accounts().list_accounts(AccountQuery::default()).await?)?
            }
        }
        Command::TrialBalance { as_of, grouped } => {
            if grouped {
                serde_json::to_value(ledger.grouped_trial_balance(as_of).await?)?
            } else {
                serde_json::to_value(ledger.trial_balance(as_of).await?)?
            }
        }
        Command::ValidateTrialBalance { as_of } => {
            serde_json::to_value(ledger.validate_trial_balance(as_of).await?)?
        }
        Command::Ledger { code, from, to } => {
            let account = ledger.accounts().find_by_code(&code).await?;
            serde_json::to_value(ledger.account_ledger(account.id, from, to).await?)?
        }
        Command::LedgerSummary { from, to, show_zero } => {
            serde_json::to_value(ledger.ledger_summary(from, to, show_zero).await?)?
        }
        Command::ProfitLoss { from, to, prior_from, prior_to, compare } => {
            let period = DateRange::new(from, to)?;
            let prior = match (prior_from, prior_to) {
                (Some(start), Some(end)) => Some(DateRange::new(start, end)?),
                (None, None) => None,
                _ => {
                    return Err(AppError::invalid_argument(
                        "--prior-from and --prior-to must be given together",
                    ))
                }
            };
            if prior.is_some() || compare {
                serde_json::to_value(ledger.comparative_profit_loss(period, prior).await?)?
            } else {
                serde_json::to_value(ledger.profit_loss(period).await?)?
            }
        }
        Command::Reconcile => serde_json::to_value(ledger.reports().reconcile_balances().await?)?,
        Command::Health => serde_json::to_value(ledger.health_check().await)?,
    };
    Ok(output)
}
