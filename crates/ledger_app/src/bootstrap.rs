//! Store bootstrap
//!
//! Turns an [`AppConfig`] into a ready [`LedgerService`] over the configured
//! backend.

use std::sync::Arc;
use tracing::info;

use domain_ledger::{InMemoryLedgerStore, LedgerService, LedgerStore};
use infra_db::{create_pool, run_migrations, DatabasePool, PostgresLedgerStore};

use crate::config::{AppConfig, StoreBackend};
use crate::error::AppError;

/// A connected ledger and, for the Postgres backend, its pool
#[derive(Clone)]
pub struct LedgerApp {
    ledger: LedgerService,
    pool: Option<DatabasePool>,
}

impl LedgerApp {
    /// Connects the configured backend
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the Postgres pool cannot be created
    pub async fn connect(config: &AppConfig) -> Result<Self, AppError> {
        let policy = config.ledger.policy();
        let (store, pool): (Arc<dyn LedgerStore>, Option<DatabasePool>) = match config.backend {
            StoreBackend::Memory => (Arc::new(InMemoryLedgerStore::new()), None),
            StoreBackend::Postgres => {
                let pool = create_pool(config.database.pool_config()).await?;
                (Arc::new(PostgresLedgerStore::new(pool.clone())), Some(pool))
            }
        };
        info!(backend = ?config.backend, prefix = %policy.entry_number_prefix, "Ledger store ready");
        Ok(Self { ledger: LedgerService::new(store, policy), pool })
    }

    /// Wraps an existing store, e.g. one prepared by a test
    pub fn with_store(store: Arc<dyn LedgerStore>, config: &AppConfig) -> Self {
        Self { ledger: LedgerService::new(store, config.ledger.policy()), pool: None }
    }

    pub fn ledger(&self) -> &LedgerService {
        &self.ledger
    }

    /// Applies pending schema migrations
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArgument` on the memory backend, which has
    /// no schema
    pub async fn migrate(&self) -> Result<(), AppError> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| AppError::invalid_argument("migrate requires the postgres backend"))?;
        run_migrations(pool).await?;
        Ok(())
    }
}
