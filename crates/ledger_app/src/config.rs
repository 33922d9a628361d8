//! Application configuration
//!
//! Sources, later ones winning: built-in defaults, an optional config file
//! (`ledger.toml` in the working directory unless a path is given), then
//! environment variables prefixed `LEDGER_` with `__` between nested keys,
//! e.g. `LEDGER_DATABASE__URL` or `LEDGER_LEDGER__ENTRY_NUMBER_PREFIX`.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use domain_ledger::LedgerPolicy;
use infra_db::DatabaseConfig;

/// Default config file name, looked up without extension
const DEFAULT_CONFIG_FILE: &str = "ledger";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store, emptied on exit
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/ledger".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}

impl DatabaseSettings {
    pub fn pool_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.url.clone())
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
    }
}

/// Bookkeeping rules, see [`LedgerPolicy`]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub balance_tolerance: Decimal,
    pub allow_reversal_of_reversal: bool,
    pub entry_number_prefix: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        let policy = LedgerPolicy::default();
        Self {
            balance_tolerance: policy.balance_tolerance,
            allow_reversal_of_reversal: policy.allow_reversal_of_reversal,
            entry_number_prefix: policy.entry_number_prefix,
        }
    }
}

impl LedgerSettings {
    pub fn policy(&self) -> LedgerPolicy {
        LedgerPolicy::default()
            .with_balance_tolerance(self.balance_tolerance)
            .allowing_reversal_of_reversal(self.allow_reversal_of_reversal)
            .with_entry_number_prefix(self.entry_number_prefix.clone())
    }
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `EnvFilter` directive, e.g. `info` or `domain_ledger=debug`
    pub log_level: String,
    pub log_format: LogFormat,
    pub backend: StoreBackend,
    pub database: DatabaseSettings,
    pub ledger: LedgerSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            backend: StoreBackend::default(),
            database: DatabaseSettings::default(),
            ledger: LedgerSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from the file at `path` (required when given)
    /// or `ledger.toml` (optional), then the environment
    ///
    /// # Errors
    ///
    /// Returns `config::ConfigError` if a source cannot be read or a value
    /// has the wrong type
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        Self::from_builder(config::Config::builder().add_source(file))
    }

    /// Parses TOML text, then applies the environment
    pub fn from_toml(text: &str) -> Result<Self, config::ConfigError> {
        Self::from_builder(
            config::Config::builder()
                .add_source(config::File::from_str(text, config::FileFormat::Toml)),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, config::ConfigError> {
        builder
            .add_source(
                config::Environment::with_prefix("LEDGER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Overrides the backend, e.g. from a command-line flag
    pub fn with_backend(mut self, backend: Option<StoreBackend>) -> Self {
        if let Some(backend) = backend {
            self.backend = backend;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.ledger.entry_number_prefix, "JE");
        assert!(config.ledger.balance_tolerance.is_zero());
    }

    #[test]
    fn test_toml_overrides_nested_keys() {
        let config = AppConfig::from_toml(
            r#"
            backend = "postgres"
            log_format = "json"

            [database]
            url = "postgres://ledger@db/books"
            max_connections = 4

            [ledger]
            balance_tolerance = "0.01"
            allow_reversal_of_reversal = true
            entry_number_prefix = "GL"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, StoreBackend::Postgres);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.database.min_connections, 1);

        let policy = config.ledger.policy();
        assert_eq!(policy.balance_tolerance, dec!(0.01));
        assert!(policy.allow_reversal_of_reversal);
        assert_eq!(policy.entry_number_prefix, "GL");
    }

    #[test]
    fn test_pool_config_from_settings() {
        let settings = DatabaseSettings { connect_timeout_secs: 5, ..Default::default() };
        let pool = settings.pool_config();
        assert_eq!(pool.connect_timeout, Duration::from_secs(5));
        assert_eq!(pool.url, "postgres://localhost/ledger");
    }

    #[test]
    fn test_backend_override() {
        let config = AppConfig::default().with_backend(Some(StoreBackend::Postgres));
        assert_eq!(config.backend, StoreBackend::Postgres);
        let config = config.with_backend(None);
        assert_eq!(config.backend, StoreBackend::Postgres);
    }
}
