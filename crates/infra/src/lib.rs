//! Infrastructure layer: stock persistence, configuration, external services.

pub mod config;
pub mod external;
pub mod stock_store;

#[cfg(test)]
mod integration_tests;

pub use config::{AppConfig, ConfigError, DatabaseConfig, HttpConfig, MailConfig};
pub use external::notifier::{LowStockNotifier, NotifyOutcome};
pub use stock_store::{InMemoryStockStore, PostgresStockStore, StockStore, StoreDiagnostics};
