use std::sync::Arc;

use antibiostock_core::{Antibiotic, StockResult, below_minimum};
use antibiostock_infra::external::notifier;
use antibiostock_infra::{
    AppConfig, InMemoryStockStore, LowStockNotifier, NotifyOutcome, PostgresStockStore,
    StockStore,
};

/// Shared handles injected into every handler.
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn StockStore>,
    pub notifier: Arc<dyn LowStockNotifier>,
}

impl AppServices {
    pub fn new(store: Arc<dyn StockStore>, notifier: Arc<dyn LowStockNotifier>) -> Self {
        Self { store, notifier }
    }

    /// Hand rows that ended up under their minimum to the notifier without
    /// waiting for it. The outcome is only logged.
    pub fn alert_if_low<'a>(&self, rows: impl IntoIterator<Item = &'a Antibiotic>) {
        let low = below_minimum(rows);
        if low.is_empty() {
            return;
        }

        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            match notifier.notify(&low).await {
                NotifyOutcome::Failed { error } => {
                    tracing::warn!(count = low.len(), %error, "low stock alert failed");
                }
                outcome => {
                    tracing::info!(count = low.len(), status = outcome.status(), "low stock alert");
                }
            }
        });
    }
}

/// Wire the store and notifier from configuration.
///
/// Without `DATABASE_URL` the service falls back to an empty in-memory store,
/// which is only suitable for local development.
pub async fn build_services(config: AppConfig) -> StockResult<AppServices> {
    let store: Arc<dyn StockStore> = match &config.database {
        Some(database) => {
            let store = PostgresStockStore::connect(database).await?;
            store.ensure_schema().await?;
            tracing::info!(
                max_connections = database.max_connections,
                require_tls = database.require_tls,
                "using postgres stock store"
            );
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory stock store (data is not persisted)");
            Arc::new(InMemoryStockStore::new())
        }
    };

    if config.mail.is_none() {
        tracing::info!("mail not configured; low stock alerts are disabled");
    }
    let notifier = notifier::from_config(config.mail);

    Ok(AppServices::new(store, notifier))
}
