//! Stock persistence boundary.
//!
//! `StockStore` is the only way the HTTP layer touches antibiotics, panels and
//! links. Two implementations exist: Postgres (production) and in-memory
//! (tests/dev). Both defer the dispatch decision to
//! `antibiostock_core::verify_dispatch`.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;
pub use r#trait::{StockStore, StoreDiagnostics};

/// Table names of the persisted schema.
pub const ANTIBIOTICS_TABLE: &str = "antibioticos";
pub const PANELS_TABLE: &str = "antibiogramas";
pub const LINKS_TABLE: &str = "antibiograma_antibiotico";
