//! `antibiostock-core`: domain building blocks for antibiotic stock.
//!
//! This crate contains **pure domain** types and rules (no IO, no HTTP, no
//! storage). Stores in `antibiostock-infra` call into it so that stock
//! semantics are defined in exactly one place.

pub mod antibiotic;
pub mod dispatch;
pub mod error;
pub mod id;
pub mod input;
pub mod panel;

pub use antibiotic::{Antibiotic, StockUpdate, Withdrawal, below_minimum};
pub use dispatch::{DispatchReceipt, DispatchRequest, Shortfall, verify_dispatch};
pub use error::{StockError, StockResult};
pub use id::{AntibioticCode, PanelId};
pub use panel::{LinkReplacement, Panel, PanelMembership};
