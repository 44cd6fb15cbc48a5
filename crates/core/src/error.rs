//! Domain error model.

use thiserror::Error;

use crate::dispatch::Shortfall;
use crate::id::{AntibioticCode, PanelId};

/// Result type used across the stock domain.
pub type StockResult<T> = Result<T, StockError>;

/// Stock-level error.
///
/// Every store operation reports failures through this enum; the HTTP layer
/// maps each variant to exactly one status code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// Malformed input (non-integer or out-of-range quantities, missing fields).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown antibiotic code or panel id.
    #[error("{0} not found")]
    NotFound(String),

    /// The operation would drive at least one quantity below zero.
    #[error("insufficient stock for {} item(s)", .0.len())]
    InsufficientStock(Vec<Shortfall>),

    /// The panel exists but nothing is linked to it.
    #[error("panel {0} has no linked antibiotics")]
    NoLinkedItems(PanelId),

    /// A link points to an antibiotic code missing from the stock table.
    #[error("panel {panel_id} links to unknown antibiotic code(s): {}", join_codes(.missing))]
    DanglingReference {
        panel_id: PanelId,
        missing: Vec<AntibioticCode>,
    },

    /// Unexpected storage failure. The message is for logs only.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StockError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable code for the variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::NoLinkedItems(_) => "no_linked_items",
            Self::DanglingReference { .. } => "dangling_reference",
            Self::Internal(_) => "internal_error",
        }
    }
}

fn join_codes(codes: &[AntibioticCode]) -> String {
    codes
        .iter()
        .map(AntibioticCode::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangling_reference_message_lists_codes() {
        let err = StockError::DanglingReference {
            panel_id: PanelId::new(3).unwrap(),
            missing: vec![
                AntibioticCode::parse("AMX").unwrap(),
                AntibioticCode::parse("CIP").unwrap(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "panel 3 links to unknown antibiotic code(s): AMX, CIP"
        );
        assert_eq!(err.code(), "dangling_reference");
    }
}
