//! Dispatch ("salida") rules: consuming `units` of every antibiotic linked to
//! a panel, all or nothing.
//!
//! The stores own locking and persistence; this module owns the decision.
//! A store resolves the linked codes, locks the matching rows, then asks
//! [`verify_dispatch`] whether the decrement may proceed. Only `Ok(())` allows
//! any row to be touched.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::antibiotic::Antibiotic;
use crate::error::{StockError, StockResult};
use crate::id::{AntibioticCode, PanelId};

/// Validated dispatch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchRequest {
    pub panel_id: PanelId,
    pub units: i64,
}

impl DispatchRequest {
    pub fn new(panel_id: i64, units: i64) -> StockResult<Self> {
        let panel_id = PanelId::new(panel_id)?;
        if units <= 0 {
            return Err(StockError::validation("units must be an integer > 0"));
        }
        Ok(Self { panel_id, units })
    }
}

/// A row that cannot cover the requested units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    #[serde(flatten)]
    pub item: Antibiotic,
    pub required: i64,
}

impl Shortfall {
    pub fn new(item: &Antibiotic, required: i64) -> Self {
        Self {
            item: item.clone(),
            required,
        }
    }
}

/// Result of a committed dispatch: post-decrement rows ordered by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub panel_id: PanelId,
    pub units: i64,
    pub affected: Vec<Antibiotic>,
}

/// Collapse linked codes into the set a dispatch operates on.
///
/// Sorted by code, which is also the row lock order.
pub fn distinct_codes(codes: impl IntoIterator<Item = AntibioticCode>) -> Vec<AntibioticCode> {
    codes.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Decide whether `request` may decrement the `locked` rows resolved from
/// `linked`.
///
/// `linked` must already be distinct (see [`distinct_codes`]).
pub fn verify_dispatch(
    request: &DispatchRequest,
    linked: &[AntibioticCode],
    locked: &[Antibiotic],
) -> StockResult<()> {
    if linked.is_empty() {
        return Err(StockError::NoLinkedItems(request.panel_id));
    }

    if locked.len() != linked.len() {
        let present: BTreeSet<&AntibioticCode> = locked.iter().map(|a| &a.code).collect();
        let missing = linked
            .iter()
            .filter(|c| !present.contains(c))
            .cloned()
            .collect();
        return Err(StockError::DanglingReference {
            panel_id: request.panel_id,
            missing,
        });
    }

    let mut shortfalls: Vec<Shortfall> = locked
        .iter()
        .filter(|a| !a.has_at_least(request.units))
        .map(|a| Shortfall::new(a, request.units))
        .collect();

    if !shortfalls.is_empty() {
        shortfalls.sort_by(|a, b| a.item.name.cmp(&b.item.name));
        return Err(StockError::InsufficientStock(shortfalls));
    }

    Ok(())
}
