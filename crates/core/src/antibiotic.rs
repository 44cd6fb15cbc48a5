use serde::{Deserialize, Serialize};

use crate::error::{StockError, StockResult};
use crate::id::AntibioticCode;

/// A stocked antibiotic.
///
/// `quantity` never goes negative: every mutation goes through a bounded
/// decrement (`withdraw`) or a validated overwrite (`apply`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Antibiotic {
    pub code: AntibioticCode,
    pub name: String,
    pub quantity: i64,
    pub minimum_threshold: i64,
}

impl Antibiotic {
    pub fn new(
        code: AntibioticCode,
        name: impl Into<String>,
        quantity: i64,
        minimum_threshold: i64,
    ) -> StockResult<Self> {
        if quantity < 0 {
            return Err(StockError::validation("quantity must be an integer >= 0"));
        }
        if minimum_threshold < 0 {
            return Err(StockError::validation(
                "minimum_threshold must be an integer >= 0",
            ));
        }
        Ok(Self {
            code,
            name: name.into(),
            quantity,
            minimum_threshold,
        })
    }

    pub fn is_below_minimum(&self) -> bool {
        self.quantity < self.minimum_threshold
    }

    pub fn has_at_least(&self, amount: i64) -> bool {
        self.quantity >= amount
    }

    /// Decrement by `amount`, refusing to go below zero.
    pub fn withdraw(&mut self, amount: i64) -> StockResult<()> {
        match self.quantity.checked_sub(amount) {
            Some(rest) if rest >= 0 => {
                self.quantity = rest;
                Ok(())
            }
            _ => Err(StockError::InsufficientStock(vec![
                crate::dispatch::Shortfall::new(self, amount),
            ])),
        }
    }

    /// Overwrite whichever fields the update carries.
    pub fn apply(&mut self, update: &StockUpdate) {
        if let Some(q) = update.quantity {
            self.quantity = q;
        }
        if let Some(m) = update.minimum_threshold {
            self.minimum_threshold = m;
        }
    }
}

/// Partial update of an antibiotic's stock fields.
///
/// At least one field is present and every present field is `>= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StockUpdate {
    quantity: Option<i64>,
    minimum_threshold: Option<i64>,
}

impl StockUpdate {
    pub fn new(quantity: Option<i64>, minimum_threshold: Option<i64>) -> StockResult<Self> {
        if quantity.is_none() && minimum_threshold.is_none() {
            return Err(StockError::validation("nothing to update"));
        }
        if quantity.is_some_and(|q| q < 0) {
            return Err(StockError::validation("quantity must be an integer >= 0"));
        }
        if minimum_threshold.is_some_and(|m| m < 0) {
            return Err(StockError::validation(
                "minimum_threshold must be an integer >= 0",
            ));
        }
        Ok(Self {
            quantity,
            minimum_threshold,
        })
    }

    pub fn quantity(&self) -> Option<i64> {
        self.quantity
    }

    pub fn minimum_threshold(&self) -> Option<i64> {
        self.minimum_threshold
    }
}

/// Request to subtract `amount` units from a single antibiotic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub code: AntibioticCode,
    pub amount: i64,
}

impl Withdrawal {
    pub fn new(code: AntibioticCode, amount: i64) -> StockResult<Self> {
        if amount <= 0 {
            return Err(StockError::validation("quantity must be an integer > 0"));
        }
        Ok(Self { code, amount })
    }
}

/// Rows whose quantity dropped under their minimum, ordered by name.
pub fn below_minimum<'a>(rows: impl IntoIterator<Item = &'a Antibiotic>) -> Vec<Antibiotic> {
    let mut low: Vec<Antibiotic> = rows
        .into_iter()
        .filter(|a| a.is_below_minimum())
        .cloned()
        .collect();
    low.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.code.cmp(&b.code)));
    low
}
