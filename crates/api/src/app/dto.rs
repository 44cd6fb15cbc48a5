//! Request DTOs.
//!
//! Numeric fields are kept as raw JSON values and parsed leniently through
//! `antibiostock_core::input`, so `5`, `5.0` and `"5"` are all accepted while
//! anything else becomes a validation error naming the field. Legacy Spanish
//! field names are accepted as aliases.

use serde::Deserialize;
use serde_json::Value;

use antibiostock_core::{
    AntibioticCode, DispatchRequest, LinkReplacement, PanelId, StockError, StockResult,
    StockUpdate, Withdrawal, input,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAntibioticRequest {
    #[serde(default, alias = "cantidad")]
    pub quantity: Option<Value>,
    #[serde(default, alias = "stock_minimo")]
    pub minimum_threshold: Option<Value>,
}

impl UpdateAntibioticRequest {
    pub fn into_update(self) -> StockResult<StockUpdate> {
        let quantity = self
            .quantity
            .as_ref()
            .map(|v| input::non_negative("quantity", v))
            .transpose()?;
        let minimum_threshold = self
            .minimum_threshold
            .as_ref()
            .map(|v| input::non_negative("minimum_threshold", v))
            .transpose()?;
        StockUpdate::new(quantity, minimum_threshold)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WithdrawRequest {
    #[serde(default, alias = "cantidad")]
    pub quantity: Option<Value>,
}

impl WithdrawRequest {
    pub fn into_withdrawal(self, code: AntibioticCode) -> StockResult<Withdrawal> {
        let amount = input::positive("quantity", input::required("quantity", self.quantity.as_ref())?)?;
        Withdrawal::new(code, amount)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReplaceLinksRequest {
    #[serde(default, alias = "codigos")]
    pub codes: Option<Value>,
}

impl ReplaceLinksRequest {
    pub fn into_replacement(self, panel_id: PanelId) -> StockResult<LinkReplacement> {
        let Value::Array(items) = input::required("codes", self.codes.as_ref())? else {
            return Err(StockError::validation("codes must be an array of strings"));
        };

        let codes = items
            .iter()
            .map(|item| match item {
                Value::String(s) => AntibioticCode::parse(s),
                _ => Err(StockError::validation("codes must be an array of strings")),
            })
            .collect::<StockResult<Vec<_>>>()?;

        Ok(LinkReplacement::new(panel_id, codes))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterDispatchRequest {
    #[serde(default, alias = "antibiograma_id")]
    pub panel_id: Option<Value>,
    #[serde(default, alias = "unidades")]
    pub units: Option<Value>,
}

impl RegisterDispatchRequest {
    pub fn into_request(self) -> StockResult<DispatchRequest> {
        let panel_id = input::integer("panel_id", input::required("panel_id", self.panel_id.as_ref())?)?;
        let units = input::integer("units", input::required("units", self.units.as_ref())?)?;
        DispatchRequest::new(panel_id, units)
    }
}

// -------------------------
// Path parameters
// -------------------------

pub fn parse_code(raw: &str) -> StockResult<AntibioticCode> {
    AntibioticCode::parse(raw)
}

pub fn parse_panel_id(raw: &str) -> StockResult<PanelId> {
    raw.trim().parse()
}
