//! Lenient integer parsing for request payloads.
//!
//! Clients send quantities as JSON integers, integral floats (`5.0`) or
//! numeric strings (`"5"`). Anything else is rejected with a validation error
//! naming the field.

use serde_json::Value;

use crate::error::{StockError, StockResult};

/// Largest magnitude accepted from a float payload without losing precision.
const MAX_SAFE_FLOAT_INT: f64 = 9_007_199_254_740_991.0;

/// Parse a JSON value as an integer.
pub fn integer(field: &str, value: &Value) -> StockResult<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() <= MAX_SAFE_FLOAT_INT)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| StockError::validation(format!("{field} must be an integer")))
}

/// Parse a JSON value as an integer `>= 0`.
pub fn non_negative(field: &str, value: &Value) -> StockResult<i64> {
    let n = integer(field, value)?;
    if n < 0 {
        return Err(StockError::validation(format!("{field} must be an integer >= 0")));
    }
    Ok(n)
}

/// Parse a JSON value as an integer `> 0`.
pub fn positive(field: &str, value: &Value) -> StockResult<i64> {
    let n = integer(field, value)?;
    if n <= 0 {
        return Err(StockError::validation(format!("{field} must be an integer > 0")));
    }
    Ok(n)
}

/// Require a field to be present.
pub fn required<'a>(field: &str, value: Option<&'a Value>) -> StockResult<&'a Value> {
    match value {
        Some(Value::Null) | None => Err(StockError::validation(format!("{field} is required"))),
        Some(v) => Ok(v),
    }
}
