//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::StockError;

/// Antibiotic code (primary key of the stock table), e.g. `AMX`.
///
/// Never blank. Client input is trimmed by [`AntibioticCode::parse`]; codes
/// read back from storage keep their exact bytes so they still match the
/// row they came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AntibioticCode(String);

impl AntibioticCode {
    pub fn parse(raw: &str) -> Result<Self, StockError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(StockError::validation("antibiotic code is required"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Wrap a code exactly as stored. Only blank values are rejected.
    pub fn from_stored(raw: impl Into<String>) -> Result<Self, StockError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(StockError::validation("antibiotic code is required"));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for AntibioticCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AntibioticCode {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Antibiogram panel identifier (positive integer).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanelId(i64);

impl PanelId {
    pub fn new(value: i64) -> Result<Self, StockError> {
        if value <= 0 {
            return Err(StockError::validation("panel id must be a positive integer"));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for PanelId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for PanelId {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| StockError::validation("panel id must be a positive integer"))?;
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_trimmed() {
        let code = AntibioticCode::parse("  AMX ").unwrap();
        assert_eq!(code.as_str(), "AMX");
    }

    #[test]
    fn stored_code_keeps_surrounding_whitespace() {
        let code = AntibioticCode::from_stored("AMX ").unwrap();
        assert_eq!(code.as_str(), "AMX ");
        assert_ne!(code, AntibioticCode::parse("AMX").unwrap());
        assert!(AntibioticCode::from_stored(" ").is_err());
    }

    #[test]
    fn blank_code_is_rejected() {
        assert!(matches!(
            AntibioticCode::parse("   "),
            Err(StockError::Validation(_))
        ));
    }

    #[test]
    fn panel_id_must_be_positive() {
        assert!(PanelId::new(0).is_err());
        assert!(PanelId::new(-4).is_err());
        assert_eq!("7".parse::<PanelId>().unwrap().get(), 7);
        assert!("7.5".parse::<PanelId>().is_err());
        assert!("abc".parse::<PanelId>().is_err());
    }
}
