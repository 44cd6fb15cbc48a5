use serde::{Deserialize, Serialize};

use crate::id::{AntibioticCode, PanelId};

/// An antibiogram panel: a named set of antibiotics tested together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panel {
    pub id: PanelId,
    pub name: String,
}

/// One row of the "which antibiotics does this panel use" checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelMembership {
    pub code: AntibioticCode,
    pub name: String,
    pub linked: bool,
}

/// Full replacement of a panel's linked codes.
///
/// Codes are kept exactly as given, duplicates included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReplacement {
    pub panel_id: PanelId,
    pub codes: Vec<AntibioticCode>,
}

impl LinkReplacement {
    pub fn new(panel_id: PanelId, codes: Vec<AntibioticCode>) -> Self {
        Self { panel_id, codes }
    }
}
