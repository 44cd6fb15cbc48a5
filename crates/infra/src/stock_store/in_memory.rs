use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use antibiostock_core::dispatch::distinct_codes;
use antibiostock_core::{
    Antibiotic, AntibioticCode, DispatchReceipt, DispatchRequest, LinkReplacement, Panel,
    PanelId, PanelMembership, StockError, StockResult, StockUpdate, Withdrawal, below_minimum,
    verify_dispatch,
};

use super::r#trait::{StockStore, StoreDiagnostics};
use super::{ANTIBIOTICS_TABLE, LINKS_TABLE, PANELS_TABLE};

#[derive(Debug, Default)]
struct State {
    antibiotics: BTreeMap<AntibioticCode, Antibiotic>,
    panels: BTreeMap<PanelId, Panel>,
    /// Link rows in insertion order; duplicates allowed.
    links: Vec<(PanelId, AntibioticCode)>,
}

impl State {
    fn codes_for(&self, panel_id: PanelId) -> impl Iterator<Item = &AntibioticCode> {
        self.links
            .iter()
            .filter(move |(p, _)| *p == panel_id)
            .map(|(_, c)| c)
    }

    fn sorted_by_name(mut rows: Vec<Antibiotic>) -> Vec<Antibiotic> {
        rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.code.cmp(&b.code)));
        rows
    }
}

/// In-memory stock store.
///
/// Intended for tests/dev. Every mutation holds the write lock for its whole
/// duration, which serializes overlapping operations the way row locks do in
/// Postgres (coarser, same outcome).
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    state: RwLock<State>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_antibiotic(mut self, antibiotic: Antibiotic) -> Self {
        self.state_mut()
            .antibiotics
            .insert(antibiotic.code.clone(), antibiotic);
        self
    }

    pub fn with_panel(mut self, panel: Panel) -> Self {
        self.state_mut().panels.insert(panel.id, panel);
        self
    }

    /// Seed a raw link row. No referential check, so tests can model
    /// dangling links.
    pub fn with_link(mut self, panel_id: PanelId, code: AntibioticCode) -> Self {
        self.state_mut().links.push((panel_id, code));
        self
    }

    /// Drop an antibiotic row while leaving its links behind.
    pub fn remove_antibiotic(&self, code: &AntibioticCode) -> StockResult<Option<Antibiotic>> {
        self.write(|state| Ok(state.antibiotics.remove(code)))
    }

    fn state_mut(&mut self) -> &mut State {
        match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> StockResult<T>) -> StockResult<T> {
        let state = self
            .state
            .read()
            .map_err(|_| StockError::internal("lock poisoned"))?;
        f(&state)
    }

    fn write<T>(&self, f: impl FnOnce(&mut State) -> StockResult<T>) -> StockResult<T> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StockError::internal("lock poisoned"))?;
        f(&mut state)
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn list_panels(&self) -> StockResult<Vec<Panel>> {
        self.read(|state| {
            let mut panels: Vec<Panel> = state.panels.values().cloned().collect();
            panels.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
            Ok(panels)
        })
    }

    async fn list_antibiotics(&self) -> StockResult<Vec<Antibiotic>> {
        self.read(|state| Ok(State::sorted_by_name(state.antibiotics.values().cloned().collect())))
    }

    async fn panel_membership(&self, panel_id: PanelId) -> StockResult<Vec<PanelMembership>> {
        self.read(|state| {
            let rows = State::sorted_by_name(state.antibiotics.values().cloned().collect());
            Ok(rows
                .into_iter()
                .map(|a| {
                    let linked = state.codes_for(panel_id).any(|c| *c == a.code);
                    PanelMembership {
                        code: a.code,
                        name: a.name,
                        linked,
                    }
                })
                .collect())
        })
    }

    async fn linked_codes(&self, panel_id: PanelId) -> StockResult<Vec<AntibioticCode>> {
        self.read(|state| {
            let mut codes: Vec<AntibioticCode> = state.codes_for(panel_id).cloned().collect();
            codes.sort();
            Ok(codes)
        })
    }

    async fn linked_antibiotics(&self, panel_id: PanelId) -> StockResult<Vec<Antibiotic>> {
        self.read(|state| {
            let rows = distinct_codes(state.codes_for(panel_id).cloned())
                .iter()
                .filter_map(|c| state.antibiotics.get(c).cloned())
                .collect();
            Ok(State::sorted_by_name(rows))
        })
    }

    async fn update_antibiotic(
        &self,
        code: &AntibioticCode,
        update: StockUpdate,
    ) -> StockResult<Antibiotic> {
        self.write(|state| {
            let item = state
                .antibiotics
                .get_mut(code)
                .ok_or_else(|| StockError::not_found(format!("antibiotic {code}")))?;
            item.apply(&update);
            Ok(item.clone())
        })
    }

    async fn withdraw(&self, withdrawal: Withdrawal) -> StockResult<Antibiotic> {
        self.write(|state| {
            let item = state
                .antibiotics
                .get_mut(&withdrawal.code)
                .ok_or_else(|| StockError::not_found(format!("antibiotic {}", withdrawal.code)))?;
            item.withdraw(withdrawal.amount)?;
            Ok(item.clone())
        })
    }

    async fn replace_links(&self, replacement: LinkReplacement) -> StockResult<usize> {
        self.write(|state| {
            if !state.panels.contains_key(&replacement.panel_id) {
                return Err(StockError::not_found(format!(
                    "panel {}",
                    replacement.panel_id
                )));
            }
            if let Some(unknown) = replacement
                .codes
                .iter()
                .find(|c| !state.antibiotics.contains_key(*c))
            {
                return Err(StockError::validation(format!(
                    "unknown antibiotic code {unknown}"
                )));
            }

            let panel_id = replacement.panel_id;
            state.links.retain(|(p, _)| *p != panel_id);
            let saved = replacement.codes.len();
            state
                .links
                .extend(replacement.codes.into_iter().map(|c| (panel_id, c)));
            Ok(saved)
        })
    }

    async fn register_dispatch(&self, request: DispatchRequest) -> StockResult<DispatchReceipt> {
        self.write(|state| {
            if !state.panels.contains_key(&request.panel_id) {
                return Err(StockError::validation(format!(
                    "panel {} does not exist",
                    request.panel_id
                )));
            }

            let linked = distinct_codes(state.codes_for(request.panel_id).cloned());
            let locked: Vec<Antibiotic> = linked
                .iter()
                .filter_map(|c| state.antibiotics.get(c).cloned())
                .collect();

            verify_dispatch(&request, &linked, &locked)?;

            let mut affected = Vec::with_capacity(linked.len());
            for code in &linked {
                let item = state
                    .antibiotics
                    .get_mut(code)
                    .ok_or_else(|| StockError::internal(format!("row {code} vanished under lock")))?;
                item.withdraw(request.units)?;
                affected.push(item.clone());
            }

            Ok(DispatchReceipt {
                panel_id: request.panel_id,
                units: request.units,
                affected: State::sorted_by_name(affected),
            })
        })
    }

    async fn below_minimum(&self) -> StockResult<Vec<Antibiotic>> {
        self.read(|state| Ok(below_minimum(state.antibiotics.values())))
    }

    async fn diagnostics(&self) -> StockResult<StoreDiagnostics> {
        let mut tables = vec![
            ANTIBIOTICS_TABLE.to_string(),
            LINKS_TABLE.to_string(),
            PANELS_TABLE.to_string(),
        ];
        tables.sort();
        Ok(StoreDiagnostics {
            now: Utc::now(),
            tables,
        })
    }
}
