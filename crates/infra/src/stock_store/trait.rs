use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use antibiostock_core::{
    Antibiotic, AntibioticCode, DispatchReceipt, DispatchRequest, LinkReplacement, Panel,
    PanelId, PanelMembership, StockResult, StockUpdate, Withdrawal,
};

/// Store clock and visible tables, for the diagnostic endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreDiagnostics {
    pub now: DateTime<Utc>,
    pub tables: Vec<String>,
}

/// Antibiotic stock store.
///
/// ## Mutation guarantees
///
/// Implementations must:
/// - never persist a negative quantity
/// - run `register_dispatch` as a single unit of work: lock every linked row,
///   verify, decrement all or none
/// - run `replace_links` as a single unit of work: on any failure the previous
///   links stay in place
/// - make `withdraw` race-safe on its own (conditional write, no read-then-write)
///
/// ## Reads
///
/// Listing operations are plain projections ordered by name; unknown panel ids
/// yield empty lists rather than errors.
#[async_trait]
pub trait StockStore: Send + Sync {
    async fn list_panels(&self) -> StockResult<Vec<Panel>>;

    async fn list_antibiotics(&self) -> StockResult<Vec<Antibiotic>>;

    /// Every antibiotic flagged by whether `panel_id` links to it.
    async fn panel_membership(&self, panel_id: PanelId) -> StockResult<Vec<PanelMembership>>;

    async fn linked_codes(&self, panel_id: PanelId) -> StockResult<Vec<AntibioticCode>>;

    async fn linked_antibiotics(&self, panel_id: PanelId) -> StockResult<Vec<Antibiotic>>;

    async fn update_antibiotic(
        &self,
        code: &AntibioticCode,
        update: StockUpdate,
    ) -> StockResult<Antibiotic>;

    /// Conditional subtract on a single antibiotic.
    async fn withdraw(&self, withdrawal: Withdrawal) -> StockResult<Antibiotic>;

    /// Replace the full link set of a panel. Returns the number of links saved.
    async fn replace_links(&self, replacement: LinkReplacement) -> StockResult<usize>;

    async fn register_dispatch(&self, request: DispatchRequest) -> StockResult<DispatchReceipt>;

    /// Antibiotics whose quantity is under their minimum threshold.
    async fn below_minimum(&self) -> StockResult<Vec<Antibiotic>>;

    async fn diagnostics(&self) -> StockResult<StoreDiagnostics>;
}

#[async_trait]
impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    async fn list_panels(&self) -> StockResult<Vec<Panel>> {
        (**self).list_panels().await
    }

    async fn list_antibiotics(&self) -> StockResult<Vec<Antibiotic>> {
        (**self).list_antibiotics().await
    }

    async fn panel_membership(&self, panel_id: PanelId) -> StockResult<Vec<PanelMembership>> {
        (**self).panel_membership(panel_id).await
    }

    async fn linked_codes(&self, panel_id: PanelId) -> StockResult<Vec<AntibioticCode>> {
        (**self).linked_codes(panel_id).await
    }

    async fn linked_antibiotics(&self, panel_id: PanelId) -> StockResult<Vec<Antibiotic>> {
        (**self).linked_antibiotics(panel_id).await
    }

    async fn update_antibiotic(
        &self,
        code: &AntibioticCode,
        update: StockUpdate,
    ) -> StockResult<Antibiotic> {
        (**self).update_antibiotic(code, update).await
    }

    async fn withdraw(&self, withdrawal: Withdrawal) -> StockResult<Antibiotic> {
        (**self).withdraw(withdrawal).await
    }

    async fn replace_links(&self, replacement: LinkReplacement) -> StockResult<usize> {
        (**self).replace_links(replacement).await
    }

    async fn register_dispatch(&self, request: DispatchRequest) -> StockResult<DispatchReceipt> {
        (**self).register_dispatch(request).await
    }

    async fn below_minimum(&self) -> StockResult<Vec<Antibiotic>> {
        (**self).below_minimum().await
    }

    async fn diagnostics(&self) -> StockResult<StoreDiagnostics> {
        (**self).diagnostics().await
    }
}
