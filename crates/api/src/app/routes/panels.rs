use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    response::Response,
    routing::get,
};
use serde_json::{Value, json};

use antibiostock_core::{Antibiotic, AntibioticCode, Panel, PanelMembership};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/antibiogramas", get(list_panels))
        .route(
            "/antibiogramas/:id/antibioticos",
            get(linked_codes).put(replace_links),
        )
        .route("/antibiogramas/:id/antibioticos_detalle", get(linked_antibiotics))
        .route("/antibiogramas/:id/existencias", get(membership))
}

pub async fn list_panels(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Vec<Panel>>, Response> {
    services
        .store
        .list_panels()
        .await
        .map(Json)
        .map_err(errors::stock_error_to_response)
}

pub async fn linked_codes(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AntibioticCode>>, Response> {
    let panel_id = dto::parse_panel_id(&id).map_err(errors::stock_error_to_response)?;
    services
        .store
        .linked_codes(panel_id)
        .await
        .map(Json)
        .map_err(errors::stock_error_to_response)
}

pub async fn linked_antibiotics(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Antibiotic>>, Response> {
    let panel_id = dto::parse_panel_id(&id).map_err(errors::stock_error_to_response)?;
    services
        .store
        .linked_antibiotics(panel_id)
        .await
        .map(Json)
        .map_err(errors::stock_error_to_response)
}

/// Every antibiotic, flagged by whether the panel links to it.
pub async fn membership(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PanelMembership>>, Response> {
    let panel_id = dto::parse_panel_id(&id).map_err(errors::stock_error_to_response)?;
    services
        .store
        .panel_membership(panel_id)
        .await
        .map(Json)
        .map_err(errors::stock_error_to_response)
}

/// Replace the panel's full link set in one transaction.
pub async fn replace_links(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReplaceLinksRequest>, JsonRejection>,
) -> Result<Json<Value>, Response> {
    let Json(body) = body.map_err(errors::json_rejection_to_response)?;
    let panel_id = dto::parse_panel_id(&id).map_err(errors::stock_error_to_response)?;
    let replacement = body
        .into_replacement(panel_id)
        .map_err(errors::stock_error_to_response)?;

    let saved = services
        .store
        .replace_links(replacement)
        .await
        .map_err(errors::stock_error_to_response)?;

    Ok(Json(json!({ "ok": true, "saved": saved })))
}
