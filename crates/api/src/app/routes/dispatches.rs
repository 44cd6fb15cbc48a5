use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    response::Response,
};
use serde_json::{Value, json};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Register a dispatch: take `units` from every antibiotic linked to the
/// panel, or from none of them.
pub async fn register_dispatch(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::RegisterDispatchRequest>, JsonRejection>,
) -> Result<Json<Value>, Response> {
    let Json(body) = body.map_err(errors::json_rejection_to_response)?;
    let request = body.into_request().map_err(errors::stock_error_to_response)?;

    let receipt = services
        .store
        .register_dispatch(request)
        .await
        .map_err(errors::stock_error_to_response)?;

    tracing::info!(
        panel_id = %receipt.panel_id,
        units = receipt.units,
        affected = receipt.affected.len(),
        "dispatch registered"
    );
    services.alert_if_low(&receipt.affected);

    Ok(Json(json!({
        "ok": true,
        "panel_id": receipt.panel_id,
        "units": receipt.units,
        "affected": receipt.affected,
    })))
}
