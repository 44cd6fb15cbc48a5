use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    response::Response,
    routing::{get, post, put},
};
use serde_json::{Value, json};

use antibiostock_core::Antibiotic;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/antibioticos", get(list_antibiotics))
        .route("/antibioticos/bajo_minimo", get(list_below_minimum))
        .route("/antibioticos/:code", put(update_antibiotic))
        .route("/antibioticos/:code/restar", post(withdraw))
}

pub async fn list_antibiotics(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Vec<Antibiotic>>, Response> {
    services
        .store
        .list_antibiotics()
        .await
        .map(Json)
        .map_err(errors::stock_error_to_response)
}

pub async fn list_below_minimum(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Vec<Antibiotic>>, Response> {
    services
        .store
        .below_minimum()
        .await
        .map(Json)
        .map_err(errors::stock_error_to_response)
}

/// Overwrite quantity and/or minimum threshold of one antibiotic.
pub async fn update_antibiotic(
    Extension(services): Extension<Arc<AppServices>>,
    Path(code): Path<String>,
    body: Result<Json<dto::UpdateAntibioticRequest>, JsonRejection>,
) -> Result<Json<Value>, Response> {
    let Json(body) = body.map_err(errors::json_rejection_to_response)?;
    let code = dto::parse_code(&code).map_err(errors::stock_error_to_response)?;
    let update = body.into_update().map_err(errors::stock_error_to_response)?;

    let item = services
        .store
        .update_antibiotic(&code, update)
        .await
        .map_err(errors::stock_error_to_response)?;

    services.alert_if_low([&item]);
    Ok(Json(json!({ "ok": true, "item": item })))
}

/// Conditional subtract: succeeds only if enough stock is on hand.
pub async fn withdraw(
    Extension(services): Extension<Arc<AppServices>>,
    Path(code): Path<String>,
    body: Result<Json<dto::WithdrawRequest>, JsonRejection>,
) -> Result<Json<Value>, Response> {
    let Json(body) = body.map_err(errors::json_rejection_to_response)?;
    let code = dto::parse_code(&code).map_err(errors::stock_error_to_response)?;
    let withdrawal = body
        .into_withdrawal(code)
        .map_err(errors::stock_error_to_response)?;

    let item = services
        .store
        .withdraw(withdrawal)
        .await
        .map_err(errors::stock_error_to_response)?;

    services.alert_if_low([&item]);
    Ok(Json(json!({ "ok": true, "item": item })))
}
