use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::Response,
};
use serde_json::{Value, json};

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Store connectivity check: server time plus the tables the store sees.
pub async fn dbcheck(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Value>, Response> {
    let diagnostics = services
        .store
        .diagnostics()
        .await
        .map_err(errors::stock_error_to_response)?;

    Ok(Json(json!({
        "ok": true,
        "now": diagnostics.now,
        "tables": diagnostics.tables,
    })))
}

pub async fn not_found() -> Response {
    errors::json_error(StatusCode::NOT_FOUND, "not_found", "route not found")
}
