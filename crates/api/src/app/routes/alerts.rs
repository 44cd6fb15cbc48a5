use std::sync::Arc;

use axum::{Json, extract::Extension, response::Response};
use serde_json::{Value, json};

use antibiostock_infra::NotifyOutcome;

use crate::app::errors;
use crate::app::services::AppServices;

/// Run the low-stock notifier over the current below-minimum set and report
/// what happened. Mail failures are reported in the body, never as 5xx.
pub async fn send_low_stock_alert(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Value>, Response> {
    let rows = services
        .store
        .below_minimum()
        .await
        .map_err(errors::stock_error_to_response)?;

    let outcome = services.notifier.notify(&rows).await;
    if let NotifyOutcome::Failed { error } = &outcome {
        tracing::warn!(count = rows.len(), %error, "low stock alert failed");
    }

    Ok(Json(json!({
        "ok": !matches!(outcome, NotifyOutcome::Failed { .. }),
        "status": outcome.status(),
        "count": rows.len(),
        "detail": detail(&outcome),
    })))
}

fn detail(outcome: &NotifyOutcome) -> Value {
    match outcome {
        NotifyOutcome::Sent { message_id } => json!({ "message_id": message_id }),
        NotifyOutcome::Skipped { reason } => json!({ "reason": reason }),
        NotifyOutcome::Failed { error } => json!({ "error": error }),
    }
}
